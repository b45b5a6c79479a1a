// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Credit ledger — session accounts plus the append-only transaction log.
//
// Balance mutations are the kiosk's one correctness-critical critical
// section.  Every mutation pairs the balance UPDATE with its ledger INSERT
// inside a single SQLite transaction, and debits are conditional
// (`credits >= amount`) so a balance can never go negative, regardless of
// how many workers race on the same session.

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use tracing::{debug, info, instrument, warn};

use muenzwerk_core::error::{MuenzwerkError, Result};
use muenzwerk_core::types::{
    JobId, JobStatus, LedgerEntry, PrintJob, SessionAccount, SessionId, TxKind, UploadedFile,
};

use crate::{KioskStore, db_err};

/// Map a SQLite row to a `SessionAccount`.
///
/// Column order: session_id, credits, created_at, last_activity.
fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionAccount> {
    Ok(SessionAccount {
        session: SessionId(row.get(0)?),
        balance: row.get::<_, i64>(1)? as u32,
        created_at: parse_ts(row, 2)?,
        last_activity: parse_ts(row, 3)?,
    })
}

pub(crate) fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl KioskStore {
    /// Look up a session account, creating it with a zero balance if this
    /// is the first time the id has been seen.  Idempotent; never fails on
    /// repeat calls.
    #[instrument(skip(self), fields(session = %session))]
    pub fn get_or_create_session(&self, session: &SessionId) -> Result<SessionAccount> {
        let now = Utc::now().to_rfc3339();
        let inserted = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO sessions (session_id, credits, created_at, last_activity)
                 VALUES (?1, 0, ?2, ?2)",
                params![session.as_str(), now],
            )
            .map_err(db_err)?;

        if inserted > 0 {
            info!(session = %session, "new session created");
        }

        self.conn()
            .query_row(
                "SELECT session_id, credits, created_at, last_activity
                 FROM sessions WHERE session_id = ?1",
                params![session.as_str()],
                row_to_account,
            )
            .map_err(db_err)
    }

    /// Bump a session's `last_activity` timestamp.
    pub fn touch_session(&self, session: &SessionId) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE sessions SET last_activity = ?1 WHERE session_id = ?2",
                params![Utc::now().to_rfc3339(), session.as_str()],
            )
            .map_err(db_err)?;
        Ok(())
    }

    /// Current balance for a session (0 for unseen sessions).
    pub fn balance(&self, session: &SessionId) -> Result<u32> {
        let balance: Option<i64> = self
            .conn()
            .query_row(
                "SELECT credits FROM sessions WHERE session_id = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        Ok(balance.unwrap_or(0) as u32)
    }

    /// Add credits to a session (coins inserted).
    ///
    /// The balance increment and the `credit-add` ledger row are written in
    /// one transaction so the reconciliation invariant holds at every
    /// observable point.  Returns the new balance.
    #[instrument(skip(self, description), fields(session = %session, amount))]
    pub fn add_credits(
        &mut self,
        session: &SessionId,
        amount: u32,
        description: &str,
    ) -> Result<u32> {
        if amount == 0 {
            return Err(MuenzwerkError::InvalidInput(
                "credit amount must be positive".into(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn_mut().transaction().map_err(db_err)?;

        tx.execute(
            "INSERT OR IGNORE INTO sessions (session_id, credits, created_at, last_activity)
             VALUES (?1, 0, ?2, ?2)",
            params![session.as_str(), now],
        )
        .map_err(db_err)?;

        tx.execute(
            "UPDATE sessions SET credits = credits + ?1, last_activity = ?2
             WHERE session_id = ?3",
            params![amount, now, session.as_str()],
        )
        .map_err(db_err)?;

        tx.execute(
            "INSERT INTO transactions (session_id, kind, amount, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.as_str(),
                TxKind::CreditAdd.as_str(),
                amount,
                description,
                now
            ],
        )
        .map_err(db_err)?;

        let new_balance: i64 = tx
            .query_row(
                "SELECT credits FROM sessions WHERE session_id = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;

        info!(session = %session, amount, new_balance, "credits added");
        Ok(new_balance as u32)
    }

    /// Atomically debit `amount` from a session's balance and append the
    /// matching `debit` ledger row.
    ///
    /// The debit is a conditional UPDATE (`credits >= amount`); if the
    /// balance is too low the transaction rolls back, nothing is written,
    /// and `InsufficientFunds` reports the balance observed at that
    /// instant.  Concurrent calls summing past the balance succeed at most
    /// until it is exhausted — overdraft is impossible.
    ///
    /// Returns the new balance.
    #[instrument(skip(self, description), fields(session = %session, amount))]
    pub fn reserve_and_debit(
        &mut self,
        session: &SessionId,
        amount: u32,
        description: &str,
    ) -> Result<u32> {
        if amount == 0 {
            return Err(MuenzwerkError::InvalidInput(
                "debit amount must be positive".into(),
            ));
        }

        let now = Utc::now().to_rfc3339();
        let tx = self.conn_mut().transaction().map_err(db_err)?;

        let debited = tx
            .execute(
                "UPDATE sessions SET credits = credits - ?1, last_activity = ?2
                 WHERE session_id = ?3 AND credits >= ?1",
                params![amount, now, session.as_str()],
            )
            .map_err(db_err)?;

        if debited == 0 {
            let available: Option<i64> = tx
                .query_row(
                    "SELECT credits FROM sessions WHERE session_id = ?1",
                    params![session.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            // Dropping the uncommitted transaction rolls it back.
            warn!(session = %session, amount, available = available.unwrap_or(0), "debit refused");
            return Err(MuenzwerkError::InsufficientFunds {
                needed: amount,
                available: available.unwrap_or(0) as u32,
            });
        }

        tx.execute(
            "INSERT INTO transactions (session_id, kind, amount, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.as_str(),
                TxKind::Debit.as_str(),
                amount,
                description,
                now
            ],
        )
        .map_err(db_err)?;

        let new_balance: i64 = tx
            .query_row(
                "SELECT credits FROM sessions WHERE session_id = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        tx.commit().map_err(db_err)?;

        info!(session = %session, amount, new_balance, "credits debited");
        Ok(new_balance as u32)
    }

    /// Commit step of a print dispatch: debit the cost, append the debit
    /// ledger row, and record the print job — all in ONE transaction.
    /// Returns the job together with the post-debit balance observed
    /// inside the transaction (a receipt read outside it could pick up a
    /// concurrent coin insert).
    ///
    /// Called only after the printer has accepted the document.  If the
    /// balance changed concurrently and the conditional debit fails, the
    /// whole transaction rolls back (no job row, no ledger row) and
    /// `InsufficientFunds` is returned; the dispatcher surfaces that as a
    /// consistency fault because the page has already physically printed.
    #[instrument(skip(self, file), fields(session = %session, file_id = %file.id, pages, cost))]
    pub fn commit_print(
        &mut self,
        session: &SessionId,
        file: &UploadedFile,
        pages: u32,
        cost: u32,
    ) -> Result<(PrintJob, u32)> {
        let now = Utc::now();
        let now_str = now.to_rfc3339();
        let tx = self.conn_mut().transaction().map_err(db_err)?;

        let debited = tx
            .execute(
                "UPDATE sessions SET credits = credits - ?1, last_activity = ?2
                 WHERE session_id = ?3 AND credits >= ?1",
                params![cost, now_str, session.as_str()],
            )
            .map_err(db_err)?;

        if debited == 0 {
            let available: Option<i64> = tx
                .query_row(
                    "SELECT credits FROM sessions WHERE session_id = ?1",
                    params![session.as_str()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_err)?;
            warn!(session = %session, cost, available = available.unwrap_or(0), "print commit refused");
            return Err(MuenzwerkError::InsufficientFunds {
                needed: cost,
                available: available.unwrap_or(0) as u32,
            });
        }

        tx.execute(
            "INSERT INTO transactions (session_id, kind, amount, description, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                session.as_str(),
                TxKind::Debit.as_str(),
                cost,
                format!("Print {pages} page(s) of {}", file.original_name),
                now_str
            ],
        )
        .map_err(db_err)?;

        tx.execute(
            "INSERT INTO print_jobs (session_id, file_id, pages, cost, status, submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.as_str(),
                file.id.0,
                pages,
                cost,
                JobStatus::Printing.as_str(),
                now_str
            ],
        )
        .map_err(db_err)?;

        let job_id = tx.last_insert_rowid();
        let remaining: i64 = tx
            .query_row(
                "SELECT credits FROM sessions WHERE session_id = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        info!(session = %session, job_id, pages, cost, remaining, "print committed");
        Ok((
            PrintJob {
                id: JobId(job_id),
                session: session.clone(),
                file_id: file.id,
                pages,
                cost,
                status: JobStatus::Printing,
                submitted_at: now,
            },
            remaining as u32,
        ))
    }

    /// All ledger entries for a session, oldest first.
    pub fn ledger_entries(&self, session: &SessionId) -> Result<Vec<LedgerEntry>> {
        let mut stmt = self
            .conn()
            .prepare(
                "SELECT id, session_id, kind, amount, description, created_at
                 FROM transactions WHERE session_id = ?1 ORDER BY id ASC",
            )
            .map_err(db_err)?;

        let entries = stmt
            .query_map(params![session.as_str()], row_to_entry)
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;

        debug!(session = %session, count = entries.len(), "ledger entries retrieved");
        Ok(entries)
    }

    /// Recompute a session's balance from its ledger entries.
    ///
    /// Used by tests and operator tooling to verify the reconciliation
    /// invariant: the result must always equal [`KioskStore::balance`].
    pub fn reconciled_balance(&self, session: &SessionId) -> Result<i64> {
        self.conn()
            .query_row(
                "SELECT COALESCE(SUM(CASE kind WHEN 'credit-add' THEN amount ELSE -amount END), 0)
                 FROM transactions WHERE session_id = ?1",
                params![session.as_str()],
                |row| row.get(0),
            )
            .map_err(db_err)
    }
}

/// Map a SQLite row to a `LedgerEntry`.
fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LedgerEntry> {
    let kind_str: String = row.get(2)?;
    let kind = TxKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown transaction kind '{kind_str}'").into(),
        )
    })?;

    Ok(LedgerEntry {
        id: row.get(0)?,
        session: SessionId(row.get(1)?),
        kind,
        amount: row.get::<_, i64>(3)? as u32,
        description: row.get(4)?,
        created_at: parse_ts(row, 5)?,
    })
}
