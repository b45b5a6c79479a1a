// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Münzwerk Store — durable SQLite persistence for the kiosk: session credit
// accounts, the append-only transaction ledger, the uploaded-file registry,
// and the print-job log.  One database file, four tables.
//
// All methods are synchronous because `rusqlite` does not support async
// natively.  The service layer wraps the store in `Arc<Mutex<>>`; mutex
// contention is minimal because every operation is a sub-millisecond query.
//
// The ledger invariant maintained here: for every session, at all times,
// `credits == sum(amount where kind='credit-add') - sum(amount where
// kind='debit')`.  Balance mutations and their ledger rows are written in
// the same SQLite transaction, and debits use a conditional UPDATE that
// cannot take a balance below zero — two concurrent prints cannot both
// debit past zero.

mod jobs;
mod ledger;
mod registry;

pub use registry::NewFile;

use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, instrument};

use muenzwerk_core::error::{MuenzwerkError, Result};

/// SQLite schema.  Mirrors the four-table layout of the kiosk:
/// sessions (credit accounts), files (upload registry), transactions
/// (append-only ledger), print_jobs (dispatch records).
const CREATE_SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS sessions (
        session_id    TEXT PRIMARY KEY,
        credits       INTEGER NOT NULL DEFAULT 0,
        created_at    TEXT NOT NULL,
        last_activity TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS files (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id    TEXT NOT NULL,
        stored_name   TEXT NOT NULL,
        original_name TEXT NOT NULL,
        storage_path  TEXT NOT NULL,
        byte_size     INTEGER NOT NULL,
        page_count    INTEGER NOT NULL,
        file_kind     TEXT NOT NULL,
        sha256        TEXT NOT NULL,
        uploaded_at   TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS transactions (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id  TEXT NOT NULL,
        kind        TEXT NOT NULL,
        amount      INTEGER NOT NULL,
        description TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS print_jobs (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        session_id   TEXT NOT NULL,
        file_id      INTEGER NOT NULL,
        pages        INTEGER NOT NULL,
        cost         INTEGER NOT NULL,
        status       TEXT NOT NULL DEFAULT 'printing',
        submitted_at TEXT NOT NULL
    );
"#;

/// Convert a `rusqlite::Error` into a `MuenzwerkError::Database`.
pub(crate) fn db_err(e: rusqlite::Error) -> MuenzwerkError {
    MuenzwerkError::Database(e.to_string())
}

/// The kiosk's durable store.
///
/// Owns a single SQLite connection; the ledger, registry, and job-log
/// operations are implemented in their own modules as further `impl`
/// blocks on this type.
pub struct KioskStore {
    conn: Connection,
}

impl KioskStore {
    /// Open (or create) the kiosk database at `path`.
    ///
    /// WAL mode is enabled for better concurrent-read performance and
    /// graceful recovery from unclean shutdowns.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| MuenzwerkError::Database(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| MuenzwerkError::Database(format!("WAL pragma: {e}")))?;

        conn.execute_batch(CREATE_SCHEMA_SQL)
            .map_err(|e| MuenzwerkError::Database(format!("create schema: {e}")))?;

        info!("kiosk database opened");
        Ok(Self { conn })
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| MuenzwerkError::Database(format!("open in-memory: {e}")))?;

        conn.execute_batch(CREATE_SCHEMA_SQL)
            .map_err(|e| MuenzwerkError::Database(format!("create schema: {e}")))?;

        debug!("in-memory kiosk database opened");
        Ok(Self { conn })
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}
