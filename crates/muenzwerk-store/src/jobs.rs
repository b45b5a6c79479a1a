// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print-job log — query and status-update operations over the records
// written by `KioskStore::commit_print`.
//
// Job rows are only ever inserted by the commit transaction; this module
// never creates them, so a job existing implies the printer accepted the
// document and the charge was applied.

use rusqlite::params;
use tracing::{debug, instrument};

use muenzwerk_core::error::{MuenzwerkError, Result};
use muenzwerk_core::types::{
    FileId, FileKind, JobId, JobRecord, JobStatus, KioskStats, PrintJob, SessionId,
};

use crate::{KioskStore, db_err};

/// Map a joined print_jobs/files row to a `JobRecord`.
fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<JobRecord> {
    let status_str: String = row.get(5)?;
    let status = JobStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            5,
            rusqlite::types::Type::Text,
            format!("unknown job status '{status_str}'").into(),
        )
    })?;

    let kind_str: String = row.get(8)?;
    let file_kind = FileKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            8,
            rusqlite::types::Type::Text,
            format!("unknown file kind '{kind_str}'").into(),
        )
    })?;

    Ok(JobRecord {
        job: PrintJob {
            id: JobId(row.get(0)?),
            session: SessionId(row.get(1)?),
            file_id: FileId(row.get(2)?),
            pages: row.get::<_, i64>(3)? as u32,
            cost: row.get::<_, i64>(4)? as u32,
            status,
            submitted_at: crate::ledger::parse_ts(row, 6)?,
        },
        original_name: row.get(7)?,
        file_kind,
    })
}

impl KioskStore {
    /// Print history, newest first, bounded by `limit`.
    ///
    /// With a session the result is scoped to it; without one the whole
    /// kiosk history is returned (operator view).  Jobs are joined with
    /// their file metadata; a job whose file record was administratively
    /// deleted is still listed, with placeholder file fields.
    #[instrument(skip(self), fields(limit))]
    pub fn job_history(&self, session: Option<&SessionId>, limit: u32) -> Result<Vec<JobRecord>> {
        let base = "SELECT p.id, p.session_id, p.file_id, p.pages, p.cost, p.status,
                           p.submitted_at,
                           COALESCE(f.original_name, '<deleted>'),
                           COALESCE(f.file_kind, 'pdf')
                    FROM print_jobs p
                    LEFT JOIN files f ON p.file_id = f.id";

        let records = match session {
            Some(session) => {
                let sql = format!(
                    "{base} WHERE p.session_id = ?1 ORDER BY p.id DESC LIMIT ?2"
                );
                let mut stmt = self.conn().prepare(&sql).map_err(db_err)?;
                stmt.query_map(params![session.as_str(), limit], row_to_record)
                    .map_err(db_err)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(db_err)?
            }
            None => {
                let sql = format!("{base} ORDER BY p.id DESC LIMIT ?1");
                let mut stmt = self.conn().prepare(&sql).map_err(db_err)?;
                stmt.query_map(params![limit], row_to_record)
                    .map_err(db_err)?
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(db_err)?
            }
        };

        debug!(count = records.len(), "job history retrieved");
        Ok(records)
    }

    /// Update a job's lifecycle status (operator or poller driven).
    #[instrument(skip(self), fields(job_id = %job_id, status = status.as_str()))]
    pub fn set_job_status(&self, job_id: JobId, status: JobStatus) -> Result<()> {
        let rows = self
            .conn()
            .execute(
                "UPDATE print_jobs SET status = ?1 WHERE id = ?2",
                params![status.as_str(), job_id.0],
            )
            .map_err(db_err)?;

        if rows == 0 {
            return Err(MuenzwerkError::JobNotFound(job_id.0));
        }
        Ok(())
    }

    /// Aggregate counters for the operator status endpoint.
    pub fn stats(&self) -> Result<KioskStats> {
        self.conn()
            .query_row(
                "SELECT (SELECT COUNT(*) FROM sessions),
                        (SELECT COUNT(*) FROM print_jobs),
                        (SELECT COALESCE(SUM(cost), 0) FROM print_jobs)",
                [],
                |row| {
                    Ok(KioskStats {
                        total_sessions: row.get::<_, i64>(0)? as u64,
                        total_prints: row.get::<_, i64>(1)? as u64,
                        total_revenue: row.get::<_, i64>(2)? as u64,
                    })
                },
            )
            .map_err(db_err)
    }
}
