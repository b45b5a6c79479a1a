// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File registry — durable metadata for uploaded documents.
//
// Records are immutable once created except for deletion.  Ids are
// SQLite AUTOINCREMENT, so they increase monotonically across the life
// of the database.  The registry stores metadata only; the bytes live
// under the upload directory and are the engine's concern.

use chrono::Utc;
use rusqlite::params;
use tracing::{debug, info, instrument};

use muenzwerk_core::error::{MuenzwerkError, Result};
use muenzwerk_core::types::{FileId, FileKind, SessionId, UploadedFile};

use crate::{KioskStore, db_err};

const FILE_COLUMNS: &str = "id, session_id, stored_name, original_name, storage_path,
                            byte_size, page_count, file_kind, sha256, uploaded_at";

/// Map a SQLite row to an `UploadedFile`.
///
/// Column indices must match `FILE_COLUMNS`.
fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<UploadedFile> {
    let kind_str: String = row.get(7)?;
    let kind = FileKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            7,
            rusqlite::types::Type::Text,
            format!("unknown file kind '{kind_str}'").into(),
        )
    })?;

    Ok(UploadedFile {
        id: FileId(row.get(0)?),
        session: SessionId(row.get(1)?),
        stored_name: row.get(2)?,
        original_name: row.get(3)?,
        storage_path: row.get(4)?,
        byte_size: row.get::<_, i64>(5)? as u64,
        page_count: row.get::<_, i64>(6)? as u32,
        kind,
        sha256: row.get(8)?,
        uploaded_at: crate::ledger::parse_ts(row, 9)?,
    })
}

/// Everything the registry needs to persist a new upload.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub session: SessionId,
    pub stored_name: String,
    pub original_name: String,
    pub storage_path: String,
    pub byte_size: u64,
    pub page_count: u32,
    pub kind: FileKind,
    pub sha256: String,
}

impl KioskStore {
    /// Persist metadata for a freshly stored upload and return the full
    /// record with its assigned id.
    #[instrument(skip(self, file), fields(session = %file.session, name = %file.stored_name))]
    pub fn register_file(&self, file: NewFile) -> Result<UploadedFile> {
        if file.page_count == 0 {
            return Err(MuenzwerkError::InvalidInput(
                "page count must be positive".into(),
            ));
        }

        let now = Utc::now();
        self.conn()
            .execute(
                "INSERT INTO files (session_id, stored_name, original_name, storage_path,
                                    byte_size, page_count, file_kind, sha256, uploaded_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    file.session.as_str(),
                    file.stored_name,
                    file.original_name,
                    file.storage_path,
                    file.byte_size as i64,
                    file.page_count,
                    file.kind.as_str(),
                    file.sha256,
                    now.to_rfc3339(),
                ],
            )
            .map_err(db_err)?;

        let id = self.conn().last_insert_rowid();
        info!(file_id = id, pages = file.page_count, "file registered");

        Ok(UploadedFile {
            id: FileId(id),
            session: file.session,
            stored_name: file.stored_name,
            original_name: file.original_name,
            storage_path: file.storage_path,
            byte_size: file.byte_size,
            page_count: file.page_count,
            kind: file.kind,
            sha256: file.sha256,
            uploaded_at: now,
        })
    }

    /// The most recently uploaded file for a session, if any.
    #[instrument(skip(self), fields(session = %session))]
    pub fn latest_file(&self, session: &SessionId) -> Result<Option<UploadedFile>> {
        self.query_one_file(
            &format!(
                "SELECT {FILE_COLUMNS} FROM files
                 WHERE session_id = ?1
                 ORDER BY uploaded_at DESC, id DESC LIMIT 1"
            ),
            params![session.as_str()],
        )
    }

    /// The most recent file matching an exact stored name for a session.
    ///
    /// Supports the kiosk controller remembering which upload it meant to
    /// print.
    #[instrument(skip(self), fields(session = %session, name = %stored_name))]
    pub fn find_file(
        &self,
        session: &SessionId,
        stored_name: &str,
    ) -> Result<Option<UploadedFile>> {
        self.query_one_file(
            &format!(
                "SELECT {FILE_COLUMNS} FROM files
                 WHERE session_id = ?1 AND stored_name = ?2
                 ORDER BY uploaded_at DESC, id DESC LIMIT 1"
            ),
            params![session.as_str(), stored_name],
        )
    }

    /// Retrieve a file record by id.
    pub fn get_file(&self, id: FileId) -> Result<Option<UploadedFile>> {
        self.query_one_file(
            &format!("SELECT {FILE_COLUMNS} FROM files WHERE id = ?1"),
            params![id.0],
        )
    }

    /// Remove a file's metadata record.
    ///
    /// Returns `NoFileFound` if the id does not exist.  Removing or
    /// retaining the stored bytes is the caller's responsibility.
    #[instrument(skip(self), fields(file_id = %id))]
    pub fn delete_file(&self, id: FileId) -> Result<()> {
        let rows = self
            .conn()
            .execute("DELETE FROM files WHERE id = ?1", params![id.0])
            .map_err(db_err)?;

        if rows == 0 {
            return Err(MuenzwerkError::NoFileFound);
        }

        info!(file_id = %id, "file record deleted");
        Ok(())
    }

    fn query_one_file(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Option<UploadedFile>> {
        let mut stmt = self.conn().prepare(sql).map_err(db_err)?;
        let mut rows = stmt.query_map(params, row_to_file).map_err(db_err)?;

        match rows.next() {
            Some(Ok(file)) => {
                debug!(file_id = %file.id, "file resolved");
                Ok(Some(file))
            }
            Some(Err(e)) => Err(db_err(e)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> KioskStore {
        KioskStore::open_in_memory().expect("open in-memory store")
    }

    fn new_file(session: &str, stored: &str, pages: u32) -> NewFile {
        NewFile {
            session: SessionId::from(session),
            stored_name: stored.into(),
            original_name: stored.trim_end_matches("_20260101").into(),
            storage_path: format!("/tmp/uploads/{stored}"),
            byte_size: 1024,
            page_count: pages,
            kind: FileKind::Pdf,
            sha256: "deadbeef".into(),
        }
    }

    #[test]
    fn register_assigns_monotonic_ids() {
        let store = store();
        let a = store.register_file(new_file("S1", "a.pdf", 1)).unwrap();
        let b = store.register_file(new_file("S1", "b.pdf", 2)).unwrap();
        assert!(b.id.0 > a.id.0);
    }

    #[test]
    fn register_rejects_zero_pages() {
        let store = store();
        let result = store.register_file(new_file("S1", "a.pdf", 0));
        assert!(matches!(result, Err(MuenzwerkError::InvalidInput(_))));
    }

    #[test]
    fn latest_file_returns_most_recent() {
        let store = store();
        store.register_file(new_file("S1", "old.pdf", 1)).unwrap();
        store.register_file(new_file("S1", "new.pdf", 3)).unwrap();

        let latest = store.latest_file(&"S1".into()).unwrap().expect("found");
        assert_eq!(latest.stored_name, "new.pdf");
        assert_eq!(latest.page_count, 3);
    }

    #[test]
    fn latest_file_is_scoped_per_session() {
        let store = store();
        store.register_file(new_file("S1", "mine.pdf", 1)).unwrap();
        store.register_file(new_file("S2", "theirs.pdf", 1)).unwrap();

        let latest = store.latest_file(&"S1".into()).unwrap().expect("found");
        assert_eq!(latest.stored_name, "mine.pdf");
        assert!(store.latest_file(&"S3".into()).unwrap().is_none());
    }

    #[test]
    fn find_file_matches_exact_name() {
        let store = store();
        store.register_file(new_file("S1", "report.pdf", 2)).unwrap();
        store.register_file(new_file("S1", "photo.pdf", 1)).unwrap();

        let found = store
            .find_file(&"S1".into(), "report.pdf")
            .unwrap()
            .expect("found");
        assert_eq!(found.page_count, 2);

        assert!(store.find_file(&"S1".into(), "missing.pdf").unwrap().is_none());
        assert!(store.find_file(&"S2".into(), "report.pdf").unwrap().is_none());
    }

    #[test]
    fn delete_removes_record() {
        let store = store();
        let file = store.register_file(new_file("S1", "a.pdf", 1)).unwrap();

        store.delete_file(file.id).expect("delete");
        assert!(store.get_file(file.id).unwrap().is_none());
        assert!(store.latest_file(&"S1".into()).unwrap().is_none());
    }

    #[test]
    fn delete_missing_record_reports_not_found() {
        let store = store();
        let result = store.delete_file(FileId(999));
        assert!(matches!(result, Err(MuenzwerkError::NoFileFound)));
    }
}
