// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kiosk service layer — the one place that wires the store, the document
// tooling, and the printer gateway together.  The HTTP surface calls
// these operations and does nothing else; all policy (size limits,
// allowed kinds, pricing) lives here.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument, warn};

use muenzwerk_core::config::KioskConfig;
use muenzwerk_core::error::{MuenzwerkError, Result};
use muenzwerk_core::types::{FileId, FileKind, JobId, JobRecord, JobStatus, KioskStats, SessionId};
use muenzwerk_document::convert::DocumentConverter;
use muenzwerk_document::estimate::{PageEstimator, sight_unseen_pages};
use muenzwerk_document::integrity::hash_bytes;
use muenzwerk_print::gateway::PrinterGateway;
use muenzwerk_store::{KioskStore, NewFile};

use crate::dispatcher::{Dispatcher, PrintReceipt};
use crate::upload::{extension_of, stored_name_for};

/// What the controller gets back after a successful upload: enough to
/// show the session the price before it commits to printing.
#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub file_id: FileId,
    pub stored_name: String,
    pub original_name: String,
    pub pages: u32,
    pub cost: u32,
}

/// Operator status snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct KioskStatus {
    pub printer_available: bool,
    pub printer_name: Option<String>,
    pub price_per_page: u32,
    #[serde(flatten)]
    pub stats: KioskStats,
}

/// The kiosk's operations, one method per controller request.
pub struct KioskServices<G, C, E> {
    store: Arc<Mutex<KioskStore>>,
    gateway: Arc<G>,
    estimator: Arc<E>,
    dispatcher: Dispatcher<G, C>,
    config: KioskConfig,
}

impl<G, C, E> KioskServices<G, C, E>
where
    G: PrinterGateway,
    C: DocumentConverter,
    E: PageEstimator,
{
    pub fn new(
        store: Arc<Mutex<KioskStore>>,
        gateway: Arc<G>,
        converter: Arc<C>,
        estimator: Arc<E>,
        config: KioskConfig,
    ) -> Self {
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            Arc::clone(&gateway),
            converter,
            config.price_per_page,
            config.print_original_on_conversion_failure,
        );
        Self {
            store,
            gateway,
            estimator,
            dispatcher,
            config,
        }
    }

    /// Accept an upload: validate, store the bytes, estimate the price,
    /// and register the metadata.
    ///
    /// Nothing is charged here — uploads are free; only dispatch debits.
    #[instrument(skip(self, bytes), fields(session = %session, name = %original_name, size = bytes.len()))]
    pub async fn upload(
        &self,
        session: &SessionId,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<UploadReceipt> {
        if original_name.trim().is_empty() {
            return Err(MuenzwerkError::InvalidInput("no filename supplied".into()));
        }
        if bytes.is_empty() {
            return Err(MuenzwerkError::InvalidInput("empty upload".into()));
        }
        if bytes.len() as u64 > self.config.max_upload_bytes {
            return Err(MuenzwerkError::InvalidInput(format!(
                "upload of {} bytes exceeds the {} byte limit",
                bytes.len(),
                self.config.max_upload_bytes
            )));
        }

        let ext = extension_of(original_name)
            .ok_or_else(|| MuenzwerkError::DisallowedKind(original_name.to_owned()))?;
        let kind = FileKind::from_extension(ext)
            .ok_or_else(|| MuenzwerkError::DisallowedKind(ext.to_owned()))?;

        let stored_name = stored_name_for(original_name, Utc::now());
        let storage_path = self.config.upload_dir.join(&stored_name);

        tokio::fs::create_dir_all(&self.config.upload_dir).await?;
        tokio::fs::write(&storage_path, bytes).await?;

        let pages = self.estimator.estimate(&storage_path, kind)?;
        let sha256 = hash_bytes(bytes);

        let file = {
            let store = self.store.lock().expect("store lock poisoned");
            store.get_or_create_session(session)?;
            store.register_file(NewFile {
                session: session.clone(),
                stored_name: stored_name.clone(),
                original_name: original_name.to_owned(),
                storage_path: storage_path.display().to_string(),
                byte_size: bytes.len() as u64,
                page_count: pages,
                kind,
                sha256,
            })?
        };

        let cost = pages * self.config.price_per_page;
        info!(file_id = %file.id, pages, cost, "upload accepted");

        Ok(UploadReceipt {
            file_id: file.id,
            stored_name,
            original_name: file.original_name,
            pages,
            cost,
        })
    }

    /// Pre-upload page quote from the filename alone.
    ///
    /// The controller asks before transferring any bytes, so the answer
    /// is a coarse per-kind guess; the upload receipt replaces it with a
    /// real estimate.  Nothing is stored or charged.
    pub fn check_pages(&self, filename: &str) -> Result<(u32, u32)> {
        let ext = extension_of(filename)
            .ok_or_else(|| MuenzwerkError::DisallowedKind(filename.to_owned()))?;
        let kind = FileKind::from_extension(ext)
            .ok_or_else(|| MuenzwerkError::DisallowedKind(ext.to_owned()))?;

        let pages = sight_unseen_pages(kind);
        Ok((pages, pages * self.config.price_per_page))
    }

    /// Dispatch a print request for the session's latest upload (or the
    /// named one).  See [`Dispatcher::dispatch`] for the transaction rules.
    pub async fn print(
        &self,
        session: &SessionId,
        claimed_credits: u32,
        filename: Option<&str>,
    ) -> Result<PrintReceipt> {
        self.dispatcher
            .dispatch(session, claimed_credits, filename)
            .await
    }

    /// Coins inserted: credit the session and return the new balance.
    #[instrument(skip(self), fields(session = %session, amount))]
    pub fn add_credits(&self, session: &SessionId, amount: u32) -> Result<u32> {
        let mut store = self.store.lock().expect("store lock poisoned");
        store.add_credits(session, amount, "Coin inserted")
    }

    /// Current balance.  Creates the session on first sight (balance 0) so
    /// the controller can poll before any coin has been inserted.
    pub fn check_credits(&self, session: &SessionId) -> Result<u32> {
        let store = self.store.lock().expect("store lock poisoned");
        let account = store.get_or_create_session(session)?;
        store.touch_session(session)?;
        Ok(account.balance)
    }

    /// Print history, newest first.  Without a session the whole kiosk's
    /// history is returned (operator view).
    pub fn history(&self, session: Option<&SessionId>, limit: u32) -> Result<Vec<JobRecord>> {
        let store = self.store.lock().expect("store lock poisoned");
        store.job_history(session, limit)
    }

    /// Operator update of a job's lifecycle status (completed/failed).
    #[instrument(skip(self), fields(job_id = %job_id, status = status.as_str()))]
    pub fn set_job_status(&self, job_id: JobId, status: JobStatus) -> Result<()> {
        let store = self.store.lock().expect("store lock poisoned");
        store.set_job_status(job_id, status)
    }

    /// Operator status: printer reachability plus aggregate counters.
    pub async fn status(&self) -> Result<KioskStatus> {
        let target = self.gateway.resolve().await?;
        let stats = {
            let store = self.store.lock().expect("store lock poisoned");
            store.stats()?
        };

        Ok(KioskStatus {
            printer_available: target.is_some(),
            printer_name: target.map(|t| t.name),
            price_per_page: self.config.price_per_page,
            stats,
        })
    }

    /// Remove an upload: registry record first, then the stored bytes.
    ///
    /// The file must belong to the session.  Byte removal is best-effort;
    /// an orphaned blob is harmless, a dangling record is not.
    #[instrument(skip(self), fields(session = %session, file_id = %file_id))]
    pub async fn delete_file(&self, session: &SessionId, file_id: FileId) -> Result<()> {
        let file = {
            let store = self.store.lock().expect("store lock poisoned");
            let file = store.get_file(file_id)?.ok_or(MuenzwerkError::NoFileFound)?;
            if file.session != *session {
                return Err(MuenzwerkError::NoFileFound);
            }
            store.delete_file(file_id)?;
            file
        };

        if let Err(err) = tokio::fs::remove_file(&file.storage_path).await {
            warn!(path = %file.storage_path, %err, "stored bytes could not be removed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::{Path, PathBuf};

    use muenzwerk_document::estimate::HeuristicEstimator;
    use muenzwerk_print::gateway::{PrinterTarget, SubmittedJob};

    struct StubGateway {
        available: bool,
    }

    impl PrinterGateway for StubGateway {
        async fn resolve(&self) -> Result<Option<PrinterTarget>> {
            Ok(self.available.then(|| PrinterTarget {
                name: "StubPrinter".into(),
                uri: "stub://printer".into(),
            }))
        }

        async fn submit(
            &self,
            target: &PrinterTarget,
            _path: &Path,
            _kind: FileKind,
            _job_name: &str,
        ) -> Result<SubmittedJob> {
            Ok(SubmittedJob {
                printer: target.name.clone(),
                remote_id: 1,
            })
        }
    }

    struct StubConverter;

    impl DocumentConverter for StubConverter {
        async fn to_pdf(&self, path: &Path) -> Result<PathBuf> {
            Ok(path.to_path_buf())
        }
    }

    struct Fixture {
        services: KioskServices<StubGateway, StubConverter, HeuristicEstimator>,
        _dir: tempfile::TempDir,
    }

    fn fixture(available: bool) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = KioskConfig {
            upload_dir: dir.path().join("uploads"),
            max_upload_bytes: 1024,
            ..KioskConfig::default()
        };
        let services = KioskServices::new(
            Arc::new(Mutex::new(KioskStore::open_in_memory().expect("store"))),
            Arc::new(StubGateway { available }),
            Arc::new(StubConverter),
            Arc::new(HeuristicEstimator),
            config,
        );
        Fixture {
            services,
            _dir: dir,
        }
    }

    fn s(id: &str) -> SessionId {
        SessionId::from(id)
    }

    #[tokio::test]
    async fn upload_stores_bytes_and_prices_the_document() {
        let fx = fixture(true);
        let receipt = fx
            .services
            .upload(&s("S1"), "note.txt", b"one line\n")
            .await
            .expect("upload");

        assert_eq!(receipt.pages, 1);
        assert_eq!(receipt.cost, 1);
        assert_eq!(receipt.original_name, "note.txt");
        assert!(receipt.stored_name.starts_with("note_"));
        assert!(receipt.stored_name.ends_with(".txt"));
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_extensions() {
        let fx = fixture(true);
        let result = fx.services.upload(&s("S1"), "virus.exe", b"MZ").await;
        assert!(matches!(result, Err(MuenzwerkError::DisallowedKind(_))));

        let result = fx.services.upload(&s("S1"), "noext", b"data").await;
        assert!(matches!(result, Err(MuenzwerkError::DisallowedKind(_))));
    }

    #[tokio::test]
    async fn upload_rejects_oversized_and_empty_payloads() {
        let fx = fixture(true); // limit is 1024 bytes
        let big = vec![0u8; 2048];
        let result = fx.services.upload(&s("S1"), "big.pdf", &big).await;
        assert!(matches!(result, Err(MuenzwerkError::InvalidInput(_))));

        let result = fx.services.upload(&s("S1"), "empty.pdf", b"").await;
        assert!(matches!(result, Err(MuenzwerkError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn upload_then_print_full_round_trip() {
        let fx = fixture(true);
        fx.services
            .upload(&s("S1"), "note.txt", b"hello kiosk\n")
            .await
            .expect("upload");

        let balance = fx.services.add_credits(&s("S1"), 2).expect("fund");
        assert_eq!(balance, 2);

        let receipt = fx
            .services
            .print(&s("S1"), 2, None)
            .await
            .expect("print");
        assert_eq!(receipt.cost, 1);
        assert_eq!(receipt.remaining_credits, 1);

        assert_eq!(fx.services.check_credits(&s("S1")).unwrap(), 1);
        let history = fx.services.history(Some(&s("S1")), 10).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].original_name, "note.txt");
    }

    #[tokio::test]
    async fn check_credits_for_unseen_session_is_zero() {
        let fx = fixture(true);
        assert_eq!(fx.services.check_credits(&s("ghost")).unwrap(), 0);
    }

    #[tokio::test]
    async fn check_pages_quotes_without_any_bytes() {
        let fx = fixture(true);
        assert_eq!(fx.services.check_pages("thesis.pdf").unwrap(), (3, 3));
        assert_eq!(fx.services.check_pages("letter.docx").unwrap(), (2, 2));
        assert_eq!(fx.services.check_pages("photo.png").unwrap(), (1, 1));

        let result = fx.services.check_pages("script.sh");
        assert!(matches!(result, Err(MuenzwerkError::DisallowedKind(_))));
    }

    #[tokio::test]
    async fn job_status_can_be_updated_after_a_print() {
        let fx = fixture(true);
        fx.services
            .upload(&s("S1"), "note.txt", b"hello\n")
            .await
            .expect("upload");
        fx.services.add_credits(&s("S1"), 1).expect("fund");
        let receipt = fx.services.print(&s("S1"), 1, None).await.expect("print");

        fx.services
            .set_job_status(receipt.job_id, JobStatus::Completed)
            .expect("update");

        let history = fx.services.history(Some(&s("S1")), 1).unwrap();
        assert_eq!(history[0].job.status, JobStatus::Completed);

        let result = fx.services.set_job_status(JobId(999), JobStatus::Failed);
        assert!(matches!(result, Err(MuenzwerkError::JobNotFound(999))));
    }

    #[tokio::test]
    async fn status_reports_printer_and_counters() {
        let fx = fixture(true);
        let status = fx.services.status().await.expect("status");
        assert!(status.printer_available);
        assert_eq!(status.printer_name.as_deref(), Some("StubPrinter"));
        assert_eq!(status.stats.total_prints, 0);

        let offline = fixture(false);
        let status = offline.services.status().await.expect("status");
        assert!(!status.printer_available);
        assert!(status.printer_name.is_none());
    }

    #[tokio::test]
    async fn delete_file_removes_record_and_bytes() {
        let fx = fixture(true);
        let receipt = fx
            .services
            .upload(&s("S1"), "trash.txt", b"gone soon\n")
            .await
            .expect("upload");

        fx.services
            .delete_file(&s("S1"), receipt.file_id)
            .await
            .expect("delete");

        // Latest-file resolution must now find nothing.
        let result = fx.services.print(&s("S1"), 10, None).await;
        assert!(matches!(result, Err(MuenzwerkError::NoFileFound)));
    }

    #[tokio::test]
    async fn delete_file_is_scoped_to_the_owning_session() {
        let fx = fixture(true);
        let receipt = fx
            .services
            .upload(&s("S1"), "mine.txt", b"private\n")
            .await
            .expect("upload");

        let result = fx.services.delete_file(&s("S2"), receipt.file_id).await;
        assert!(matches!(result, Err(MuenzwerkError::NoFileFound)));
    }
}
