// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The charge-and-print dispatcher.
//
// State machine: Resolving → Pricing → Charging → Submitting → Committed,
// with Rejected/Failed as terminal failures.  The ordering rule that makes
// the money safe: the ledger debit happens strictly AFTER confirmed
// physical submission, never before — charging for a print that never
// happened would require refunds.  The accepted tradeoff is the opposite,
// narrow race: if the balance changes between the advisory check and the
// commit, the page has printed but cannot be charged.  That case is
// surfaced as a distinct `ConsistencyFault` for manual reconciliation,
// never silently dropped.
//
// The ledger lock is only taken at the Commit step; printer I/O and
// conversion (both potentially seconds-long) run without it.

use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tracing::{error, info, instrument, warn};

use muenzwerk_core::error::{MuenzwerkError, Result};
use muenzwerk_core::types::{FileKind, JobId, SessionId, UploadedFile};
use muenzwerk_document::convert::DocumentConverter;
use muenzwerk_print::gateway::PrinterGateway;
use muenzwerk_store::KioskStore;

/// Successful dispatch result, returned to the kiosk controller.
#[derive(Debug, Clone, Serialize)]
pub struct PrintReceipt {
    pub job_id: JobId,
    pub printer: String,
    pub pages: u32,
    pub cost: u32,
    pub remaining_credits: u32,
}

/// Orchestrates one print request end to end.
pub struct Dispatcher<G, C> {
    store: Arc<Mutex<KioskStore>>,
    gateway: Arc<G>,
    converter: Arc<C>,
    price_per_page: u32,
    /// When conversion fails, submit the original file instead of
    /// aborting (configurable best-effort policy).
    fallback_to_original: bool,
}

impl<G, C> Dispatcher<G, C>
where
    G: PrinterGateway,
    C: DocumentConverter,
{
    pub fn new(
        store: Arc<Mutex<KioskStore>>,
        gateway: Arc<G>,
        converter: Arc<C>,
        price_per_page: u32,
        fallback_to_original: bool,
    ) -> Self {
        Self {
            store,
            gateway,
            converter,
            price_per_page,
            fallback_to_original,
        }
    }

    /// Run the full dispatch transaction for one print request.
    ///
    /// `claimed_credits` is the controller's own idea of the session
    /// balance — an advisory early-exit hint only.  It saves a pointless
    /// printer round-trip when the controller already knows it is short,
    /// but the authoritative check is the conditional debit inside the
    /// commit transaction.
    ///
    /// A file may be dispatched any number of times; nothing marks an
    /// upload as consumed (deliberate — reprint behavior is preserved
    /// pending product clarification).
    #[instrument(skip(self), fields(session = %session, claimed_credits))]
    pub async fn dispatch(
        &self,
        session: &SessionId,
        claimed_credits: u32,
        filename: Option<&str>,
    ) -> Result<PrintReceipt> {
        // Resolving: locate the target upload.  No side effects on failure.
        let file = self.resolve_file(session, filename)?;

        // Pricing: pure — the stored page count, never re-estimated.
        let cost = file.page_count * self.price_per_page;

        // Charging (advisory): fail fast before any printer I/O.
        if claimed_credits < cost {
            info!(cost, claimed_credits, "rejected before submission: claimed credits too low");
            return Err(MuenzwerkError::InsufficientFunds {
                needed: cost,
                available: claimed_credits,
            });
        }

        // Submitting: resolve a printer, convert if needed, submit.
        // The ledger lock is NOT held anywhere in this step.
        let target = self
            .gateway
            .resolve()
            .await?
            .ok_or(MuenzwerkError::NoPrinterAvailable)?;

        let (path, kind) = self.printable_form(&file).await?;
        let job_name = format!("Muenzwerk_{session}");
        let submitted = self
            .gateway
            .submit(&target, &path, kind, &job_name)
            .await?;

        // Commit: debit + ledger row + job record, one transaction.  The
        // receipt balance comes out of that same transaction, not a later
        // read that a concurrent coin insert could inflate.
        let committed = {
            let mut store = self.store.lock().expect("store lock poisoned");
            store.commit_print(session, &file, file.page_count, cost)
        };

        match committed {
            Ok((job, remaining)) => {
                info!(job_id = %job.id, printer = %submitted.printer, cost, "print dispatched");
                Ok(PrintReceipt {
                    job_id: job.id,
                    printer: submitted.printer,
                    pages: file.page_count,
                    cost,
                    remaining_credits: remaining,
                })
            }
            Err(MuenzwerkError::InsufficientFunds { needed, available }) => {
                // The page is already on its way out of the printer; it
                // cannot be un-printed.  Operators reconcile manually.
                error!(
                    session = %session,
                    remote_id = submitted.remote_id,
                    printer = %submitted.printer,
                    needed,
                    available,
                    "printed but not charged"
                );
                Err(MuenzwerkError::ConsistencyFault(format!(
                    "session {session}: printer {} accepted job {} ({} credits) but balance was {}",
                    submitted.printer, submitted.remote_id, needed, available
                )))
            }
            Err(other) => Err(other),
        }
    }

    /// Resolving step: filename hint → exact match, otherwise the latest
    /// upload for the session.
    fn resolve_file(&self, session: &SessionId, filename: Option<&str>) -> Result<UploadedFile> {
        let store = self.store.lock().expect("store lock poisoned");
        let file = match filename {
            Some(name) if !name.is_empty() => store.find_file(session, name)?,
            _ => store.latest_file(session)?,
        };
        file.ok_or(MuenzwerkError::NoFileFound)
    }

    /// Decide what actually goes to the printer.
    ///
    /// Word documents are converted to PDF first; on conversion failure the
    /// configurable fallback submits the original bytes (wrong formatting
    /// beats no printout at this kiosk).
    async fn printable_form(&self, file: &UploadedFile) -> Result<(std::path::PathBuf, FileKind)> {
        let original = Path::new(&file.storage_path).to_path_buf();

        if !file.kind.needs_conversion() {
            return Ok((original, file.kind));
        }

        match self.converter.to_pdf(&original).await {
            Ok(pdf) => Ok((pdf, FileKind::Pdf)),
            Err(err) if self.fallback_to_original => {
                warn!(%err, "conversion failed, submitting original file");
                Ok((original, file.kind))
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    use muenzwerk_core::types::JobStatus;
    use muenzwerk_print::gateway::{PrinterTarget, SubmittedJob};
    use muenzwerk_store::NewFile;

    // -- Test doubles --------------------------------------------------------

    #[derive(Clone, Copy)]
    enum SubmitMode {
        Accept,
        Refuse,
        MissingFile,
    }

    struct MockGateway {
        available: bool,
        mode: SubmitMode,
        resolves: AtomicU32,
        submits: AtomicU32,
        last_kind: Mutex<Option<FileKind>>,
    }

    impl MockGateway {
        fn new(available: bool, mode: SubmitMode) -> Self {
            Self {
                available,
                mode,
                resolves: AtomicU32::new(0),
                submits: AtomicU32::new(0),
                last_kind: Mutex::new(None),
            }
        }
    }

    impl PrinterGateway for MockGateway {
        async fn resolve(&self) -> Result<Option<PrinterTarget>> {
            self.resolves.fetch_add(1, Ordering::SeqCst);
            Ok(self.available.then(|| PrinterTarget {
                name: "MockPrinter".into(),
                uri: "mock://printer".into(),
            }))
        }

        async fn submit(
            &self,
            target: &PrinterTarget,
            path: &Path,
            kind: FileKind,
            _job_name: &str,
        ) -> Result<SubmittedJob> {
            self.submits.fetch_add(1, Ordering::SeqCst);
            *self.last_kind.lock().unwrap() = Some(kind);
            let _ = path;
            match self.mode {
                SubmitMode::Accept => Ok(SubmittedJob {
                    printer: target.name.clone(),
                    remote_id: 77,
                }),
                SubmitMode::Refuse => Err(MuenzwerkError::PrintFailed("paper jam".into())),
                SubmitMode::MissingFile => {
                    Err(MuenzwerkError::FileMissing("gone.pdf".into()))
                }
            }
        }
    }

    #[derive(Clone, Copy)]
    enum ConvertMode {
        Succeed,
        Fail,
    }

    struct MockConverter {
        mode: ConvertMode,
        calls: AtomicU32,
    }

    impl MockConverter {
        fn new(mode: ConvertMode) -> Self {
            Self {
                mode,
                calls: AtomicU32::new(0),
            }
        }
    }

    impl DocumentConverter for MockConverter {
        async fn to_pdf(&self, path: &Path) -> Result<PathBuf> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.mode {
                ConvertMode::Succeed => {
                    let pdf = path.with_extension("pdf");
                    std::fs::write(&pdf, b"%PDF-stub").unwrap();
                    Ok(pdf)
                }
                ConvertMode::Fail => {
                    Err(MuenzwerkError::ConversionFailed("soffice timed out".into()))
                }
            }
        }
    }

    // -- Fixture -------------------------------------------------------------

    struct Fixture {
        store: Arc<Mutex<KioskStore>>,
        gateway: Arc<MockGateway>,
        converter: Arc<MockConverter>,
        _dir: tempfile::TempDir,
        dir_path: PathBuf,
    }

    impl Fixture {
        fn new(available: bool, submit: SubmitMode, convert: ConvertMode) -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let dir_path = dir.path().to_path_buf();
            Self {
                store: Arc::new(Mutex::new(
                    KioskStore::open_in_memory().expect("open store"),
                )),
                gateway: Arc::new(MockGateway::new(available, submit)),
                converter: Arc::new(MockConverter::new(convert)),
                _dir: dir,
                dir_path,
            }
        }

        fn dispatcher(&self, fallback: bool) -> Dispatcher<MockGateway, MockConverter> {
            Dispatcher::new(
                Arc::clone(&self.store),
                Arc::clone(&self.gateway),
                Arc::clone(&self.converter),
                1,
                fallback,
            )
        }

        fn upload(&self, session: &str, name: &str, pages: u32, kind: FileKind) -> UploadedFile {
            let path = self.dir_path.join(name);
            std::fs::write(&path, b"document bytes").unwrap();
            let store = self.store.lock().unwrap();
            store.get_or_create_session(&SessionId::from(session)).unwrap();
            store
                .register_file(NewFile {
                    session: SessionId::from(session),
                    stored_name: name.into(),
                    original_name: name.into(),
                    storage_path: path.display().to_string(),
                    byte_size: 14,
                    page_count: pages,
                    kind,
                    sha256: "feed".into(),
                })
                .unwrap()
        }

        fn fund(&self, session: &str, amount: u32) {
            self.store
                .lock()
                .unwrap()
                .add_credits(&SessionId::from(session), amount, "coin")
                .unwrap();
        }

        fn balance(&self, session: &str) -> u32 {
            self.store
                .lock()
                .unwrap()
                .balance(&SessionId::from(session))
                .unwrap()
        }

        fn jobs(&self, session: &str) -> usize {
            self.store
                .lock()
                .unwrap()
                .job_history(Some(&SessionId::from(session)), 100)
                .unwrap()
                .len()
        }
    }

    fn s(id: &str) -> SessionId {
        SessionId::from(id)
    }

    // -- Tests ---------------------------------------------------------------

    #[tokio::test]
    async fn no_upload_means_no_file_found() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        let result = fx.dispatcher(true).dispatch(&s("S1"), 10, None).await;
        assert!(matches!(result, Err(MuenzwerkError::NoFileFound)));
        assert_eq!(fx.gateway.resolves.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn low_claimed_credits_fail_fast_before_printer_io() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 3, FileKind::Pdf);
        fx.fund("S1", 100); // real balance is ample — the claim is what gates

        let result = fx.dispatcher(true).dispatch(&s("S1"), 0, None).await;
        match result {
            Err(MuenzwerkError::InsufficientFunds { needed, available }) => {
                assert_eq!(needed, 3);
                assert_eq!(available, 0);
            }
            other => panic!("expected InsufficientFunds, got {other:?}"),
        }

        // No printer contact, no debit, no job.
        assert_eq!(fx.gateway.resolves.load(Ordering::SeqCst), 0);
        assert_eq!(fx.gateway.submits.load(Ordering::SeqCst), 0);
        assert_eq!(fx.balance("S1"), 100);
        assert_eq!(fx.jobs("S1"), 0);
    }

    #[tokio::test]
    async fn no_printer_means_no_ledger_mutation() {
        let fx = Fixture::new(false, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 2, FileKind::Pdf);
        fx.fund("S1", 5);

        let result = fx.dispatcher(true).dispatch(&s("S1"), 5, None).await;
        assert!(matches!(result, Err(MuenzwerkError::NoPrinterAvailable)));
        assert_eq!(fx.balance("S1"), 5);
        assert_eq!(fx.jobs("S1"), 0);
    }

    #[tokio::test]
    async fn printer_refusal_leaves_ledger_untouched() {
        let fx = Fixture::new(true, SubmitMode::Refuse, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 2, FileKind::Pdf);
        fx.fund("S1", 5);

        let result = fx.dispatcher(true).dispatch(&s("S1"), 5, None).await;
        assert!(matches!(result, Err(MuenzwerkError::PrintFailed(_))));
        assert_eq!(fx.balance("S1"), 5);
        assert_eq!(fx.jobs("S1"), 0);
    }

    #[tokio::test]
    async fn missing_file_surfaces_as_retryable() {
        let fx = Fixture::new(true, SubmitMode::MissingFile, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 1, FileKind::Pdf);
        fx.fund("S1", 5);

        let err = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 5, None)
            .await
            .expect_err("must fail");
        assert!(err.is_retryable());
        assert_eq!(fx.balance("S1"), 5);
        assert_eq!(fx.jobs("S1"), 0);
    }

    #[tokio::test]
    async fn successful_dispatch_debits_and_records_exactly_once() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 3, FileKind::Pdf);
        fx.fund("S1", 3);

        let receipt = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 3, None)
            .await
            .expect("dispatch");

        assert_eq!(receipt.pages, 3);
        assert_eq!(receipt.cost, 3);
        assert_eq!(receipt.remaining_credits, 0);
        assert_eq!(receipt.printer, "MockPrinter");

        assert_eq!(fx.balance("S1"), 0);
        assert_eq!(fx.jobs("S1"), 1);

        let store = fx.store.lock().unwrap();
        let history = store.job_history(Some(&s("S1")), 10).unwrap();
        assert_eq!(history[0].job.status, JobStatus::Printing);
        assert_eq!(history[0].job.cost, 3);
        assert_eq!(store.reconciled_balance(&s("S1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn receipt_balance_comes_from_the_commit_transaction() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 3, FileKind::Pdf);
        fx.fund("S1", 5);

        let receipt = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 5, None)
            .await
            .expect("dispatch");

        assert_eq!(receipt.remaining_credits, 2);
        assert_eq!(fx.balance("S1"), 2);
    }

    #[tokio::test]
    async fn kiosk_scenario_reject_then_fund_then_print() {
        // Session uploads a 3-page file with balance 0.
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "homework.pdf", 3, FileKind::Pdf);
        let dispatcher = fx.dispatcher(true);

        let refused = dispatcher.dispatch(&s("S1"), 0, None).await;
        assert!(matches!(
            refused,
            Err(MuenzwerkError::InsufficientFunds { .. })
        ));
        assert_eq!(fx.balance("S1"), 0);
        assert_eq!(fx.jobs("S1"), 0);

        fx.fund("S1", 3);
        assert_eq!(fx.balance("S1"), 3);

        let receipt = dispatcher.dispatch(&s("S1"), 3, None).await.expect("print");
        assert_eq!(receipt.cost, 3);
        assert_eq!(fx.balance("S1"), 0);
        assert_eq!(fx.jobs("S1"), 1);
    }

    #[tokio::test]
    async fn overstated_claim_becomes_consistency_fault_after_submission() {
        // The controller lies (claims 3, real balance 0): the advisory
        // check passes, the printer accepts, the commit then fails.
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "essay.pdf", 3, FileKind::Pdf);

        let err = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 3, None)
            .await
            .expect_err("must fail");
        assert!(matches!(err, MuenzwerkError::ConsistencyFault(_)));

        // The physical page is gone but the ledger stayed consistent:
        // no debit, no job row, balance still zero.
        assert_eq!(fx.gateway.submits.load(Ordering::SeqCst), 1);
        assert_eq!(fx.balance("S1"), 0);
        assert_eq!(fx.jobs("S1"), 0);
        let store = fx.store.lock().unwrap();
        assert_eq!(store.reconciled_balance(&s("S1")).unwrap(), 0);
    }

    #[tokio::test]
    async fn word_documents_are_converted_before_submission() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "letter.docx", 1, FileKind::Docx);
        fx.fund("S1", 1);

        fx.dispatcher(true)
            .dispatch(&s("S1"), 1, None)
            .await
            .expect("dispatch");

        assert_eq!(fx.converter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*fx.gateway.last_kind.lock().unwrap(), Some(FileKind::Pdf));
    }

    #[tokio::test]
    async fn conversion_failure_falls_back_to_original_when_enabled() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Fail);
        fx.upload("S1", "letter.docx", 1, FileKind::Docx);
        fx.fund("S1", 1);

        let receipt = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 1, None)
            .await
            .expect("dispatch");
        assert_eq!(receipt.cost, 1);
        assert_eq!(*fx.gateway.last_kind.lock().unwrap(), Some(FileKind::Docx));
        assert_eq!(fx.balance("S1"), 0);
    }

    #[tokio::test]
    async fn conversion_failure_aborts_when_fallback_disabled() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Fail);
        fx.upload("S1", "letter.docx", 1, FileKind::Docx);
        fx.fund("S1", 1);

        let result = fx.dispatcher(false).dispatch(&s("S1"), 1, None).await;
        assert!(matches!(result, Err(MuenzwerkError::ConversionFailed(_))));
        assert_eq!(fx.gateway.submits.load(Ordering::SeqCst), 0);
        assert_eq!(fx.balance("S1"), 1);
        assert_eq!(fx.jobs("S1"), 0);
    }

    #[tokio::test]
    async fn filename_hint_selects_the_named_upload() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "first.pdf", 5, FileKind::Pdf);
        fx.upload("S1", "second.pdf", 1, FileKind::Pdf);
        fx.fund("S1", 10);

        let receipt = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 10, Some("first.pdf"))
            .await
            .expect("dispatch");
        assert_eq!(receipt.pages, 5);

        let latest = fx
            .dispatcher(true)
            .dispatch(&s("S1"), 10, None)
            .await
            .expect("dispatch");
        assert_eq!(latest.pages, 1);
    }

    #[tokio::test]
    async fn reprinting_the_same_file_bills_again() {
        let fx = Fixture::new(true, SubmitMode::Accept, ConvertMode::Succeed);
        fx.upload("S1", "ticket.pdf", 1, FileKind::Pdf);
        fx.fund("S1", 2);
        let dispatcher = fx.dispatcher(true);

        dispatcher.dispatch(&s("S1"), 2, None).await.expect("first");
        dispatcher.dispatch(&s("S1"), 1, None).await.expect("second");

        assert_eq!(fx.balance("S1"), 0);
        assert_eq!(fx.jobs("S1"), 2);
    }
}
