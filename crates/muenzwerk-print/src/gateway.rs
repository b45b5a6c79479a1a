// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer gateway seam.
//
// The dispatcher treats physical printing as a black box behind this
// trait: resolve an available printer, submit a file, get back a job
// handle or an error.  Keeping the seam here lets the dispatch state
// machine be tested against mock gateways without any network.

use std::path::Path;

use muenzwerk_core::error::Result;
use muenzwerk_core::types::FileKind;

/// A physical printer the gateway is willing to submit to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterTarget {
    /// Human-readable printer name (shown in history and logs).
    pub name: String,
    /// Protocol address, e.g. `ipp://192.168.1.50:631/ipp/print`.
    pub uri: String,
}

/// Handle returned by the printer after it accepted a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedJob {
    /// Name of the printer that accepted the job.
    pub printer: String,
    /// Job identifier assigned by the printer itself.
    pub remote_id: i32,
}

/// Abstracts physical print submission.
///
/// Submission may block for seconds (physical I/O); callers must not hold
/// the ledger lock across these methods.  Once a submission returns
/// successfully there is no cancellation primitive — the job runs on the
/// device to completion or failure independently.
pub trait PrinterGateway: Send + Sync {
    /// Resolve an available printer.  `Ok(None)` means no printer is
    /// currently reachable.
    fn resolve(&self) -> impl Future<Output = Result<Option<PrinterTarget>>> + Send;

    /// Submit the file at `path` to `target`.
    ///
    /// A missing file must surface as a retryable `FileMissing` error
    /// (an administrative delete may race with dispatch); every other
    /// failure is a collaborator error.
    fn submit(
        &self,
        target: &PrinterTarget,
        path: &Path,
        kind: FileKind,
        job_name: &str,
    ) -> impl Future<Output = Result<SubmittedJob>> + Send;
}
