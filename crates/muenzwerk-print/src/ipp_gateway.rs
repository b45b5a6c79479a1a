// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP printer gateway.
//
// Uses the `ipp` crate's async API:
//   - Get-Printer-Attributes  (RFC 8011 §4.2.5) to probe availability
//   - Print-Job               (RFC 8011 §4.2.1) to submit documents
//
// The kiosk targets a small fixed list of configured printer URIs; resolve
// probes them in order and prefers the configured printer name when
// several respond.

use std::io::Cursor;
use std::path::Path;

use ipp::prelude::*;
use tracing::{debug, error, info, instrument, warn};

use muenzwerk_core::error::{MuenzwerkError, Result};
use muenzwerk_core::types::FileKind;

use crate::gateway::{PrinterGateway, PrinterTarget, SubmittedJob};

/// Gateway over one or more configured IPP printers.
pub struct IppGateway {
    /// Candidate printer URIs, probed in order.
    uris: Vec<String>,
    /// Preferred printer name; wins when several URIs respond.
    preferred: Option<String>,
}

impl IppGateway {
    pub fn new(uris: Vec<String>, preferred: Option<String>) -> Self {
        Self { uris, preferred }
    }

    /// Probe one URI with Get-Printer-Attributes; `Some` if it responds.
    #[instrument(skip(self), fields(uri))]
    async fn probe(&self, uri: &str) -> Option<PrinterTarget> {
        let parsed: Uri = match uri.parse() {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(uri, error = %e, "invalid printer URI in config");
                return None;
            }
        };

        let operation = IppOperationBuilder::get_printer_attributes(parsed.clone()).build();
        let client = AsyncIppClient::new(parsed);

        debug!(uri, "sending Get-Printer-Attributes");
        let response = match client.send(operation).await {
            Ok(response) => response,
            Err(e) => {
                debug!(uri, error = %e, "printer did not respond");
                return None;
            }
        };

        if !response.header().status_code().is_success() {
            debug!(uri, status = ?response.header().status_code(), "printer refused probe");
            return None;
        }

        let name = printer_name(response.attributes()).unwrap_or_else(|| uri.to_owned());
        Some(PrinterTarget {
            name,
            uri: uri.to_owned(),
        })
    }
}

impl PrinterGateway for IppGateway {
    /// Probe the configured URIs and pick a target.
    ///
    /// The preferred printer wins if it responds; otherwise the first
    /// responsive URI is used.  `Ok(None)` when nothing answers.
    async fn resolve(&self) -> Result<Option<PrinterTarget>> {
        let mut first_responsive = None;

        for uri in &self.uris {
            if let Some(target) = self.probe(uri).await {
                if let Some(ref preferred) = self.preferred
                    && target.name == *preferred
                {
                    info!(printer = %target.name, "preferred printer resolved");
                    return Ok(Some(target));
                }
                if first_responsive.is_none() {
                    first_responsive = Some(target);
                }
            }
        }

        if let Some(ref target) = first_responsive {
            info!(printer = %target.name, "printer resolved");
        } else {
            warn!("no configured printer responded");
        }
        Ok(first_responsive)
    }

    /// Submit the document as a Print-Job and return the printer's job-id.
    #[instrument(skip(self, target), fields(printer = %target.name, path = %path.display()))]
    async fn submit(
        &self,
        target: &PrinterTarget,
        path: &Path,
        kind: FileKind,
        job_name: &str,
    ) -> Result<SubmittedJob> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MuenzwerkError::FileMissing(path.display().to_string())
            } else {
                MuenzwerkError::Io(e)
            }
        })?;

        let uri: Uri = target
            .uri
            .parse()
            .map_err(|e| MuenzwerkError::PrintFailed(format!("invalid URI '{}': {e}", target.uri)))?;

        let format = kind.mime_type_for(path);
        let payload = IppPayload::new(Cursor::new(bytes));
        let operation = IppOperationBuilder::print_job(uri.clone(), payload)
            .job_title(job_name)
            .document_format(format)
            .build();

        let client = AsyncIppClient::new(uri);

        info!(mime = format, "sending Print-Job");
        let response = client
            .send(operation)
            .await
            .map_err(|e| MuenzwerkError::PrintFailed(format!("Print-Job: {e}")))?;

        if !response.header().status_code().is_success() {
            let code = response.header().status_code();
            error!(status = ?code, "Print-Job failed");
            return Err(MuenzwerkError::PrintFailed(format!(
                "Print-Job returned status {code:?}"
            )));
        }

        let remote_id = extract_job_id(response.attributes()).ok_or_else(|| {
            MuenzwerkError::PrintFailed("Print-Job response missing job-id attribute".into())
        })?;

        info!(remote_id, "print job accepted by printer");
        Ok(SubmittedJob {
            printer: target.name.clone(),
            remote_id,
        })
    }
}

/// Extract the `printer-name` attribute from a probe response.
fn printer_name(attrs: &IppAttributes) -> Option<String> {
    for group in attrs.groups_of(DelimiterTag::PrinterAttributes) {
        if let Some(attr) = group.attributes().get("printer-name") {
            return Some(format!("{}", attr.value()));
        }
    }
    None
}

/// Extract the `job-id` integer from a response's Job Attributes group.
fn extract_job_id(attrs: &IppAttributes) -> Option<i32> {
    for group in attrs.groups_of(DelimiterTag::JobAttributes) {
        if let Some(attr) = group.attributes().get("job-id")
            && let IppValue::Integer(id) = attr.value()
        {
            return Some(*id);
        }
    }
    None
}
