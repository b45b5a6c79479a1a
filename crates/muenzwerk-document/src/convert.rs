// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Word-document conversion for printing.
//
// doc/docx uploads cannot be submitted to a printer as-is; they are
// converted to PDF by shelling out to LibreOffice in headless mode.  The
// subprocess runs under a hard timeout — a hung converter is treated as a
// conversion failure, which the dispatcher may answer with its best-effort
// original-file fallback.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, instrument, warn};

use muenzwerk_core::error::{MuenzwerkError, Result};

/// Converts an uploaded document into a printable PDF.
pub trait DocumentConverter: Send + Sync {
    fn to_pdf(&self, path: &Path) -> impl Future<Output = Result<PathBuf>> + Send;
}

/// LibreOffice-backed converter (`soffice --headless --convert-to pdf`).
///
/// The output PDF lands next to the input file with a `.pdf` extension.
#[derive(Debug, Clone)]
pub struct SofficeConverter {
    /// Converter binary; overridable for tests and unusual installs.
    command: String,
    timeout: Duration,
}

impl SofficeConverter {
    pub fn new(timeout: Duration) -> Self {
        Self {
            command: "soffice".into(),
            timeout,
        }
    }

    /// Use a different converter binary (tests, custom installs).
    pub fn with_command(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

impl DocumentConverter for SofficeConverter {
    #[instrument(skip(self), fields(path = %path.display()))]
    async fn to_pdf(&self, path: &Path) -> Result<PathBuf> {
        let output_dir = path.parent().ok_or_else(|| {
            MuenzwerkError::ConversionFailed(format!("no parent directory for {}", path.display()))
        })?;

        let run = Command::new(&self.command)
            .arg("--headless")
            .arg("--convert-to")
            .arg("pdf")
            .arg("--outdir")
            .arg(output_dir)
            .arg(path)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| {
                warn!(timeout_secs = self.timeout.as_secs(), "conversion timed out");
                MuenzwerkError::ConversionFailed(format!(
                    "timed out after {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| MuenzwerkError::ConversionFailed(format!("spawn {}: {e}", self.command)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuenzwerkError::ConversionFailed(format!(
                "converter exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let pdf_path = path.with_extension("pdf");
        if !pdf_path.exists() {
            return Err(MuenzwerkError::ConversionFailed(format!(
                "converter reported success but {} was not created",
                pdf_path.display()
            )));
        }

        info!(pdf = %pdf_path.display(), "document converted");
        Ok(pdf_path)
    }
}
