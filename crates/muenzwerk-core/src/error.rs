// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Münzwerk.

use thiserror::Error;

/// Top-level error type for all Münzwerk operations.
#[derive(Debug, Error)]
pub enum MuenzwerkError {
    // -- Validation --
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("file type not allowed: {0}")]
    DisallowedKind(String),

    // -- Not found --
    #[error("no file uploaded for this session")]
    NoFileFound,

    #[error("print job {0} not found")]
    JobNotFound(i64),

    /// The registry record exists but the stored bytes are gone (e.g. a
    /// concurrent administrative delete).  Retryable after re-upload.
    #[error("stored file missing on disk: {0}")]
    FileMissing(String),

    // -- Business rejection --
    #[error("insufficient credits: need {needed}, have {available}")]
    InsufficientFunds { needed: u32, available: u32 },

    // -- Collaborator failures --
    #[error("no printer available")]
    NoPrinterAvailable,

    #[error("print submission failed: {0}")]
    PrintFailed(String),

    #[error("document conversion failed: {0}")]
    ConversionFailed(String),

    #[error("page estimation failed: {0}")]
    Estimation(String),

    /// The physical print was already submitted but the ledger debit could
    /// not be applied.  Logged distinctly for manual reconciliation — never
    /// silently dropped.
    #[error("printed but not charged — manual reconciliation required: {0}")]
    ConsistencyFault(String),

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MuenzwerkError {
    /// Whether the caller may usefully retry the same request unchanged.
    ///
    /// Only `FileMissing` qualifies; everything else either needs different
    /// input (validation, funds) or operator attention (collaborators,
    /// consistency faults).  The core itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::FileMissing(_))
    }

    /// Stable machine-readable error kind for API responses and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::DisallowedKind(_) => "disallowed_kind",
            Self::NoFileFound => "no_file_found",
            Self::JobNotFound(_) => "job_not_found",
            Self::FileMissing(_) => "file_missing",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::NoPrinterAvailable => "no_printer_available",
            Self::PrintFailed(_) => "print_failed",
            Self::ConversionFailed(_) => "conversion_failed",
            Self::Estimation(_) => "estimation_failed",
            Self::ConsistencyFault(_) => "consistency_fault",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, MuenzwerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_file_missing_is_retryable() {
        assert!(MuenzwerkError::FileMissing("gone.pdf".into()).is_retryable());
        assert!(!MuenzwerkError::NoFileFound.is_retryable());
        assert!(
            !MuenzwerkError::InsufficientFunds {
                needed: 3,
                available: 0
            }
            .is_retryable()
        );
        assert!(!MuenzwerkError::PrintFailed("jam".into()).is_retryable());
    }

    #[test]
    fn kinds_are_stable() {
        assert_eq!(
            MuenzwerkError::InsufficientFunds {
                needed: 5,
                available: 2
            }
            .kind(),
            "insufficient_funds"
        );
        assert_eq!(
            MuenzwerkError::ConsistencyFault("job 9".into()).kind(),
            "consistency_fault"
        );
    }
}
