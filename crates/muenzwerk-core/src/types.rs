// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Münzwerk print kiosk.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque session identifier issued by the kiosk controller.
///
/// Sessions are not created server-side until first referenced; an unseen
/// id simply starts with a zero credit balance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry identifier for an uploaded file (monotonically increasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileId(pub i64);

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier for a recorded print job (monotonically increasing).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub i64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Supported upload document kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Pdf,
    Doc,
    Docx,
    Image,
    Text,
}

impl FileKind {
    /// Infer the kind from a file extension.  Returns `None` for anything
    /// the kiosk does not accept.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "jpg" | "jpeg" | "png" => Some(Self::Image),
            "txt" => Some(Self::Text),
            _ => None,
        }
    }

    /// MIME type to declare as the IPP `document-format`.
    ///
    /// `Image` covers both jpeg and png uploads, so the stored file's
    /// extension decides between them.
    pub fn mime_type_for(&self, path: &std::path::Path) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Doc => "application/msword",
            Self::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Image => match path.extension().and_then(|e| e.to_str()) {
                Some(ext) if ext.eq_ignore_ascii_case("png") => "image/png",
                _ => "image/jpeg",
            },
            Self::Text => "text/plain",
        }
    }

    /// Whether the file must be converted to PDF before submission.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, Self::Doc | Self::Docx)
    }

    /// TEXT column value (also used in API responses).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Doc => "doc",
            Self::Docx => "docx",
            Self::Image => "image",
            Self::Text => "text",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "image" => Some(Self::Image),
            "text" => Some(Self::Text),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A session's credit account.
///
/// `balance` is non-negative by construction: the store only ever debits
/// through a conditional update that cannot take it below zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionAccount {
    pub session: SessionId,
    pub balance: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

/// Durable record of one uploaded document.
///
/// Immutable once created except for deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadedFile {
    pub id: FileId,
    pub session: SessionId,
    /// Server-assigned name under the upload directory (timestamped).
    pub stored_name: String,
    /// Name the client supplied at upload time.
    pub original_name: String,
    pub storage_path: String,
    pub byte_size: u64,
    /// Billable page count, at least 1.  Fixed at upload time; the
    /// dispatcher never re-estimates.
    pub page_count: u32,
    pub kind: FileKind,
    /// SHA-256 hex digest of the stored bytes.
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Direction of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxKind {
    /// Coins inserted — credits added.
    #[serde(rename = "credit-add")]
    CreditAdd,
    /// Credits consumed by a print.
    #[serde(rename = "debit")]
    Debit,
}

impl TxKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditAdd => "credit-add",
            Self::Debit => "debit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "credit-add" => Some(Self::CreditAdd),
            "debit" => Some(Self::Debit),
            _ => None,
        }
    }
}

/// One append-only ledger entry.  Never updated or deleted: the sum of all
/// entries for a session must always reconcile to its balance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: i64,
    pub session: SessionId,
    pub kind: TxKind,
    /// Always positive; the sign is carried by `kind`.
    pub amount: u32,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of a dispatched print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted to the printer and charged.
    Printing,
    /// Confirmed complete (operator/poll update).
    Completed,
    /// Failed after submission (operator update).
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Printing => "printing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "printing" => Some(Self::Printing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Durable record of one successful physical submission and its charge.
///
/// Created only after the printer accepted the document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub session: SessionId,
    pub file_id: FileId,
    pub pages: u32,
    pub cost: u32,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
}

/// A print job joined with its file metadata, as returned by history queries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    #[serde(flatten)]
    pub job: PrintJob,
    pub original_name: String,
    pub file_kind: FileKind,
}

/// Aggregate counters for the operator status endpoint.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct KioskStats {
    pub total_sessions: u64,
    pub total_prints: u64,
    pub total_revenue: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_extension() {
        assert_eq!(FileKind::from_extension("PDF"), Some(FileKind::Pdf));
        assert_eq!(FileKind::from_extension("jpeg"), Some(FileKind::Image));
        assert_eq!(FileKind::from_extension("docx"), Some(FileKind::Docx));
        assert_eq!(FileKind::from_extension("exe"), None);
        assert_eq!(FileKind::from_extension(""), None);
    }

    #[test]
    fn kind_round_trips_through_text() {
        for kind in [
            FileKind::Pdf,
            FileKind::Doc,
            FileKind::Docx,
            FileKind::Image,
            FileKind::Text,
        ] {
            assert_eq!(FileKind::parse(kind.as_str()), Some(kind));
        }
    }

    #[test]
    fn submit_mime_follows_the_stored_extension() {
        use std::path::Path;
        assert_eq!(
            FileKind::Image.mime_type_for(Path::new("photo.png")),
            "image/png"
        );
        assert_eq!(
            FileKind::Image.mime_type_for(Path::new("photo.PNG")),
            "image/png"
        );
        assert_eq!(
            FileKind::Image.mime_type_for(Path::new("photo.jpg")),
            "image/jpeg"
        );
        assert_eq!(
            FileKind::Pdf.mime_type_for(Path::new("essay.pdf")),
            "application/pdf"
        );
    }

    #[test]
    fn only_word_documents_need_conversion() {
        assert!(FileKind::Doc.needs_conversion());
        assert!(FileKind::Docx.needs_conversion());
        assert!(!FileKind::Pdf.needs_conversion());
        assert!(!FileKind::Image.needs_conversion());
        assert!(!FileKind::Text.needs_conversion());
    }

    #[test]
    fn tx_kind_text_values() {
        assert_eq!(TxKind::CreditAdd.as_str(), "credit-add");
        assert_eq!(TxKind::parse("debit"), Some(TxKind::Debit));
        assert_eq!(TxKind::parse("refund"), None);
    }

    #[test]
    fn job_status_text_values() {
        assert_eq!(JobStatus::parse("printing"), Some(JobStatus::Printing));
        assert_eq!(JobStatus::parse("done"), None);
    }
}
