// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Wire types for the kiosk HTTP API.

use serde::{Deserialize, Serialize};

/// Request body for `POST /upload`.
///
/// The document travels as base64 in the JSON body; kiosk controllers
/// send small files over a trusted LAN, so the 33% overhead is acceptable.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadRequest {
    pub session_id: String,
    pub filename: String,
    /// Base64-encoded document bytes.
    pub data: String,
}

/// Request body for `POST /print`.
#[derive(Debug, Clone, Deserialize)]
pub struct PrintRequest {
    pub session_id: String,
    /// The controller's own idea of the session balance (advisory).
    pub credits: u32,
    /// Stored name of a specific upload; omitted means "latest".
    #[serde(default)]
    pub filename: Option<String>,
}

/// Request body for `POST /api/check_pages` (pre-upload quote).
#[derive(Debug, Clone, Deserialize)]
pub struct CheckPagesRequest {
    /// Accepted for parity with the other endpoints; the quote itself is
    /// session-independent.
    #[serde(default)]
    pub session_id: Option<String>,
    pub filename: String,
}

/// Response for `POST /api/check_pages`.
#[derive(Debug, Serialize)]
pub struct CheckPagesResponse {
    pub filename: String,
    pub pages: u32,
    pub cost: u32,
}

/// Request body for `POST /api/jobs/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusRequest {
    /// One of `printing`, `completed`, `failed`.
    pub status: String,
}

/// Request body for `POST /api/credits` (coins inserted).
#[derive(Debug, Clone, Deserialize)]
pub struct CreditsRequest {
    pub session_id: String,
    pub amount: u32,
}

/// Balance response for credit endpoints.
#[derive(Debug, Serialize)]
pub struct CreditsResponse {
    pub session_id: String,
    pub credits: u32,
}

/// Query string for `GET /api/check_credits`.
#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    pub session_id: String,
}

/// Query string for `GET /api/history`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub limit: Option<u32>,
}

/// Error response body.
///
/// `kind` is the stable machine-readable discriminator from
/// `MuenzwerkError::kind`; controllers branch on it, not on the message.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: &'static str,
}
