// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON handlers — thin shells over `KioskServices`.  All policy lives in
// the service layer; this module only decodes requests and maps domain
// errors to status codes.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::error;

use muenzwerk_core::error::MuenzwerkError;
use muenzwerk_core::types::{FileId, JobId, JobRecord, JobStatus, SessionId};
use muenzwerk_document::convert::DocumentConverter;
use muenzwerk_document::estimate::PageEstimator;
use muenzwerk_engine::dispatcher::PrintReceipt;
use muenzwerk_engine::services::{KioskStatus, UploadReceipt};
use muenzwerk_print::gateway::PrinterGateway;

use crate::api::ApiState;
use crate::api::types::*;

type Reject = (StatusCode, Json<ErrorResponse>);

/// Map a domain error onto an HTTP status and wire body.
///
/// Insufficient funds is a 400, matching what kiosk controllers already
/// expect; consistency faults are 500s with a distinct `kind` so they can
/// be alarmed on.
fn reject(err: MuenzwerkError) -> Reject {
    let status = match &err {
        MuenzwerkError::InvalidInput(_)
        | MuenzwerkError::DisallowedKind(_)
        | MuenzwerkError::InsufficientFunds { .. } => StatusCode::BAD_REQUEST,
        MuenzwerkError::NoFileFound
        | MuenzwerkError::JobNotFound(_)
        | MuenzwerkError::FileMissing(_) => StatusCode::NOT_FOUND,
        MuenzwerkError::NoPrinterAvailable => StatusCode::SERVICE_UNAVAILABLE,
        MuenzwerkError::PrintFailed(_)
        | MuenzwerkError::ConversionFailed(_)
        | MuenzwerkError::Estimation(_)
        | MuenzwerkError::ConsistencyFault(_)
        | MuenzwerkError::Database(_)
        | MuenzwerkError::Io(_)
        | MuenzwerkError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!(kind = err.kind(), %err, "request failed");
    }

    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            kind: err.kind(),
        }),
    )
}

/// POST /upload — store a document and quote its price.
pub async fn upload<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Json(body): Json<UploadRequest>,
) -> Result<(StatusCode, Json<UploadReceipt>), Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let bytes = BASE64.decode(&body.data).map_err(|e| {
        reject(MuenzwerkError::InvalidInput(format!(
            "payload is not valid base64: {e}"
        )))
    })?;

    let session = SessionId(body.session_id);
    let receipt = state
        .services
        .upload(&session, &body.filename, &bytes)
        .await
        .map_err(reject)?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// POST /api/check_pages — pre-upload page quote from the filename.
pub async fn check_pages<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Json(body): Json<CheckPagesRequest>,
) -> Result<Json<CheckPagesResponse>, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let (pages, cost) = state.services.check_pages(&body.filename).map_err(reject)?;

    Ok(Json(CheckPagesResponse {
        filename: body.filename,
        pages,
        cost,
    }))
}

/// POST /print — run the charge-and-print transaction.
pub async fn print<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Json(body): Json<PrintRequest>,
) -> Result<Json<PrintReceipt>, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let session = SessionId(body.session_id);
    let receipt = state
        .services
        .print(&session, body.credits, body.filename.as_deref())
        .await
        .map_err(reject)?;

    Ok(Json(receipt))
}

/// POST /api/credits — coins inserted.
pub async fn add_credits<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Json(body): Json<CreditsRequest>,
) -> Result<Json<CreditsResponse>, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let session = SessionId(body.session_id);
    let credits = state
        .services
        .add_credits(&session, body.amount)
        .map_err(reject)?;

    Ok(Json(CreditsResponse {
        session_id: session.0,
        credits,
    }))
}

/// GET /api/check_credits — current balance (0 for unseen sessions).
pub async fn check_credits<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Query(query): Query<SessionQuery>,
) -> Result<Json<CreditsResponse>, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let session = SessionId(query.session_id);
    let credits = state.services.check_credits(&session).map_err(reject)?;

    Ok(Json(CreditsResponse {
        session_id: session.0,
        credits,
    }))
}

/// GET /api/status — printer reachability plus aggregate counters.
pub async fn status<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
) -> Result<Json<KioskStatus>, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let status = state.services.status().await.map_err(reject)?;
    Ok(Json(status))
}

/// GET /api/history — print history, newest first.
pub async fn history<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<JobRecord>>, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let session = query.session_id.map(SessionId);
    let limit = query.limit.unwrap_or(50);
    let records = state
        .services
        .history(session.as_ref(), limit)
        .map_err(reject)?;

    Ok(Json(records))
}

/// POST /api/jobs/{id}/status — operator update of a job's lifecycle.
pub async fn set_job_status<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Path(id): Path<i64>,
    Json(body): Json<JobStatusRequest>,
) -> Result<StatusCode, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let status = JobStatus::parse(&body.status).ok_or_else(|| {
        reject(MuenzwerkError::InvalidInput(format!(
            "unknown job status '{}'",
            body.status
        )))
    })?;

    state
        .services
        .set_job_status(JobId(id), status)
        .map_err(reject)?;

    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/files/{id} — remove an upload (record and bytes).
pub async fn delete_file<G, C, E>(
    State(state): State<ApiState<G, C, E>>,
    Path(id): Path<i64>,
    Query(query): Query<SessionQuery>,
) -> Result<StatusCode, Reject>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let session = SessionId(query.session_id);
    state
        .services
        .delete_file(&session, FileId(id))
        .await
        .map_err(reject)?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/health — liveness probe.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
