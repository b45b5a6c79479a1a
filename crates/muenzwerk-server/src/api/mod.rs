// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kiosk HTTP API — JSON routes over the service layer.  The kiosk
// controller (coin box firmware) is the only intended client; the API is
// served on the kiosk's LAN and mirrors the operations the controller
// performs: upload, print, coin insert, balance check, history, status.

pub mod handlers;
pub mod types;

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get, post};
use tower_http::cors::CorsLayer;

use muenzwerk_document::convert::DocumentConverter;
use muenzwerk_document::estimate::PageEstimator;
use muenzwerk_engine::services::KioskServices;
use muenzwerk_print::gateway::PrinterGateway;

/// Shared state for API handlers.
pub struct ApiState<G, C, E> {
    pub services: Arc<KioskServices<G, C, E>>,
}

// Derived Clone would require G: Clone etc.; only the Arc is cloned.
impl<G, C, E> Clone for ApiState<G, C, E> {
    fn clone(&self) -> Self {
        Self {
            services: Arc::clone(&self.services),
        }
    }
}

impl<G, C, E> ApiState<G, C, E> {
    pub fn new(services: KioskServices<G, C, E>) -> Self {
        Self {
            services: Arc::new(services),
        }
    }
}

/// Build the axum router with all kiosk routes.
pub fn build_router<G, C, E>(state: ApiState<G, C, E>) -> Router
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    Router::new()
        .route("/upload", post(handlers::upload::<G, C, E>))
        .route("/print", post(handlers::print::<G, C, E>))
        .route("/api/credits", post(handlers::add_credits::<G, C, E>))
        .route(
            "/api/check_credits",
            get(handlers::check_credits::<G, C, E>),
        )
        .route("/api/check_pages", post(handlers::check_pages::<G, C, E>))
        .route("/api/status", get(handlers::status::<G, C, E>))
        .route("/api/history", get(handlers::history::<G, C, E>))
        .route(
            "/api/jobs/{id}/status",
            post(handlers::set_job_status::<G, C, E>),
        )
        .route("/api/files/{id}", delete(handlers::delete_file::<G, C, E>))
        .route("/api/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the API on the given port (blocks until shutdown).
pub async fn serve<G, C, E>(state: ApiState<G, C, E>, port: u16) -> std::io::Result<()>
where
    G: PrinterGateway + 'static,
    C: DocumentConverter + 'static,
    E: PageEstimator + 'static,
{
    let addr = format!("0.0.0.0:{port}");
    let router = build_router(state);

    tracing::info!(%addr, "kiosk API listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await
}
