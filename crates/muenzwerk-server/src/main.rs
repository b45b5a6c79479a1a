// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Münzwerk — coin-operated print kiosk server.
//
// Entry point. Initialises logging, loads the config, opens the store,
// wires the service layer, and serves the kiosk HTTP API.

mod api;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use muenzwerk_core::config::KioskConfig;
use muenzwerk_document::convert::SofficeConverter;
use muenzwerk_document::estimate::HeuristicEstimator;
use muenzwerk_engine::services::KioskServices;
use muenzwerk_print::ipp_gateway::IppGateway;
use muenzwerk_store::KioskStore;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Münzwerk starting");

    let config_path =
        std::env::var("MUENZWERK_CONFIG").unwrap_or_else(|_| "muenzwerk.json".into());
    let config = KioskConfig::load(&config_path);
    if !std::path::Path::new(&config_path).exists() {
        // Seed the file so operators have something to edit.
        if let Err(e) = config.save(&config_path) {
            tracing::warn!(config = %config_path, error = %e, "could not write default config");
        }
    }
    tracing::info!(
        config = %config_path,
        db = %config.database_path.display(),
        uploads = %config.upload_dir.display(),
        printers = config.printer_uris.len(),
        "configuration loaded"
    );

    let store = match KioskStore::open(&config.database_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, "could not open the kiosk database");
            std::process::exit(1);
        }
    };

    let gateway = Arc::new(IppGateway::new(
        config.printer_uris.clone(),
        config.preferred_printer.clone(),
    ));
    let converter = Arc::new(SofficeConverter::new(Duration::from_secs(
        config.convert_timeout_secs,
    )));
    let port = config.server_port;

    let services = KioskServices::new(
        Arc::new(Mutex::new(store)),
        gateway,
        converter,
        Arc::new(HeuristicEstimator),
        config,
    );

    if let Err(e) = api::serve(api::ApiState::new(services), port).await {
        tracing::error!(error = %e, "kiosk API server failed");
        std::process::exit(1);
    }
}
