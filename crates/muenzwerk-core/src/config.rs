// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Kiosk configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Persistent kiosk settings, loaded from a JSON file at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Path of the SQLite database holding sessions, files, the ledger,
    /// and print jobs.
    pub database_path: PathBuf,
    /// Directory where uploaded document bytes are stored.
    pub upload_dir: PathBuf,
    /// Price in credits charged per printed page.
    pub price_per_page: u32,
    /// Maximum accepted upload size in bytes.
    pub max_upload_bytes: u64,
    /// Candidate printer URIs (ipp:// or ipps://), probed in order.
    pub printer_uris: Vec<String>,
    /// Preferred printer name; used when several URIs respond.
    pub preferred_printer: Option<String>,
    /// Hard timeout for the document conversion subprocess, in seconds.
    pub convert_timeout_secs: u64,
    /// When conversion of a doc/docx fails, submit the original file
    /// instead of aborting.  Trades formatting fidelity for availability.
    pub print_original_on_conversion_failure: bool,
    /// Port for the kiosk HTTP API.
    pub server_port: u16,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("muenzwerk.db"),
            upload_dir: PathBuf::from("uploads"),
            price_per_page: 1,
            max_upload_bytes: 50 * 1024 * 1024,
            printer_uris: Vec::new(),
            preferred_printer: None,
            convert_timeout_secs: 30,
            print_original_on_conversion_failure: true,
            server_port: 5000,
        }
    }
}

impl KioskConfig {
    /// Load the config from a JSON file; missing or unreadable files fall
    /// back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Self {
        std::fs::read_to_string(path.as_ref())
            .ok()
            .and_then(|data| serde_json::from_str(&data).ok())
            .unwrap_or_default()
    }

    /// Persist the config as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = KioskConfig::default();
        assert_eq!(config.price_per_page, 1);
        assert_eq!(config.max_upload_bytes, 50 * 1024 * 1024);
        assert_eq!(config.convert_timeout_secs, 30);
        assert!(config.print_original_on_conversion_failure);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let config = KioskConfig::load("/nonexistent/muenzwerk.json");
        assert_eq!(config.server_port, 5000);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");

        let mut config = KioskConfig::default();
        config.price_per_page = 2;
        config.printer_uris = vec!["ipp://192.168.1.50:631/ipp/print".into()];
        config.save(&path).expect("save");

        let loaded = KioskConfig::load(&path);
        assert_eq!(loaded.price_per_page, 2);
        assert_eq!(loaded.printer_uris.len(), 1);
    }

    #[test]
    fn partial_json_uses_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"price_per_page": 3}"#).expect("write");

        let loaded = KioskConfig::load(&path);
        assert_eq!(loaded.price_per_page, 3);
        assert_eq!(loaded.server_port, 5000);
    }
}
