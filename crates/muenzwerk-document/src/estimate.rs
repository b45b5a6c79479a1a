// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Billable-page estimation.
//
// The estimator decides how many pages a session will be charged for, so
// it must never abort the upload flow: any parse or I/O problem falls back
// to a conservative single page rather than surfacing an error.

use std::path::Path;

use tracing::{debug, instrument, warn};

use muenzwerk_core::error::Result;
use muenzwerk_core::types::FileKind;

/// Lines of plain text billed as one page.
const TEXT_LINES_PER_PAGE: u64 = 50;

/// Rough bytes-per-page for word documents.  The kiosk carries no docx
/// parser, so the estimate is size-derived.
const WORD_DOC_BYTES_PER_PAGE: u64 = 15_000;

/// Produces a billable page count for an uploaded document.
///
/// Implementations must return at least 1.
pub trait PageEstimator: Send + Sync {
    fn estimate(&self, path: &Path, kind: FileKind) -> Result<u32>;
}

/// Pre-upload page guess from the file kind alone.
///
/// The controller asks for a quote before transferring any bytes, so
/// there is nothing to inspect: PDFs guess three pages, word documents
/// two, everything else one.  The real estimate at upload time replaces
/// this number.
pub fn sight_unseen_pages(kind: FileKind) -> u32 {
    match kind {
        FileKind::Pdf => 3,
        FileKind::Doc | FileKind::Docx => 2,
        FileKind::Image | FileKind::Text => 1,
    }
}

/// Default estimator: exact for PDFs (lopdf page count), heuristic for
/// text and word documents, one page for images.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl PageEstimator for HeuristicEstimator {
    #[instrument(skip(self), fields(path = %path.display(), kind = %kind))]
    fn estimate(&self, path: &Path, kind: FileKind) -> Result<u32> {
        let pages = match kind {
            FileKind::Pdf => pdf_pages(path),
            FileKind::Text => text_pages(path),
            FileKind::Image => 1,
            FileKind::Doc | FileKind::Docx => word_doc_pages(path),
        };
        debug!(pages, "pages estimated");
        Ok(pages.max(1))
    }
}

/// Count PDF pages via lopdf; unparseable PDFs are billed as one page.
fn pdf_pages(path: &Path) -> u32 {
    match lopdf::Document::load(path) {
        Ok(document) => document.get_pages().len() as u32,
        Err(err) => {
            warn!(path = %path.display(), %err, "PDF parse failed, billing one page");
            1
        }
    }
}

/// Estimate text pages from the line count.
fn text_pages(path: &Path) -> u32 {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let lines = contents.lines().count() as u64;
            // Round to the nearest page, floor one.
            (lines + TEXT_LINES_PER_PAGE / 2).div_euclid(TEXT_LINES_PER_PAGE) as u32
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "text read failed, billing one page");
            1
        }
    }
}

/// Estimate word-document pages from the byte size.
fn word_doc_pages(path: &Path) -> u32 {
    match std::fs::metadata(path) {
        Ok(meta) => (meta.len() / WORD_DOC_BYTES_PER_PAGE) as u32,
        Err(err) => {
            warn!(path = %path.display(), %err, "metadata read failed, billing one page");
            1
        }
    }
}
