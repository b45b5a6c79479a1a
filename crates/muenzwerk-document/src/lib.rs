// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Münzwerk Document — the kiosk's document collaborators: billable-page
// estimation, word-document conversion for printing, and stored-file
// integrity hashing.

pub mod convert;
pub mod estimate;
pub mod integrity;

pub use convert::{DocumentConverter, SofficeConverter};
pub use estimate::{HeuristicEstimator, PageEstimator, sight_unseen_pages};
pub use integrity::hash_bytes;
