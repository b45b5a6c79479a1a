// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload naming — sanitize client-supplied filenames and derive the
// timestamped stored name.  The controller firmware is not trusted to
// send well-formed names; anything that could escape the upload
// directory is stripped here.

use chrono::{DateTime, Utc};

/// Reduce a client filename to a safe flat name: path components dropped,
/// every character outside `[A-Za-z0-9._-]` replaced with `_`.
pub fn sanitize_filename(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    // A name of only dots or underscores carries no information.
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        "upload".to_owned()
    } else {
        cleaned
    }
}

/// Stored name for an upload: `{stem}_{yyyymmdd_hhmmss}{.ext}`.
///
/// The timestamp keeps repeated uploads of the same file distinct while
/// staying recognisable to the controller.
pub fn stored_name_for(original: &str, now: DateTime<Utc>) -> String {
    let safe = sanitize_filename(original);
    let stamp = now.format("%Y%m%d_%H%M%S");

    match safe.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}_{stamp}.{ext}"),
        _ => format!("{safe}_{stamp}"),
    }
}

/// File extension of a client filename, if any.
pub fn extension_of(name: &str) -> Option<&str> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    match base.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Some(ext),
        _ => None,
    }
}
