//! Source classification by file-name suffix.
//!
//! Content is never sniffed: the suffix (case-insensitive) decides which
//! extractor runs, with a reported `image/*` media type as the one extra
//! route to the adapter. When the environment reported no media type, one is
//! inferred from the suffix so the adapter always receives a tag.

use serde::{Deserialize, Serialize};
use std::path::Path;

const SPREADSHEET_SUFFIXES: [&str; 3] = ["xlsm", "xlsx", "xls"];
const DELIMITED_SUFFIXES: [&str; 1] = ["csv"];
const DOCUMENT_SUFFIXES: [&str; 7] = ["pdf", "png", "jpg", "jpeg", "webp", "heic", "heif"];

/// Which extraction path a file takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Workbook read locally, first sheet only.
    Spreadsheet,
    /// Plain delimited text read locally.
    Delimited,
    /// PDF or image sent to the external extraction adapter.
    Document,
}

/// Lower-cased final suffix of `name`, without the dot.
pub fn suffix(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

/// Classify a file, or `None` when no extractor accepts it.
pub fn classify(name: &str, media_type: &str) -> Option<SourceKind> {
    let suffix = suffix(name);
    match suffix.as_deref() {
        Some(s) if SPREADSHEET_SUFFIXES.contains(&s) => Some(SourceKind::Spreadsheet),
        Some(s) if DELIMITED_SUFFIXES.contains(&s) => Some(SourceKind::Delimited),
        Some(s) if DOCUMENT_SUFFIXES.contains(&s) => Some(SourceKind::Document),
        _ if media_type.starts_with("image/") => Some(SourceKind::Document),
        _ => None,
    }
}

/// The reported media type, or a best-effort one from the suffix.
pub fn effective_media_type(name: &str, reported: &str) -> String {
    if !reported.trim().is_empty() {
        return reported.to_string();
    }
    infer_media_type(name)
}

fn infer_media_type(name: &str) -> String {
    match suffix(name).as_deref() {
        // Not every mime table knows the HEIF family.
        Some("heic") => "image/heic".to_string(),
        Some("heif") => "image/heif".to_string(),
        _ => mime_guess::from_path(name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string(),
    }
}
