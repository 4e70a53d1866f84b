//! Export packaging: canonical text → downloadable bytes.
//!
//! Every exported text starts with exactly one UTF-8 byte-order mark so
//! spreadsheet tools detect the encoding. File names are the source name
//! without its final suffix, plus the configured suffix and extension.
//! Archives carry one entry per completed item and are named with a
//! millisecond timestamp; entry timestamps are fixed, so the same inputs
//! always give the same archive bytes.

use crate::error::SefinError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use tracing::info;
use zip::write::FileOptions;
use zip::CompressionMethod;

/// UTF-8 byte-order mark.
pub const BOM: &str = "\u{FEFF}";

/// Target extension of an exported text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Txt,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Txt => "txt",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Txt => "text/plain; charset=utf-8",
        }
    }
}

/// Bytes ready to save, with a suggested name and content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportArtifact {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// `relatorio.xlsx` → `relatorio<suffix>.<ext>`.
pub fn export_name(source_name: &str, suffix: &str, format: ExportFormat) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(source_name);
    format!("{stem}{suffix}.{}", format.extension())
}

/// `text` prefixed with exactly one byte-order mark.
pub fn with_bom(text: &str) -> Vec<u8> {
    let body = text.trim_start_matches(BOM);
    let mut bytes = Vec::with_capacity(BOM.len() + body.len());
    bytes.extend_from_slice(BOM.as_bytes());
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

/// Package one completed item's canonical text.
pub fn export_single(
    source_name: &str,
    canonical: &str,
    suffix: &str,
    format: ExportFormat,
) -> ExportArtifact {
    ExportArtifact {
        file_name: export_name(source_name, suffix, format),
        content_type: format.content_type(),
        bytes: with_bom(canonical),
    }
}

/// Package a merged table, named `<prefix><millis>.<ext>`.
pub fn export_merged(
    canonical: &str,
    prefix: &str,
    format: ExportFormat,
    timestamp_millis: i64,
) -> ExportArtifact {
    ExportArtifact {
        file_name: format!("{prefix}{timestamp_millis}.{}", format.extension()),
        content_type: format.content_type(),
        bytes: with_bom(canonical),
    }
}

/// Build a zip with one entry per `(source_name, canonical)` pair.
///
/// Entry names follow [`export_name`]; a repeated name gets ` (2)`, ` (3)`…
/// before its extension.
pub fn build_archive(
    entries: &[(String, String)],
    suffix: &str,
    format: ExportFormat,
    prefix: &str,
    timestamp_millis: i64,
) -> Result<ExportArtifact, SefinError> {
    if entries.is_empty() {
        return Err(SefinError::NothingToExport);
    }

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for (source_name, canonical) in entries {
        let name = unique_name(&mut seen, export_name(source_name, suffix, format));
        zip.start_file(name.as_str(), entry_options())
            .map_err(|e| SefinError::ArchiveFailed(e.to_string()))?;
        zip.write_all(&with_bom(canonical))
            .map_err(|e| SefinError::ArchiveFailed(e.to_string()))?;
    }

    let bytes = zip
        .finish()
        .map_err(|e| SefinError::ArchiveFailed(e.to_string()))?
        .into_inner();

    let file_name = format!("{prefix}{timestamp_millis}.zip");
    info!(
        "Archive {}: {} entries, {} bytes",
        file_name,
        entries.len(),
        bytes.len()
    );

    Ok(ExportArtifact {
        file_name,
        content_type: "application/zip",
        bytes,
    })
}

fn entry_options() -> FileOptions<'static, ()> {
    FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
}

fn unique_name(seen: &mut HashMap<String, usize>, name: String) -> String {
    let count = seen.entry(name.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        return name;
    }
    let n = *count;
    let candidate = match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem} ({n}).{ext}"),
        None => format!("{name} ({n})"),
    };
    // The disambiguated name may itself collide with a later source name.
    unique_name(seen, candidate)
}
