//! Consolidation of several canonical tables into one.
//!
//! The first input is kept whole (header and rows); every later input
//! contributes its rows after the first. Column schemas are assumed to match
//! and are not checked, so inputs with different layouts produce a ragged
//! table rather than an error.

use crate::error::SefinError;
use crate::table::{self, Table};
use tracing::debug;

/// Merge canonical texts, keeping one header row.
///
/// Fails with [`SefinError::InsufficientInput`] for fewer than two inputs.
pub fn merge_canonical<S: AsRef<str>>(inputs: &[S]) -> Result<String, SefinError> {
    if inputs.len() < 2 {
        return Err(SefinError::InsufficientInput {
            available: inputs.len(),
        });
    }

    let mut merged = Table::default();
    for (i, text) in inputs.iter().enumerate() {
        let parsed = table::parse_canonical(text.as_ref())
            .map_err(|e| SefinError::Internal(format!("stored result {i} is not canonical: {e}")))?;
        let skip = if i == 0 { 0 } else { 1 };
        merged.rows.extend(parsed.rows.into_iter().skip(skip));
    }
    debug!("Merged {} tables into {} rows", inputs.len(), merged.len());

    table::serialize_canonical(&merged).map_err(|e| SefinError::Internal(e.to_string()))
}
