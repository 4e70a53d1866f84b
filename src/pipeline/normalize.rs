//! Locale normalisation: any delimited table → canonical Brazilian CSV.
//!
//! Canonical form is `;` between fields, `,` as decimal separator, every
//! field double-quoted, thousands separators removed from money-like values.
//!
//! Two entry points exist because sources differ in what they already know:
//!
//! - [`normalize_table`] takes a grid that an extractor already split into
//!   cells (spreadsheets, CSV files) and applies only the per-cell decimal
//!   rule and canonical serialisation.
//! - [`normalize_text`] takes raw text from the external adapter, whose
//!   delimiter and decimal convention are unknown, and sniffs them first.
//!
//! ## Steps of [`normalize_text`]
//! 1. Strip code-fence markers and trim
//! 2. Detect the delimiter from the first line
//! 3. Parse with that delimiter, skipping blank lines
//! 4. Canonicalise decimals per cell
//! 5. Serialise with `;`, all fields quoted
//!
//! Values such as `1.234.567,89` are left alone: only a single trailing
//! decimal point is recognised, and comma-decimal values already match the
//! target.

use crate::error::ItemError;
use crate::table::{self, Table};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

const BOM: char = '\u{FEFF}';

/// Delimiter candidates in tie-break order.
const CANDIDATES: [u8; 3] = [b';', b',', b'\t'];

/// Normalise raw adapter output (steps 1–5).
pub fn normalize_text(raw: &str) -> Result<String, ItemError> {
    let text = strip_fences(raw);
    let delimiter = detect_delimiter(first_line(&text));
    let table = table::parse_delimited(&text, delimiter)
        .map_err(|e| ItemError::extraction("extraction service output", e))?;
    normalize_table(table)
}

/// Normalise an already-split grid (steps 4–5).
pub fn normalize_table(table: Table) -> Result<String, ItemError> {
    let rows = table
        .rows
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|cell| canonicalize_decimal(&cell).into_owned())
                .collect()
        })
        .collect();
    table::serialize_canonical(&Table::new(rows))
        .map_err(|e| ItemError::extraction("normalised table", e))
}

// ── Step 1: Strip fences ─────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"```[A-Za-z]*[ \t]*\r?\n?").unwrap());

/// Remove every ```` ``` ```` / ```` ```csv ```` marker, a leading BOM, and
/// surrounding whitespace.
pub fn strip_fences(input: &str) -> String {
    let without = RE_FENCE.replace_all(input, "");
    without.trim().trim_start_matches(BOM).trim().to_string()
}

// ── Step 2: Delimiter detection ──────────────────────────────────────────────

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

/// Pick the most frequent of `;`, `,` and tab in `line`. Ties go to the
/// earlier candidate; a line with none of them yields `;`.
pub fn detect_delimiter(line: &str) -> u8 {
    let mut best = CANDIDATES[0];
    let mut best_count = 0usize;
    for candidate in CANDIDATES {
        let count = line.bytes().filter(|&b| b == candidate).count();
        if count > best_count {
            best = candidate;
            best_count = count;
        }
    }
    best
}

// ── Step 4: Decimal canonicalisation ─────────────────────────────────────────

static RE_POINT_DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?[\d,]*\.\d+$").unwrap());

/// `1,234.56` → `1234,56`; anything not shaped like a point-decimal number
/// is returned unchanged.
pub fn canonicalize_decimal(cell: &str) -> Cow<'_, str> {
    let trimmed = cell.trim();
    if !RE_POINT_DECIMAL.is_match(trimmed) {
        return Cow::Borrowed(cell);
    }
    let digits: String = trimmed.chars().filter(|&c| c != ',').collect();
    Cow::Owned(digits.replacen('.', ",", 1))
}
