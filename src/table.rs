//! Tabular data between extraction and serialisation.
//!
//! Extractors produce [`Cell`]s (text or number, as the source typed them);
//! they are flattened to strings right away so the normaliser only ever sees
//! one cell type. Canonical text is `;`-delimited, every field quoted, rows
//! terminated with CRLF.

use std::fmt;

/// Canonical field delimiter.
pub const CANONICAL_DELIMITER: u8 = b';';

/// A source cell before flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
}

impl Cell {
    /// Flatten to a string. Numbers use a decimal point and drop a zero
    /// fraction (`1234.0` → `"1234"`).
    pub fn into_string(self) -> String {
        match self {
            Cell::Text(s) => s,
            Cell::Number(n) => n.to_string(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Rows of string cells; row 0 is conventionally the header. Rows may be
/// ragged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(rows: Vec<Vec<String>>) -> Self {
        Self { rows }
    }

    pub fn from_cells(rows: Vec<Vec<Cell>>) -> Self {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(Cell::into_string).collect())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn header(&self) -> Option<&[String]> {
        self.rows.first().map(Vec::as_slice)
    }
}

/// Parse `text` with a fixed delimiter. Quoted fields follow RFC 4180
/// (`""` is a literal quote). Empty lines and unquoted whitespace-only lines
/// are skipped; a quoted field is data even when blank (`""`, `"  "`). The
/// parse never stops early on a ragged row.
pub fn parse_delimited(text: &str, delimiter: u8) -> Result<Table, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if is_blank_line(&record, text.as_bytes()) {
            continue;
        }
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(Table { rows })
}

/// A single whitespace field whose source line carries no quote.
fn is_blank_line(record: &csv::StringRecord, source: &[u8]) -> bool {
    if record.len() > 1 || !record.iter().all(|f| f.trim().is_empty()) {
        return false;
    }
    let start = record.position().map_or(0, |p| p.byte() as usize);
    !source
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|&&b| b != b'\n')
        .any(|&b| b == b'"')
}

/// Serialise in canonical form: `;` delimiter, every field quoted, embedded
/// quotes doubled, CRLF line ends.
pub fn serialize_canonical(table: &Table) -> Result<String, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(CANONICAL_DELIMITER)
        .quote_style(csv::QuoteStyle::Always)
        .terminator(csv::Terminator::CRLF)
        .flexible(true)
        .from_writer(Vec::new());

    for row in &table.rows {
        writer.write_record(row)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    // Every field came from a &str, so the buffer is valid UTF-8.
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Parse text that is already in canonical form.
pub fn parse_canonical(text: &str) -> Result<Table, csv::Error> {
    parse_delimited(text, CANONICAL_DELIMITER)
}
