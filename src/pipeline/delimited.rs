//! Delimited-text extraction: `.csv` bytes → [`Table`].
//!
//! The file keeps its own delimiter at this stage. It is either configured
//! (`ConversionConfig::csv_delimiter`) or detected once from the first line,
//! then held fixed for the whole file. Canonicalisation happens later in
//! [`super::normalize`].

use super::normalize::detect_delimiter;
use crate::error::ItemError;
use crate::table::{self, Table};
use tracing::debug;

const BOM: &str = "\u{FEFF}";

/// Decode, strip a leading byte-order mark and parse `bytes` into a table.
///
/// Invalid UTF-8 sequences are replaced rather than rejected. An unterminated
/// quoted field is the one irrecoverable condition.
pub fn extract(name: &str, bytes: &[u8], delimiter: Option<u8>) -> Result<Table, ItemError> {
    let decoded = String::from_utf8_lossy(bytes);
    let text: &str = decoded.strip_prefix(BOM).unwrap_or(&*decoded);

    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(text.lines().next().unwrap_or("")));

    if has_unterminated_quote(text, delimiter) {
        return Err(ItemError::extraction(
            name,
            "quoted field is not closed before the end of the file",
        ));
    }

    let table = table::parse_delimited(text, delimiter).map_err(|e| ItemError::extraction(name, e))?;
    debug!(
        "{}: {} rows, delimiter {:?}",
        name,
        table.len(),
        char::from(delimiter)
    );
    Ok(table)
}

/// True when a field opened with `"` is still open at end of input.
///
/// A quote only opens a field at the start of that field; quotes in the
/// middle of an unquoted field are literal, as the parser treats them.
fn has_unterminated_quote(text: &str, delimiter: u8) -> bool {
    let bytes = text.as_bytes();
    let mut in_quotes = false;
    let mut at_field_start = true;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        if in_quotes {
            if b == b'"' {
                if bytes.get(i + 1) == Some(&b'"') {
                    i += 1;
                } else {
                    in_quotes = false;
                }
            }
        } else if b == b'"' && at_field_start {
            in_quotes = true;
            at_field_start = false;
        } else {
            at_field_start = b == delimiter || b == b'\n' || b == b'\r';
        }
        i += 1;
    }
    in_quotes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(t: &Table) -> Vec<Vec<&str>> {
        t.rows
            .iter()
            .map(|r| r.iter().map(String::as_str).collect())
            .collect()
    }

    #[test]
    fn bom_is_stripped_before_parsing() {
        let t = extract("a.csv", "\u{FEFF}Nome;Valor\nAna;1,5\n".as_bytes(), None).unwrap();
        assert_eq!(rows(&t), vec![vec!["Nome", "Valor"], vec!["Ana", "1,5"]]);
    }

    #[test]
    fn detected_delimiter_is_fixed_for_the_file() {
        // The second line has more semicolons, but the first line decides.
        let t = extract("a.csv", b"a,b\nx;y;z,w\n", None).unwrap();
        assert_eq!(rows(&t), vec![vec!["a", "b"], vec!["x;y;z", "w"]]);
    }

    #[test]
    fn configured_delimiter_wins() {
        let t = extract("a.csv", b"a|b,c\n1|2\n", Some(b'|')).unwrap();
        assert_eq!(rows(&t), vec![vec!["a", "b,c"], vec!["1", "2"]]);
    }

    #[test]
    fn blank_lines_skipped() {
        let t = extract("a.csv", b"h1,h2\r\n\r\n1,2\r\n\r\n", None).unwrap();
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn unterminated_quote_fails() {
        let err = extract("bad.csv", b"a;b\n\"open;2\n", None).unwrap_err();
        assert!(matches!(err, ItemError::Extraction { ref name, .. } if name == "bad.csv"));
    }

    #[test]
    fn quote_scanner_cases() {
        assert!(!has_unterminated_quote("\"a\"\"b\";c", b';'));
        assert!(!has_unterminated_quote("5\" disk;x", b';'));
        assert!(!has_unterminated_quote("\"multi\nline\"\n", b';'));
        assert!(has_unterminated_quote("x;\"never closed", b';'));
    }

    #[test]
    fn invalid_utf8_is_replaced() {
        let t = extract("latin.csv", b"caf\xe9;1\n", None).unwrap();
        assert!(t.rows[0][0].starts_with("caf"));
    }
}
