//! Spreadsheet extraction: `.xlsx` / `.xlsm` / `.xls` bytes → [`Table`].
//!
//! Only the first sheet in workbook order is read. Cells keep their native
//! type until [`Table::from_cells`] flattens them, so numbers come out with a
//! decimal point and are canonicalised by the normaliser like any other
//! source. Decoding is CPU-bound; the caller runs it on `spawn_blocking`.

use crate::error::ItemError;
use crate::table::{Cell, Table};
use calamine::{Data, Reader};
use chrono::Timelike;
use std::io::Cursor;
use tracing::debug;

/// Read the first sheet of an in-memory workbook.
pub fn extract_first_sheet(name: &str, bytes: &[u8]) -> Result<Table, ItemError> {
    let mut workbook = calamine::open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ItemError::extraction(name, e))?;

    let first = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| ItemError::extraction(name, "workbook has no sheets"))?;

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ItemError::extraction(name, e))?;

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .filter(|row| !row.iter().all(|c| matches!(c, Data::Empty)))
        .map(|row| row.iter().map(to_cell).collect())
        .collect();

    debug!("{}: sheet '{}' → {} rows", name, first, rows.len());
    Ok(Table::from_cells(rows))
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Text(String::new()),
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) => Cell::Number(*f),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Bool(b) => Cell::Text(b.to_string()),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) if ndt.time().num_seconds_from_midnight() == 0 => {
                Cell::Text(ndt.format("%d/%m/%Y").to_string())
            }
            Some(ndt) => Cell::Text(ndt.format("%d/%m/%Y %H:%M:%S").to_string()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::{Cursor, Write};
    use zip::write::FileOptions;
    use zip::CompressionMethod;

    const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/worksheets/sheet2.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/xl/sharedStrings.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sharedStrings+xml"/>
</Types>"#;

    const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#;

    const WORKBOOK: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
<sheet name="Resumo" sheetId="1" r:id="rId1"/>
<sheet name="Outra" sheetId="2" r:id="rId2"/>
</sheets>
</workbook>"#;

    const WORKBOOK_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet2.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
<Relationship Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/>
</Relationships>"#;

    // Style 1 is the built-in short date format.
    const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<cellXfs count="2">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
</cellXfs>
</styleSheet>"#;

    const SHARED_STRINGS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="4" uniqueCount="4">
<si><t>Data</t></si>
<si><t>Valor</t></si>
<si><t>Total</t></si>
<si><t>Outra</t></si>
</sst>"#;

    // Row 3 is absent, so the range holds one all-empty row.
    const SHEET1: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:B4"/>
<sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>
<row r="2"><c r="A2" s="1"><v>46023</v></c><c r="B2"><v>1234.5</v></c></row>
<row r="4"><c r="A4" t="s"><v>2</v></c><c r="B4"><v>1000</v></c></row>
</sheetData>
</worksheet>"#;

    const SHEET2: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<dimension ref="A1:B1"/>
<sheetData>
<row r="1"><c r="A1" t="s"><v>3</v></c><c r="B1"><v>999</v></c></row>
</sheetData>
</worksheet>"#;

    /// Minimal `.xlsx` with sheets "Resumo" (dates, numbers, a gap row) and
    /// "Outra".
    pub(crate) fn two_sheet_workbook() -> Vec<u8> {
        let parts = [
            ("[Content_Types].xml", CONTENT_TYPES),
            ("_rels/.rels", ROOT_RELS),
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", WORKBOOK_RELS),
            ("xl/styles.xml", STYLES),
            ("xl/sharedStrings.xml", SHARED_STRINGS),
            ("xl/worksheets/sheet1.xml", SHEET1),
            ("xl/worksheets/sheet2.xml", SHEET2),
        ];
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for (name, xml) in parts {
            let options: FileOptions<'static, ()> =
                FileOptions::default().compression_method(CompressionMethod::Deflated);
            zip.start_file(name, options).unwrap();
            zip.write_all(xml.as_bytes()).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sheet_only_with_dates_and_gap_rows() {
        let bytes = fixtures::two_sheet_workbook();
        let table = extract_first_sheet("resumo.xlsx", &bytes).unwrap();
        assert_eq!(
            table.rows,
            vec![
                vec!["Data", "Valor"],
                vec!["01/01/2026", "1234.5"],
                vec!["Total", "1000"],
            ]
        );
        assert!(table.rows.iter().flatten().all(|c| c != "Outra" && c != "999"));
    }

    #[test]
    fn corrupt_bytes_are_an_extraction_error() {
        let err = extract_first_sheet("broken.xlsx", b"definitely not a workbook").unwrap_err();
        match err {
            ItemError::Extraction { name, .. } => assert_eq!(name, "broken.xlsx"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_an_extraction_error() {
        assert!(extract_first_sheet("empty.xls", &[]).is_err());
    }

    #[test]
    fn scalar_cells_map_to_native_types() {
        assert_eq!(to_cell(&Data::Float(1234.5)), Cell::Number(1234.5));
        assert_eq!(to_cell(&Data::Int(7)), Cell::Number(7.0));
        assert_eq!(to_cell(&Data::Bool(true)), Cell::Text("true".into()));
        assert_eq!(to_cell(&Data::Empty), Cell::Text(String::new()));
        assert_eq!(
            to_cell(&Data::String("Receita".into())),
            Cell::Text("Receita".into())
        );
    }

    #[test]
    fn int_cells_flatten_without_fraction() {
        assert_eq!(to_cell(&Data::Int(42)).into_string(), "42");
    }
}
