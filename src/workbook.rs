//! Spreadsheet reading for OOXML workbooks (`.xlsx`, `.xlsm`).
//!
//! Only the first worksheet (in workbook order) is read. Cells keep their
//! position from the `r` reference, so sparse rows line up with the header.
//! Legacy binary `.xls` files are reported as unsupported; callers log and
//! skip them like any other unreadable file.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::io::{Cursor, Read};
use std::path::Path;

use crate::table::{Cell, Table};

/// Maximum cells to read from a sheet (avoids unbounded memory).
const MAX_CELLS_PER_SHEET: usize = 2_000_000;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 200 * 1024 * 1024;
/// Sheet bounds of the OOXML format: rows 1..=1,048,576, columns A..=XFD.
const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

#[derive(Debug, thiserror::Error)]
pub enum WorkbookError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not a workbook archive: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("malformed workbook XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("workbook contains no worksheet")]
    NoWorksheet,
    #[error("ZIP entry {0} exceeds size limit")]
    TooLarge(String),
    #[error("unsupported spreadsheet format: {0}")]
    UnsupportedFormat(String),
    #[error("cell reference {0} is outside the sheet bounds")]
    BadReference(String),
}

/// Reads the first worksheet of `path` as a [`Table`], skipping `skip_rows`
/// physical rows before the header row.
pub fn read_table(path: &Path, skip_rows: usize) -> Result<Table, WorkbookError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "xlsx" | "xlsm" => {}
        other => {
            return Err(WorkbookError::UnsupportedFormat(if other.is_empty() {
                "no file extension".to_string()
            } else {
                format!(".{} (save the file as .xlsx)", other)
            }))
        }
    }
    let bytes = std::fs::read(path)?;
    let grid = read_first_sheet(&bytes)?;
    Ok(Table::from_grid(grid, skip_rows))
}

/// Parses the first worksheet of an OOXML workbook into a row-major grid.
/// Row `i` of the result is spreadsheet row `i + 1`.
pub fn read_first_sheet(bytes: &[u8]) -> Result<Vec<Vec<Cell>>, WorkbookError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;
    let shared_strings = if has_entry(&archive, "xl/sharedStrings.xml") {
        let xml = read_entry_bounded(&mut archive, "xl/sharedStrings.xml")?;
        parse_shared_strings(&xml)?
    } else {
        Vec::new()
    };
    let sheet = first_sheet_path(&mut archive)?;
    let xml = read_entry_bounded(&mut archive, &sheet)?;
    parse_sheet(&xml, &shared_strings)
}

fn has_entry(archive: &Archive<'_>, name: &str) -> bool {
    archive.file_names().any(|n| n == name)
}

fn read_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>, WorkbookError> {
    let entry = archive.by_name(name)?;
    let mut out = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(WorkbookError::TooLarge(name.to_string()));
    }
    Ok(out)
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Resolves the first `<sheet>` of `xl/workbook.xml` through the workbook
/// relationships. Falls back to the lowest-numbered `sheetN.xml`.
fn first_sheet_path(archive: &mut Archive<'_>) -> Result<String, WorkbookError> {
    if has_entry(archive, "xl/workbook.xml") && has_entry(archive, "xl/_rels/workbook.xml.rels") {
        let workbook = read_entry_bounded(archive, "xl/workbook.xml")?;
        let rels = read_entry_bounded(archive, "xl/_rels/workbook.xml.rels")?;
        if let Some(rid) = first_sheet_rel_id(&workbook)? {
            if let Some(target) = rel_target(&rels, &rid)? {
                let path = match target.strip_prefix('/') {
                    Some(abs) => abs.to_string(),
                    None => format!("xl/{}", target),
                };
                if has_entry(archive, &path) {
                    return Ok(path);
                }
            }
        }
    }

    let mut names: Vec<&str> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
        .first()
        .map(|s| s.to_string())
        .ok_or(WorkbookError::NoWorksheet)
}

fn first_sheet_rel_id(xml: &[u8]) -> Result<Option<String>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                return Ok(attr(&e, b"r:id"));
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

fn rel_target(xml: &[u8], id: &str) -> Result<Option<String>, WorkbookError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if attr(&e, b"Id").as_deref() == Some(id) {
                    return Ok(attr(&e, b"Target"));
                }
            }
            Event::Eof => return Ok(None),
            _ => {}
        }
        buf.clear();
    }
}

/// One string per `<si>`; rich-text runs are concatenated and phonetic
/// hints (`<rPh>`) are ignored.
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, WorkbookError> {
    let mut strings = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    let mut in_phonetic = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"rPh" => in_phonetic = true,
                b"t" => in_t = !in_phonetic,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(te) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(&te.unescape().unwrap_or_default());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(current.take().unwrap_or_default()),
                b"rPh" => in_phonetic = false,
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Zero-based column index from a cell reference such as `AB12`.
/// `Ok(None)` when the reference has no column letters.
fn column_index(reference: &str) -> Result<Option<usize>, WorkbookError> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return Ok(None);
    }
    letters
        .iter()
        .try_fold(0usize, |acc, b| {
            acc.checked_mul(26)?
                .checked_add((b.to_ascii_uppercase() - b'A') as usize + 1)
        })
        .filter(|n| *n <= MAX_COLUMNS)
        .map(|n| Some(n - 1))
        .ok_or_else(|| WorkbookError::BadReference(reference.to_string()))
}

/// Zero-based row index from a `<row r="…">` attribute.
/// `Ok(None)` when the attribute is not a number.
fn row_index(r: &str) -> Result<Option<usize>, WorkbookError> {
    if r.is_empty() || !r.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match r.parse::<usize>() {
        Ok(n) if (1..=MAX_ROWS).contains(&n) => Ok(Some(n - 1)),
        _ => Err(WorkbookError::BadReference(format!("row {}", r))),
    }
}

/// Row of a `<row>` element, falling back to `next_row` without `r`.
fn row_at(e: &BytesStart<'_>, next_row: usize) -> Result<usize, WorkbookError> {
    let row = match attr(e, b"r") {
        Some(r) => row_index(&r)?,
        None => None,
    }
    .unwrap_or(next_row);
    if row >= MAX_ROWS {
        return Err(WorkbookError::BadReference(format!("row {}", row + 1)));
    }
    Ok(row)
}

/// Column of a `<c>` element, falling back to `next_col` without `r`.
fn column_at(e: &BytesStart<'_>, next_col: usize) -> Result<usize, WorkbookError> {
    let col = match attr(e, b"r") {
        Some(r) => column_index(&r)?,
        None => None,
    }
    .unwrap_or(next_col);
    if col >= MAX_COLUMNS {
        return Err(WorkbookError::BadReference(format!("column {}", col + 1)));
    }
    Ok(col)
}

#[derive(Default)]
struct PendingCell {
    col: usize,
    kind: Option<String>,
    value: String,
    inline: String,
}

impl PendingCell {
    fn finish(self, shared_strings: &[String]) -> Cell {
        match self.kind.as_deref() {
            Some("s") => self
                .value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|i| shared_strings.get(i))
                .map(|s| Cell::Text(s.clone()))
                .unwrap_or(Cell::Empty),
            Some("inlineStr") => {
                if self.inline.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(self.inline)
                }
            }
            Some("b") => Cell::Bool(self.value.trim() == "1"),
            Some("str") | Some("e") => {
                if self.value.is_empty() {
                    Cell::Empty
                } else {
                    Cell::Text(self.value)
                }
            }
            _ => {
                let v = self.value.trim();
                if v.is_empty() {
                    Cell::Empty
                } else {
                    v.parse::<f64>()
                        .map(Cell::Number)
                        .unwrap_or_else(|_| Cell::Text(v.to_string()))
                }
            }
        }
    }
}

#[derive(PartialEq)]
enum TextTarget {
    None,
    Value,
    Inline,
}

fn parse_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<Cell>>, WorkbookError> {
    let mut grid: Vec<Vec<Cell>> = Vec::new();
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row: usize = 0;
    let mut next_row: usize = 0;
    let mut next_col: usize = 0;
    let mut pending: Option<PendingCell> = None;
    let mut target = TextTarget::None;
    let mut cell_count = 0usize;

    loop {
        if cell_count >= MAX_CELLS_PER_SHEET {
            tracing::warn!("sheet truncated at {} cells", MAX_CELLS_PER_SHEET);
            break;
        }
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_at(&e, next_row)?;
                    next_row = row + 1;
                    next_col = 0;
                }
                b"c" => {
                    let col = column_at(&e, next_col)?;
                    next_col = col + 1;
                    pending = Some(PendingCell {
                        col,
                        kind: attr(&e, b"t"),
                        ..Default::default()
                    });
                }
                b"v" => target = TextTarget::Value,
                b"t" if pending.is_some() => target = TextTarget::Inline,
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = row_at(&e, next_row)?;
                    next_row = row + 1;
                }
                b"c" => next_col = column_at(&e, next_col)? + 1,
                _ => {}
            },
            Event::Text(te) => {
                if let Some(cell) = pending.as_mut() {
                    let text = te.unescape().unwrap_or_default();
                    match target {
                        TextTarget::Value => cell.value.push_str(&text),
                        TextTarget::Inline => cell.inline.push_str(&text),
                        TextTarget::None => {}
                    }
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => target = TextTarget::None,
                b"c" => {
                    if let Some(cell) = pending.take() {
                        let col = cell.col;
                        let value = cell.finish(shared_strings);
                        if !value.is_empty() {
                            if grid.len() <= row {
                                grid.resize_with(row + 1, Vec::new);
                            }
                            let r = &mut grid[row];
                            if r.len() <= col {
                                r.resize(col + 1, Cell::Empty);
                            }
                            r[col] = value;
                            cell_count += 1;
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(grid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn xlsx(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
            for (name, body) in entries {
                zip.start_file(*name, zip::write::SimpleFileOptions::default())
                    .unwrap();
                zip.write_all(body.as_bytes()).unwrap();
            }
            zip.finish().unwrap();
        }
        buf
    }

    const SHARED: &str = r#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<si><t>Search Phrase</t></si>
<si><t>Failed Searches</t></si>
<si><r><t>time </t></r><r><t>off</t></r><rPh><t>ignored</t></rPh></si>
</sst>"#;

    const SHEET: &str = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>
<row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row>
<row r="3"><c r="A3" t="s"><v>2</v></c><c r="C3"><v>42</v></c></row>
<row r="4"><c r="A4" t="inlineStr"><is><t>w2 &amp; 1099</t></is></c><c r="B4" t="b"><v>1</v></c><c r="C4"><v>2.5</v></c></row>
</sheetData></worksheet>"#;

    #[test]
    fn column_references() {
        assert_eq!(column_index("A1").unwrap(), Some(0));
        assert_eq!(column_index("Z9").unwrap(), Some(25));
        assert_eq!(column_index("AA10").unwrap(), Some(26));
        assert_eq!(column_index("XFD1").unwrap(), Some(16_383));
        assert_eq!(column_index("12").unwrap(), None);
        assert!(column_index("XFE1").is_err());
        assert!(column_index("ZZZZZZZZZZZZZZ1").is_err());
    }

    #[test]
    fn row_references() {
        assert_eq!(row_index("1").unwrap(), Some(0));
        assert_eq!(row_index("1048576").unwrap(), Some(1_048_575));
        assert_eq!(row_index("x").unwrap(), None);
        assert!(row_index("1048577").is_err());
        assert!(row_index("0").is_err());
        assert!(row_index("99999999999999999999999").is_err());
    }

    fn sheet_with(body: &str) -> Vec<u8> {
        let sheet = format!(
            r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
            body
        );
        xlsx(&[("xl/worksheets/sheet1.xml", sheet.as_str())])
    }

    #[test]
    fn out_of_bounds_references_are_errors() {
        let wide = sheet_with(r#"<row r="1"><c r="ZZZZZZZZZZZZZZ1" t="str"><v>x</v></c></row>"#);
        let err = read_first_sheet(&wide).unwrap_err();
        assert!(matches!(err, WorkbookError::BadReference(ref r) if r == "ZZZZZZZZZZZZZZ1"));

        let empty_cell = sheet_with(r#"<row r="1"><c r="XFE1"/></row>"#);
        assert!(matches!(
            read_first_sheet(&empty_cell).unwrap_err(),
            WorkbookError::BadReference(_)
        ));

        let deep = sheet_with(r#"<row r="4000000000"><c r="A4000000000" t="str"><v>x</v></c></row>"#);
        assert!(matches!(
            read_first_sheet(&deep).unwrap_err(),
            WorkbookError::BadReference(_)
        ));

        let last = sheet_with(r#"<row r="2"><c r="XFD2" t="str"><v>edge</v></c></row>"#);
        let grid = read_first_sheet(&last).unwrap();
        assert_eq!(grid[1].len(), MAX_COLUMNS);
        assert_eq!(grid[1][MAX_COLUMNS - 1], Cell::Text("edge".into()));
    }

    #[test]
    fn reads_sparse_sheet_with_shared_and_inline_strings() {
        let bytes = xlsx(&[
            ("xl/sharedStrings.xml", SHARED),
            ("xl/worksheets/sheet1.xml", SHEET),
        ]);
        let grid = read_first_sheet(&bytes).unwrap();
        assert_eq!(grid.len(), 4);
        assert_eq!(grid[0][0], Cell::Text("Search Phrase".into()));
        assert_eq!(grid[0][1], Cell::Empty);
        assert_eq!(grid[0][2], Cell::Text("Failed Searches".into()));
        assert!(grid[1].is_empty());
        assert_eq!(grid[2][0], Cell::Text("time off".into()));
        assert_eq!(grid[2][2], Cell::Number(42.0));
        assert_eq!(grid[3][0], Cell::Text("w2 & 1099".into()));
        assert_eq!(grid[3][1], Cell::Bool(true));
        assert_eq!(grid[3][2], Cell::Number(2.5));
    }

    #[test]
    fn first_sheet_follows_workbook_order() {
        let workbook = r#"<workbook xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>
<sheet name="Data" sheetId="2" r:id="rId7"/><sheet name="Other" sheetId="1" r:id="rId1"/>
</sheets></workbook>"#;
        let rels = r#"<Relationships>
<Relationship Id="rId1" Target="worksheets/sheet1.xml"/>
<Relationship Id="rId7" Target="/xl/worksheets/sheet2.xml"/>
</Relationships>"#;
        let other = r#"<worksheet><sheetData><row r="1"><c r="A1" t="str"><v>wrong</v></c></row></sheetData></worksheet>"#;
        let data = r#"<worksheet><sheetData><row r="1"><c r="A1" t="str"><v>right</v></c></row></sheetData></worksheet>"#;
        let bytes = xlsx(&[
            ("xl/workbook.xml", workbook),
            ("xl/_rels/workbook.xml.rels", rels),
            ("xl/worksheets/sheet1.xml", other),
            ("xl/worksheets/sheet2.xml", data),
        ]);
        let grid = read_first_sheet(&bytes).unwrap();
        assert_eq!(grid[0][0], Cell::Text("right".into()));
    }

    #[test]
    fn archive_without_sheets_is_an_error() {
        let bytes = xlsx(&[("docProps/app.xml", "<Properties/>")]);
        let err = read_first_sheet(&bytes).unwrap_err();
        assert!(matches!(err, WorkbookError::NoWorksheet));
    }

    #[test]
    fn not_a_zip_is_an_error() {
        let err = read_first_sheet(b"plain text").unwrap_err();
        assert!(matches!(err, WorkbookError::Zip(_)));
    }

    #[test]
    fn legacy_xls_is_unsupported() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("old.xls");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0").unwrap();
        let err = read_table(&path, 0).unwrap_err();
        assert!(matches!(err, WorkbookError::UnsupportedFormat(_)));
    }

    #[test]
    fn read_table_applies_skip_rows() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("export.xlsx");
        std::fs::write(
            &path,
            xlsx(&[
                ("xl/sharedStrings.xml", SHARED),
                ("xl/worksheets/sheet1.xml", SHEET),
            ]),
        )
        .unwrap();
        let table = read_table(&path, 2).unwrap();
        assert_eq!(table.columns, vec!["time off", "Unnamed: 1", "42"]);
        assert_eq!(table.rows.len(), 1);
    }
}
