//! In-memory table model and byte-level parsing.
//!
//! A [`Table`] is materialized once per request from fetched bytes and
//! discarded with the response. Delimited inputs go through the `csv` crate
//! with `encoding_rs` text decoding; spreadsheets go through `calamine`
//! (first worksheet only), with native date cells preserved as dates.

use std::io::Cursor;
use std::path::Path;

use calamine::{Data, Reader, Xlsx};
use encoding_rs::UTF_8;

use crate::{data::Cell, error::QueryError};

/// Input format, resolved from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Tsv,
    Xlsx,
}

impl FileKind {
    pub fn from_name(name: &str) -> FileKind {
        match Path::new(name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("tsv") => FileKind::Tsv,
            Some("xlsx") | Some("xlsm") => FileKind::Xlsx,
            _ => FileKind::Csv,
        }
    }

    fn delimiter(self) -> u8 {
        match self {
            FileKind::Tsv => b'\t',
            _ => b',',
        }
    }
}

/// Uniform rows under unique column names. Blank headers receive synthetic
/// `column_N` names; duplicate headers get a numeric suffix.
#[derive(Debug, Clone)]
pub struct Table {
    names: Vec<String>,
    rows: Vec<Vec<Option<Cell>>>,
}

impl Table {
    /// Parses `bytes` into a table, treating row `skip_rows` as the header
    /// and everything after it as data. Ragged rows are padded or truncated
    /// to the header width.
    pub fn parse(bytes: &[u8], kind: FileKind, skip_rows: usize) -> Result<Table, QueryError> {
        let mut raw = read_rows(bytes, kind, None)?;
        if raw.len() <= skip_rows {
            return Err(QueryError::EmptyTable);
        }
        let header_cells = raw.remove(skip_rows);
        raw.drain(..skip_rows);
        let names = header_names(&header_cells);
        let width = names.len();
        let rows = raw
            .into_iter()
            .map(|mut row| {
                row.resize(width, None);
                row
            })
            .collect::<Vec<_>>();
        Ok(Table { names, rows })
    }

    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(column)).and_then(|c| c.as_ref())
    }

    /// Snapshot of one column, absent cells included.
    pub fn column(&self, index: usize) -> Vec<Option<Cell>> {
        self.rows
            .iter()
            .map(|row| row.get(index).cloned().flatten())
            .collect()
    }

    /// Appends a derived column. The cell count must match the row count.
    pub fn push_column(&mut self, name: &str, cells: Vec<Option<Cell>>) {
        debug_assert_eq!(cells.len(), self.rows.len());
        self.names.push(unique_name(&self.names, name.trim()));
        for (row, cell) in self.rows.iter_mut().zip(cells) {
            row.push(cell);
        }
    }

    /// Rewrites text values of one column through a mapping table; unmapped
    /// and non-text values pass through unchanged.
    pub fn remap_column(&mut self, index: usize, pairs: &[(String, String)]) {
        for row in &mut self.rows {
            if let Some(Some(Cell::Text(value))) = row.get_mut(index).map(|c| c.as_mut())
                && let Some((_, replacement)) = pairs.iter().find(|(from, _)| from == value)
            {
                *value = replacement.clone();
            }
        }
    }

    /// Keeps only rows whose cell at `index` displays as `value`.
    pub fn retain_matching(&mut self, index: usize, value: &str) {
        self.rows.retain(|row| {
            row.get(index)
                .and_then(|c| c.as_ref())
                .is_some_and(|cell| cell.as_display() == value)
        });
    }
}

/// Reads up to `limit` raw rows without designating a header. Shared by the
/// header locator (bounded preview) and full table parsing.
pub fn read_rows(
    bytes: &[u8],
    kind: FileKind,
    limit: Option<usize>,
) -> Result<Vec<Vec<Option<Cell>>>, QueryError> {
    match kind {
        FileKind::Csv | FileKind::Tsv => read_delimited_rows(bytes, kind.delimiter(), limit),
        FileKind::Xlsx => read_sheet_rows(bytes, limit),
    }
}

fn read_delimited_rows(
    bytes: &[u8],
    delimiter: u8,
    limit: Option<usize>,
) -> Result<Vec<Vec<Option<Cell>>>, QueryError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .double_quote(true)
        .from_reader(bytes);
    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    while reader.read_byte_record(&mut record)? {
        if let Some(limit) = limit
            && rows.len() >= limit
        {
            break;
        }
        let mut row = Vec::with_capacity(record.len());
        for field in record.iter() {
            row.push(Cell::from_raw(decode_field(field)?.as_ref()));
        }
        rows.push(row);
    }
    Ok(rows)
}

fn decode_field(field: &[u8]) -> Result<std::borrow::Cow<'_, str>, QueryError> {
    let (text, _, had_errors) = UTF_8.decode(field);
    if had_errors {
        Err(QueryError::Decode {
            encoding: UTF_8.name(),
        })
    } else {
        Ok(text)
    }
}

fn read_sheet_rows(
    bytes: &[u8],
    limit: Option<usize>,
) -> Result<Vec<Vec<Option<Cell>>>, QueryError> {
    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(bytes))?;
    let range = match workbook.worksheet_range_at(0) {
        Some(range) => range?,
        None => return Ok(Vec::new()),
    };
    let mut rows = Vec::new();
    for row in range.rows() {
        if let Some(limit) = limit
            && rows.len() >= limit
        {
            break;
        }
        rows.push(row.iter().map(sheet_cell).collect());
    }
    Ok(rows)
}

fn sheet_cell(data: &Data) -> Option<Cell> {
    match data {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) => Cell::from_raw(s),
        Data::Float(f) => Some(Cell::Number(*f)),
        Data::Int(i) => Some(Cell::Number(*i as f64)),
        Data::Bool(b) => Some(Cell::Text(b.to_string())),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => Some(Cell::Date(datetime.date())),
            None => Some(Cell::Number(dt.as_f64())),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::from_raw(s),
    }
}

fn header_names(cells: &[Option<Cell>]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(cells.len());
    for (index, cell) in cells.iter().enumerate() {
        let base = match cell {
            Some(cell) => cell.as_display().trim().to_string(),
            None => String::new(),
        };
        let base = if base.is_empty() {
            format!("column_{}", index + 1)
        } else {
            base
        };
        let name = unique_name(&names, &base);
        names.push(name);
    }
    names
}

fn unique_name(existing: &[String], base: &str) -> String {
    if !existing.iter().any(|n| n == base) {
        return base.to_string();
    }
    let mut suffix = 2;
    loop {
        let candidate = format!("{base}_{suffix}");
        if !existing.iter().any(|n| n == &candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_types_cells_and_skips_leading_rows() {
        let bytes = b"report generated 2024\n\nName,Qty,When\nwidget,3,01/02/2024\ngadget,,15/02/2024\n";
        let table = Table::parse(bytes, FileKind::Csv, 2).expect("parse");
        assert_eq!(table.column_names(), &["Name", "Qty", "When"]);
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 1), Some(&Cell::Number(3.0)));
        assert_eq!(table.cell(1, 1), None);
        assert_eq!(table.cell(1, 2), Some(&Cell::Text("15/02/2024".into())));
    }

    #[test]
    fn header_names_are_unique_and_synthetic_when_blank() {
        let bytes = b"Name,,Name,Qty\na,b,c,1\n";
        let table = Table::parse(bytes, FileKind::Csv, 0).expect("parse");
        assert_eq!(table.column_names(), &["Name", "column_2", "Name_2", "Qty"]);
    }

    #[test]
    fn ragged_rows_are_padded_to_header_width() {
        let bytes = b"A,B,C\n1,2\n4,5,6,7\n";
        let table = Table::parse(bytes, FileKind::Csv, 0).expect("parse");
        assert_eq!(table.row_count(), 2);
        assert_eq!(table.cell(0, 2), None);
        assert_eq!(table.cell(1, 2), Some(&Cell::Number(6.0)));
    }

    #[test]
    fn parse_past_end_is_empty_table() {
        let bytes = b"only,one,row\n";
        assert!(matches!(
            Table::parse(bytes, FileKind::Csv, 3),
            Err(QueryError::EmptyTable)
        ));
    }

    #[test]
    fn remap_and_retain_rewrite_rows() {
        let bytes = b"KT,Qty\nKT_old,1\nKT_kept,2\nKT_old,3\n";
        let mut table = Table::parse(bytes, FileKind::Csv, 0).expect("parse");
        table.remap_column(0, &[("KT_old".to_string(), "KT_new".to_string())]);
        assert_eq!(table.cell(0, 0), Some(&Cell::Text("KT_new".into())));
        assert_eq!(table.cell(1, 0), Some(&Cell::Text("KT_kept".into())));
        table.retain_matching(0, "KT_new");
        assert_eq!(table.row_count(), 2);
    }

    #[test]
    fn file_kind_from_extension() {
        assert_eq!(FileKind::from_name("report.XLSX"), FileKind::Xlsx);
        assert_eq!(FileKind::from_name("data.tsv"), FileKind::Tsv);
        assert_eq!(FileKind::from_name("plain.csv"), FileKind::Csv);
        assert_eq!(FileKind::from_name("no-extension"), FileKind::Csv);
    }
}
