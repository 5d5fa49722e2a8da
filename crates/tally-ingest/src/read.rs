//! Decode uploaded files into [`RawTable`]s.
//!
//! The first row of a file (or of the first worksheet) is the header row.
//! Rows whose cells are all empty are skipped.

use std::path::Path;

use calamine::{Data, Reader as _, open_workbook_auto};
use rust_decimal::{Decimal, prelude::FromPrimitive as _};
use tally_core::{
  normalize::date_from_excel_serial,
  table::{Cell, RawTable},
};

use crate::{Error, Result};

/// File extensions the readers understand, lower-case.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["csv", "xlsx", "xlsm", "xls", "ods"];

/// Lower-cased extension of `name` if it is one of [`SUPPORTED_EXTENSIONS`].
pub fn supported_extension(name: &str) -> Option<String> {
  let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
  SUPPORTED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Read `path`, choosing the decoder by extension.
pub fn read_table(path: &Path) -> Result<RawTable> {
  let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
  match supported_extension(name).as_deref() {
    Some("csv") => {
      let bytes = std::fs::read(path)?;
      read_csv(name, &bytes)
    }
    Some(_) => read_workbook(path),
    None => Err(Error::UnsupportedFormat(name.to_owned())),
  }
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

/// Decode CSV bytes. Input that is not valid UTF-8 is decoded as
/// Windows-1252, which is what spreadsheet tools commonly emit.
pub fn read_csv(source: &str, bytes: &[u8]) -> Result<RawTable> {
  let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
  let content = match std::str::from_utf8(bytes) {
    Ok(s) => std::borrow::Cow::Borrowed(s),
    Err(_) => encoding_rs::WINDOWS_1252.decode(bytes).0,
  };

  let mut reader = csv::ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .from_reader(content.as_bytes());

  let columns = reader.headers()?.iter().map(str::to_owned).collect();
  let mut table = RawTable::new(source, columns);

  for record in reader.records() {
    let row: Vec<Cell> = record?.iter().map(Cell::from).collect();
    if row.iter().all(Cell::is_empty) {
      continue;
    }
    table.push_row(row);
  }
  Ok(table)
}

// ─── Workbooks ───────────────────────────────────────────────────────────────

/// Decode the first worksheet of an xlsx/xlsm/xls/ods workbook.
pub fn read_workbook(path: &Path) -> Result<RawTable> {
  let source = path
    .file_name()
    .map(|n| n.to_string_lossy().into_owned())
    .unwrap_or_default();

  let mut workbook = open_workbook_auto(path)?;
  let first = workbook
    .sheet_names()
    .first()
    .cloned()
    .ok_or_else(|| Error::EmptyWorkbook(source.clone()))?;
  let range = workbook.worksheet_range(&first)?;

  let mut rows = range.rows();
  let columns = match rows.next() {
    Some(header) => header.iter().map(header_text).collect(),
    None => Vec::new(),
  };
  let mut table = RawTable::new(source, columns);

  for row in rows {
    let cells: Vec<Cell> = row.iter().map(data_to_cell).collect();
    if cells.iter().all(Cell::is_empty) {
      continue;
    }
    table.push_row(cells);
  }
  Ok(table)
}

fn header_text(data: &Data) -> String {
  match data {
    Data::Empty => String::new(),
    Data::String(s) => s.clone(),
    other => other.to_string(),
  }
}

fn data_to_cell(data: &Data) -> Cell {
  match data {
    Data::Empty | Data::Error(_) => Cell::Empty,
    Data::String(s) => Cell::from(s.as_str()),
    Data::Int(n) => Cell::Number(Decimal::from(*n)),
    Data::Float(f) => Decimal::from_f64(*f).map_or(Cell::Empty, Cell::Number),
    Data::Bool(b) => Cell::Text(if *b { "TRUE" } else { "FALSE" }.to_owned()),
    // Workbooks from the 1904 date system are read as 1900 serials.
    Data::DateTime(dt) => Decimal::from_f64(dt.as_f64())
      .and_then(date_from_excel_serial)
      .map_or(Cell::Empty, Cell::Date),
    Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
  }
}

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;

  use super::*;

  #[test]
  fn csv_header_and_rows() {
    let csv = b"Date,Product,Sale Value\n2024-01-10,Widget,100\n2024-02-01,,50\n";
    let t = read_csv("a.csv", csv).unwrap();

    assert_eq!(t.columns, ["Date", "Product", "Sale Value"]);
    assert_eq!(t.len(), 2);
    assert_eq!(t.rows()[1], vec![Cell::from("2024-02-01"), Cell::Empty, Cell::from("50")]);
  }

  #[test]
  fn csv_ragged_rows_are_padded_and_blank_rows_skipped() {
    let csv = b"A,B,C\n1\n,,\n1,2,3,4\n";
    let t = read_csv("a.csv", csv).unwrap();

    assert_eq!(t.len(), 2);
    assert_eq!(t.rows()[0], vec![Cell::from("1"), Cell::Empty, Cell::Empty]);
    assert_eq!(t.rows()[1].len(), 3);
  }

  #[test]
  fn csv_bom_and_windows_1252() {
    let mut bytes = "\u{feff}Product\n".as_bytes().to_vec();
    bytes.extend_from_slice(b"Caf\xe9\n");
    let t = read_csv("a.csv", &bytes).unwrap();

    assert_eq!(t.columns, ["Product"]);
    assert_eq!(t.rows()[0], vec![Cell::from("Café")]);
  }

  #[test]
  fn workbook_cells_are_typed() {
    assert_eq!(data_to_cell(&Data::Float(100.5)), Cell::Number(dec!(100.5)));
    assert_eq!(data_to_cell(&Data::Int(7)), Cell::Number(dec!(7)));
    assert_eq!(data_to_cell(&Data::String(String::new())), Cell::Empty);
    assert_eq!(data_to_cell(&Data::Empty), Cell::Empty);
  }

  #[test]
  fn unsupported_extension_is_rejected() {
    let err = read_table(Path::new("/nonexistent/notes.txt")).unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
    assert_eq!(supported_extension("Sales.XLSX").as_deref(), Some("xlsx"));
    assert_eq!(supported_extension("sales"), None);
  }
}
