//! Raw tabular input: one decoded upload, before any normalisation.
//!
//! File readers live in `tally-ingest`; this crate only sees the decoded grid.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// A single loosely-typed cell as produced by a file reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
  Empty,
  Text(String),
  Number(Decimal),
  Date(NaiveDate),
}

impl Cell {
  pub fn is_empty(&self) -> bool { matches!(self, Self::Empty) }
}

impl From<&str> for Cell {
  fn from(s: &str) -> Self {
    if s.is_empty() { Self::Empty } else { Self::Text(s.to_owned()) }
  }
}

impl From<Decimal> for Cell {
  fn from(d: Decimal) -> Self { Self::Number(d) }
}

impl From<NaiveDate> for Cell {
  fn from(d: NaiveDate) -> Self { Self::Date(d) }
}

/// A rectangular grid of named columns.
///
/// Every row has exactly `columns.len()` cells; [`RawTable::push_row`] pads
/// short rows with [`Cell::Empty`] and drops surplus cells.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTable {
  /// Where the table came from (a file name); used only for logging.
  pub source:  String,
  pub columns: Vec<String>,
  rows:        Vec<Vec<Cell>>,
}

impl RawTable {
  pub fn new(source: impl Into<String>, columns: Vec<String>) -> Self {
    Self { source: source.into(), columns, rows: Vec::new() }
  }

  pub fn push_row(&mut self, mut row: Vec<Cell>) {
    row.resize(self.columns.len(), Cell::Empty);
    self.rows.push(row);
  }

  /// Builder-style [`RawTable::push_row`].
  pub fn with_row(mut self, row: Vec<Cell>) -> Self {
    self.push_row(row);
    self
  }

  pub fn rows(&self) -> &[Vec<Cell>] { &self.rows }

  pub fn len(&self) -> usize { self.rows.len() }

  pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}
