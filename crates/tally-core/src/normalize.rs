//! The merge-and-enrich pipeline: raw tables in, canonical records out.
//!
//! Each table is normalised on its own (headers matched, cells coerced,
//! calendar and financial-year fields derived, invoice totals computed) and
//! the results are concatenated in input order. Nothing here touches a store;
//! [`crate::ledger::Ledger`] performs the swap.
//!
//! Cell-level failures never abort: an unparseable date or number becomes
//! `None` and the row is kept.

use std::str::FromStr as _;

use chrono::{Datelike as _, Days, NaiveDate, NaiveDateTime};
use rust_decimal::{Decimal, prelude::ToPrimitive as _};
use tracing::{debug, warn};

use crate::{
  Error, Result,
  record::{Owner, SaleRecord},
  table::{Cell, RawTable},
};

// ─── Entry points ────────────────────────────────────────────────────────────

/// Normalise and concatenate every table for `owner`.
///
/// Output order is input-table order, then row order within each table.
/// Fails with [`Error::NoInputData`] when `tables` is empty.
pub fn merge(owner: &Owner, tables: &[RawTable]) -> Result<Vec<SaleRecord>> {
  if tables.is_empty() {
    return Err(Error::NoInputData(owner.clone()));
  }

  let total = tables.iter().map(RawTable::len).sum();
  let mut records = Vec::with_capacity(total);
  for table in tables {
    records.extend(normalize_table(owner, table));
  }
  Ok(records)
}

/// Normalise one table. Columns the table lacks yield `None` fields.
pub fn normalize_table(owner: &Owner, table: &RawTable) -> Vec<SaleRecord> {
  let columns = ColumnMap::resolve(&table.columns);
  // Invoice totals need both source columns; otherwise the whole table
  // carries a null invoice value.
  let derive_invoice =
    columns.get(Field::SaleValue).is_some() && columns.get(Field::TaxValue).is_some();

  let mut bad_dates = 0usize;
  let mut clamped = 0usize;
  let records: Vec<SaleRecord> = table
    .rows()
    .iter()
    .map(|row| {
      let cell = |field: Field| columns.get(field).map(|i| &row[i]);
      let text = |field: Field| cell(field).and_then(coerce_text);
      let number = |field: Field| cell(field).and_then(coerce_decimal);

      let mut record = SaleRecord::empty(owner.clone());
      record.customer_code = text(Field::CustomerCode);
      record.customer_name = text(Field::CustomerName);
      record.customer_place = text(Field::CustomerPlace);
      record.location_of_supply = text(Field::LocationOfSupply);
      record.product = text(Field::Product);
      record.tax_rate = number(Field::TaxRate);
      record.quantity = number(Field::Quantity);
      record.unit_of_quantity = text(Field::UnitOfQuantity);
      record.sale_value = number(Field::SaleValue);
      record.tax_value = number(Field::TaxValue);

      if let Some(raw) = cell(Field::Date) {
        let date = coerce_date(raw);
        if date.is_none() && !raw.is_empty() {
          bad_dates += 1;
        }
        record.transaction_date = date;
      }

      derive_date_fields(&mut record);
      if derive_invoice {
        if let (Some(sale), Some(tax)) = (record.sale_value, record.tax_value)
          && sale.checked_add(tax).is_none()
        {
          clamped += 1;
        }
        record.invoice_value = invoice_value(record.sale_value, record.tax_value);
      }
      record
    })
    .collect();

  if bad_dates > 0 {
    warn!(
      source = %table.source,
      count = bad_dates,
      "unparseable dates replaced with null"
    );
  }
  if clamped > 0 {
    warn!(
      source = %table.source,
      count = clamped,
      "invoice value out of range, clamped"
    );
  }
  debug!(
    source = %table.source,
    rows = records.len(),
    has_date = columns.get(Field::Date).is_some(),
    derive_invoice,
    "normalised table"
  );

  records
}

// ─── Derivations ─────────────────────────────────────────────────────────────

/// April–March fiscal year label: `"{Y-1}-{Y}"` for January to March,
/// `"{Y}-{Y+1}"` otherwise.
pub fn financial_year(date: NaiveDate) -> String {
  let year = date.year();
  if date.month() <= 3 {
    format!("{}-{}", year - 1, year)
  } else {
    format!("{}-{}", year, year + 1)
  }
}

/// Full English month name, e.g. `"January"`.
pub fn month_name(date: NaiveDate) -> String { date.format("%B").to_string() }

/// `sale + tax` when both are present, saturating at the decimal range.
pub fn invoice_value(sale: Option<Decimal>, tax: Option<Decimal>) -> Option<Decimal> {
  sale.zip(tax).map(|(s, t)| s.saturating_add(t))
}

fn derive_date_fields(record: &mut SaleRecord) {
  if let Some(date) = record.transaction_date {
    record.month_name = Some(month_name(date));
    record.calendar_year = Some(date.year());
    record.financial_year = Some(financial_year(date));
  }
}

// ─── Column recognition ──────────────────────────────────────────────────────

/// Source fields the normaliser understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
  Date,
  CustomerCode,
  CustomerName,
  CustomerPlace,
  LocationOfSupply,
  Product,
  TaxRate,
  Quantity,
  UnitOfQuantity,
  SaleValue,
  TaxValue,
}

impl Field {
  const COUNT: usize = 11;

  fn from_header(header: &str) -> Option<Self> {
    let field = match canonical_header(header).as_str() {
      "date" | "transaction date" | "invoice date" => Self::Date,
      "customer code" => Self::CustomerCode,
      "customer name" => Self::CustomerName,
      "customer place" => Self::CustomerPlace,
      "location of supply" | "place of supply" => Self::LocationOfSupply,
      "product" => Self::Product,
      "tax rate" => Self::TaxRate,
      "qty" | "quantity" => Self::Quantity,
      "unit of qty" | "unit of quantity" | "unit" => Self::UnitOfQuantity,
      "sale value" => Self::SaleValue,
      "tax value" => Self::TaxValue,
      _ => return None,
    };
    Some(field)
  }
}

/// Trim, lower-case, and collapse runs of whitespace or underscores to a
/// single space: `"  Sale_Value "` → `"sale value"`.
pub fn canonical_header(header: &str) -> String {
  header
    .split(|c: char| c.is_whitespace() || c == '_')
    .filter(|part| !part.is_empty())
    .map(str::to_lowercase)
    .collect::<Vec<_>>()
    .join(" ")
}

/// Field → column index for one table. The first matching column wins.
struct ColumnMap([Option<usize>; Field::COUNT]);

impl ColumnMap {
  fn resolve(columns: &[String]) -> Self {
    let mut slots = [None; Field::COUNT];
    for (idx, header) in columns.iter().enumerate() {
      if let Some(field) = Field::from_header(header) {
        slots[field as usize].get_or_insert(idx);
      }
    }
    Self(slots)
  }

  fn get(&self, field: Field) -> Option<usize> { self.0[field as usize] }
}

// ─── Cell coercion ───────────────────────────────────────────────────────────

const DATE_FORMATS: &[&str] = &[
  "%Y-%m-%d",
  "%Y/%m/%d",
  "%m/%d/%Y",
  "%d-%m-%Y",
  "%d-%b-%Y",
  "%d %B %Y",
  "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
  "%Y-%m-%dT%H:%M:%S%.f",
  "%Y-%m-%d %H:%M:%S%.f",
  "%Y-%m-%dT%H:%M:%S",
  "%Y-%m-%d %H:%M:%S",
];

/// Serial day number of 9999-12-31 in the 1900 date system.
const MAX_EXCEL_SERIAL: i64 = 2_958_465;

/// Convert an Excel serial day number (1900 date system) to a date. Any
/// fractional time-of-day part is discarded.
pub fn date_from_excel_serial(serial: Decimal) -> Option<NaiveDate> {
  let days = serial.trunc().to_i64()?;
  if !(1..=MAX_EXCEL_SERIAL).contains(&days) {
    return None;
  }
  NaiveDate::from_ymd_opt(1899, 12, 30)?.checked_add_days(Days::new(days as u64))
}

pub fn coerce_date(cell: &Cell) -> Option<NaiveDate> {
  match cell {
    Cell::Empty => None,
    Cell::Date(d) => Some(*d),
    Cell::Number(n) => date_from_excel_serial(*n),
    Cell::Text(s) => parse_date(s.trim()),
  }
}

fn parse_date(s: &str) -> Option<NaiveDate> {
  if s.is_empty() {
    return None;
  }
  DATE_FORMATS
    .iter()
    .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    .or_else(|| {
      DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.date())
    })
}

pub fn coerce_decimal(cell: &Cell) -> Option<Decimal> {
  match cell {
    Cell::Number(n) => Some(*n),
    Cell::Text(s) => parse_decimal(s),
    Cell::Empty | Cell::Date(_) => None,
  }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
  let cleaned: String = s.trim().trim_end_matches('%').chars().filter(|c| *c != ',').collect();
  let cleaned = cleaned.trim();
  if cleaned.is_empty() {
    return None;
  }
  Decimal::from_str(cleaned)
    .or_else(|_| Decimal::from_scientific(cleaned))
    .ok()
}

pub fn coerce_text(cell: &Cell) -> Option<String> {
  match cell {
    Cell::Empty => None,
    Cell::Text(s) => {
      let s = s.trim();
      (!s.is_empty()).then(|| s.to_owned())
    }
    Cell::Number(n) => Some(n.normalize().to_string()),
    Cell::Date(d) => Some(d.to_string()),
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use rust_decimal_macros::dec;

  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, d).unwrap() }

  fn owner() -> Owner { Owner::from("alice") }

  fn table(columns: &[&str]) -> RawTable {
    RawTable::new("test.csv", columns.iter().map(|c| c.to_string()).collect())
  }

  // ── Derivations ───────────────────────────────────────────────────────────

  #[test]
  fn financial_year_boundaries() {
    assert_eq!(financial_year(date(2024, 1, 1)), "2023-2024");
    assert_eq!(financial_year(date(2024, 2, 15)), "2023-2024");
    assert_eq!(financial_year(date(2024, 3, 31)), "2023-2024");
    assert_eq!(financial_year(date(2024, 4, 1)), "2024-2025");
    assert_eq!(financial_year(date(2024, 12, 31)), "2024-2025");
  }

  #[test]
  fn month_names_are_full() {
    assert_eq!(month_name(date(2024, 1, 10)), "January");
    assert_eq!(month_name(date(2024, 9, 1)), "September");
  }

  #[test]
  fn invoice_value_needs_both_inputs() {
    assert_eq!(invoice_value(Some(dec!(100.0)), Some(dec!(18.0))), Some(dec!(118.0)));
    assert_eq!(invoice_value(Some(dec!(100.0)), None), None);
    assert_eq!(invoice_value(None, Some(dec!(18.0))), None);
  }

  #[test]
  fn invoice_value_saturates_instead_of_vanishing() {
    assert_eq!(invoice_value(Some(Decimal::MAX), Some(Decimal::MAX)), Some(Decimal::MAX));
    assert_eq!(invoice_value(Some(Decimal::MIN), Some(dec!(-1))), Some(Decimal::MIN));

    let t = table(&["Sale Value", "Tax Value"])
      .with_row(vec![Cell::from("79228162514264337593543950335"), Cell::from("1")]);
    let r = &normalize_table(&owner(), &t)[0];
    assert_eq!(r.sale_value, Some(Decimal::MAX));
    assert_eq!(r.invoice_value, Some(Decimal::MAX));
  }

  // ── Coercion ──────────────────────────────────────────────────────────────

  #[test]
  fn dates_from_text_in_several_formats() {
    let expected = Some(date(2024, 1, 10));
    for raw in [
      "2024-01-10",
      " 2024/01/10 ",
      "01/10/2024",
      "10-01-2024",
      "10-Jan-2024",
      "10 January 2024",
      "January 10, 2024",
      "2024-01-10 13:45:00",
      "2024-01-10T00:00:00",
    ] {
      assert_eq!(coerce_date(&Cell::from(raw)), expected, "input {raw:?}");
    }
  }

  #[test]
  fn dates_from_excel_serials() {
    assert_eq!(coerce_date(&Cell::Number(dec!(45301))), Some(date(2024, 1, 10)));
    assert_eq!(coerce_date(&Cell::Number(dec!(45301.75))), Some(date(2024, 1, 10)));
    assert_eq!(coerce_date(&Cell::Number(dec!(-3))), None);
  }

  #[test]
  fn garbage_dates_become_none() {
    assert_eq!(coerce_date(&Cell::from("not a date")), None);
    assert_eq!(coerce_date(&Cell::from("2024-13-45")), None);
    assert_eq!(coerce_date(&Cell::Empty), None);
  }

  #[test]
  fn decimals_tolerate_separators_and_percent() {
    assert_eq!(coerce_decimal(&Cell::from("1,250.50")), Some(dec!(1250.50)));
    assert_eq!(coerce_decimal(&Cell::from("18%")), Some(dec!(18)));
    assert_eq!(coerce_decimal(&Cell::from("1e3")), Some(dec!(1000)));
    assert_eq!(coerce_decimal(&Cell::from("n/a")), None);
    assert_eq!(coerce_decimal(&Cell::from("  ")), None);
  }

  #[test]
  fn text_is_trimmed_and_numbers_rendered() {
    assert_eq!(coerce_text(&Cell::from("  Widget ")), Some("Widget".into()));
    assert_eq!(coerce_text(&Cell::from("   ")), None);
    assert_eq!(coerce_text(&Cell::Number(dec!(1001.0))), Some("1001".into()));
  }

  #[test]
  fn headers_are_canonicalised() {
    assert_eq!(canonical_header("  Sale Value "), "sale value");
    assert_eq!(canonical_header("Sale_Value"), "sale value");
    assert_eq!(canonical_header("TAX   RATE"), "tax rate");
  }

  // ── Tables ────────────────────────────────────────────────────────────────

  #[test]
  fn derives_fields_for_the_reference_table() {
    let t = table(&["Date", "Sale Value", "Tax Value"])
      .with_row(vec![Cell::from("2024-01-10"), Cell::from("100"), Cell::from("5")])
      .with_row(vec![Cell::from("2024-05-10"), Cell::from("200"), Cell::from("10")]);

    let records = merge(&owner(), &[t]).unwrap();
    assert_eq!(records.len(), 2);

    assert_eq!(records[0].financial_year.as_deref(), Some("2023-2024"));
    assert_eq!(records[0].month_name.as_deref(), Some("January"));
    assert_eq!(records[0].calendar_year, Some(2024));
    assert_eq!(records[0].invoice_value, Some(dec!(105)));

    assert_eq!(records[1].financial_year.as_deref(), Some("2024-2025"));
    assert_eq!(records[1].invoice_value, Some(dec!(210)));
    assert!(records.iter().all(|r| r.owner == owner()));
  }

  #[test]
  fn untrimmed_headers_still_match() {
    let t = table(&["  Date ", " Sale Value", "Tax Value  ", " Product "]).with_row(vec![
      Cell::from("2024-04-01"),
      Cell::from("10"),
      Cell::from("1"),
      Cell::from("Widget"),
    ]);

    let r = &normalize_table(&owner(), &t)[0];
    assert_eq!(r.transaction_date, Some(date(2024, 4, 1)));
    assert_eq!(r.invoice_value, Some(dec!(11)));
    assert_eq!(r.product.as_deref(), Some("Widget"));
  }

  #[test]
  fn bad_date_keeps_the_row_without_derived_fields() {
    let t = table(&["Date", "Qty"])
      .with_row(vec![Cell::from("garbage"), Cell::from("3")])
      .with_row(vec![Cell::from("2024-02-01"), Cell::from("4")]);

    let records = normalize_table(&owner(), &t);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].transaction_date, None);
    assert_eq!(records[0].financial_year, None);
    assert_eq!(records[0].month_name, None);
    assert_eq!(records[0].calendar_year, None);
    assert_eq!(records[0].quantity, Some(dec!(3)));
    assert_eq!(records[1].financial_year.as_deref(), Some("2023-2024"));
  }

  #[test]
  fn missing_date_column_yields_no_derived_fields() {
    let t = table(&["Product", "Qty"]).with_row(vec![Cell::from("Widget"), Cell::from("2")]);

    let r = &normalize_table(&owner(), &t)[0];
    assert_eq!(r.transaction_date, None);
    assert_eq!(r.financial_year, None);
    assert_eq!(r.product.as_deref(), Some("Widget"));
  }

  #[test]
  fn null_tax_cell_nulls_only_that_rows_invoice() {
    let t = table(&["Sale Value", "Tax Value"])
      .with_row(vec![Cell::from("100.0"), Cell::Empty])
      .with_row(vec![Cell::from("100.0"), Cell::from("18.0")]);

    let records = normalize_table(&owner(), &t);
    assert_eq!(records[0].invoice_value, None);
    assert_eq!(records[1].invoice_value, Some(dec!(118.0)));
  }

  #[test]
  fn missing_tax_column_nulls_every_invoice() {
    let t = table(&["Sale Value"]).with_row(vec![Cell::from("100")]);

    let r = &normalize_table(&owner(), &t)[0];
    assert_eq!(r.sale_value, Some(dec!(100)));
    assert_eq!(r.invoice_value, None);
  }

  #[test]
  fn tables_with_different_columns_concatenate_in_order() {
    let a = table(&["Product", "Qty"])
      .with_row(vec![Cell::from("A1"), Cell::from("1")])
      .with_row(vec![Cell::from("A2"), Cell::from("2")]);
    let b = table(&["Customer Name", "Product", "Unit"])
      .with_row(vec![Cell::from("Bob"), Cell::from("B1"), Cell::from("kg")]);

    let records = merge(&owner(), &[a, b]).unwrap();
    let products: Vec<_> = records.iter().map(|r| r.product.as_deref()).collect();
    assert_eq!(products, [Some("A1"), Some("A2"), Some("B1")]);

    assert_eq!(records[0].customer_name, None);
    assert_eq!(records[2].customer_name.as_deref(), Some("Bob"));
    assert_eq!(records[2].quantity, None);
    assert_eq!(records[2].unit_of_quantity.as_deref(), Some("kg"));
  }

  #[test]
  fn derived_columns_in_input_are_recomputed() {
    let t = table(&["Date", "Financial Year", "Invoice Value"]).with_row(vec![
      Cell::from("2024-02-01"),
      Cell::from("1999-2000"),
      Cell::from("42"),
    ]);

    let r = &normalize_table(&owner(), &t)[0];
    assert_eq!(r.financial_year.as_deref(), Some("2023-2024"));
    assert_eq!(r.invoice_value, None);
  }

  #[test]
  fn merge_without_tables_is_no_input_data() {
    let err = merge(&owner(), &[]).unwrap_err();
    assert!(matches!(err, Error::NoInputData(o) if o == owner()));
  }

  #[test]
  fn merge_of_empty_table_is_an_empty_set() {
    let records = merge(&owner(), &[table(&["Date"])]).unwrap();
    assert!(records.is_empty());
  }
}
