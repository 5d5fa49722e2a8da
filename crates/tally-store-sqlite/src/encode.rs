//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are RFC 3339 strings, dates are `YYYY-MM-DD`, and decimals use
//! their exact `Display` form so no precision is lost to floating point.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use tally_core::{DatasetInfo, Owner, SaleRecord};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> { Ok(Decimal::from_str(s)?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// A `sale_records` row in column form, ready for binding or just read back.
pub struct RawRecord {
  pub customer_code:      Option<String>,
  pub customer_name:      Option<String>,
  pub customer_place:     Option<String>,
  pub location_of_supply: Option<String>,
  pub transaction_date:   Option<String>,
  pub product:            Option<String>,
  pub tax_rate:           Option<String>,
  pub quantity:           Option<String>,
  pub unit_of_quantity:   Option<String>,
  pub sale_value:         Option<String>,
  pub tax_value:          Option<String>,
  pub invoice_value:      Option<String>,
  pub month_name:         Option<String>,
  pub calendar_year:      Option<i32>,
  pub financial_year:     Option<String>,
}

/// Column list shared by INSERT and SELECT, in [`RawRecord`] field order.
pub const RECORD_COLUMNS: &str = "customer_code, customer_name, customer_place, \
  location_of_supply, transaction_date, product, tax_rate, quantity, \
  unit_of_quantity, sale_value, tax_value, invoice_value, month_name, \
  calendar_year, financial_year";

impl RawRecord {
  pub fn from_record(r: &SaleRecord) -> Self {
    let dec = |d: Option<Decimal>| d.map(encode_decimal);
    Self {
      customer_code:      r.customer_code.clone(),
      customer_name:      r.customer_name.clone(),
      customer_place:     r.customer_place.clone(),
      location_of_supply: r.location_of_supply.clone(),
      transaction_date:   r.transaction_date.map(encode_date),
      product:            r.product.clone(),
      tax_rate:           dec(r.tax_rate),
      quantity:           dec(r.quantity),
      unit_of_quantity:   r.unit_of_quantity.clone(),
      sale_value:         dec(r.sale_value),
      tax_value:          dec(r.tax_value),
      invoice_value:      dec(r.invoice_value),
      month_name:         r.month_name.clone(),
      calendar_year:      r.calendar_year,
      financial_year:     r.financial_year.clone(),
    }
  }

  /// Read the [`RECORD_COLUMNS`] starting at column index 0.
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      customer_code:      row.get(0)?,
      customer_name:      row.get(1)?,
      customer_place:     row.get(2)?,
      location_of_supply: row.get(3)?,
      transaction_date:   row.get(4)?,
      product:            row.get(5)?,
      tax_rate:           row.get(6)?,
      quantity:           row.get(7)?,
      unit_of_quantity:   row.get(8)?,
      sale_value:         row.get(9)?,
      tax_value:          row.get(10)?,
      invoice_value:      row.get(11)?,
      month_name:         row.get(12)?,
      calendar_year:      row.get(13)?,
      financial_year:     row.get(14)?,
    })
  }

  pub fn into_record(self, owner: &Owner) -> Result<SaleRecord> {
    let dec = |s: Option<String>| s.as_deref().map(decode_decimal).transpose();
    Ok(SaleRecord {
      owner:              owner.clone(),
      customer_code:      self.customer_code,
      customer_name:      self.customer_name,
      customer_place:     self.customer_place,
      location_of_supply: self.location_of_supply,
      transaction_date:   self.transaction_date.as_deref().map(decode_date).transpose()?,
      product:            self.product,
      tax_rate:           dec(self.tax_rate)?,
      quantity:           dec(self.quantity)?,
      unit_of_quantity:   self.unit_of_quantity,
      sale_value:         dec(self.sale_value)?,
      tax_value:          dec(self.tax_value)?,
      invoice_value:      dec(self.invoice_value)?,
      month_name:         self.month_name,
      calendar_year:      self.calendar_year,
      financial_year:     self.financial_year,
    })
  }
}

/// Raw strings read directly from a `datasets` row.
pub struct RawDataset {
  pub owner:        String,
  pub merged_at:    String,
  pub record_count: i64,
}

impl RawDataset {
  pub fn into_info(self) -> Result<DatasetInfo> {
    let record_count = usize::try_from(self.record_count).map_err(|_| Error::InvalidColumn {
      column: "record_count",
      value:  self.record_count.to_string(),
    })?;
    Ok(DatasetInfo {
      owner: Owner::new(self.owner),
      merged_at: decode_dt(&self.merged_at)?,
      record_count,
    })
  }
}
