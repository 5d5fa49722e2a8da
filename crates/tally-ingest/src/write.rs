//! Encode a canonical record set as a downloadable CSV or XLSX file.
//!
//! Both writers emit [`HEADERS`] followed by one row per record in merge
//! order. Null fields are left blank.

use rust_decimal::{Decimal, prelude::ToPrimitive as _};
use rust_xlsxwriter::{Format, Workbook};
use tally_core::SaleRecord;

use crate::Result;

/// Export column headings, in output order.
pub const HEADERS: [&str; 15] = [
  "Customer Code",
  "Customer Name",
  "Customer Place",
  "Location of Supply",
  "Date",
  "Product",
  "Tax Rate",
  "Qty",
  "Unit of Qty",
  "Sale Value",
  "Tax Value",
  "Invoice Value",
  "Month",
  "Year",
  "Financial Year",
];

const SHEET_NAME: &str = "Sales";

enum Value {
  Blank,
  Text(String),
  Number(Decimal),
}

impl Value {
  fn text(s: &Option<String>) -> Self { s.clone().map_or(Self::Blank, Self::Text) }

  fn number(d: Option<Decimal>) -> Self { d.map_or(Self::Blank, Self::Number) }
}

fn row_values(r: &SaleRecord) -> [Value; 15] {
  [
    Value::text(&r.customer_code),
    Value::text(&r.customer_name),
    Value::text(&r.customer_place),
    Value::text(&r.location_of_supply),
    Value::text(&r.transaction_date.map(|d| d.format("%Y-%m-%d").to_string())),
    Value::text(&r.product),
    Value::number(r.tax_rate),
    Value::number(r.quantity),
    Value::text(&r.unit_of_quantity),
    Value::number(r.sale_value),
    Value::number(r.tax_value),
    Value::number(r.invoice_value),
    Value::text(&r.month_name),
    Value::number(r.calendar_year.map(Decimal::from)),
    Value::text(&r.financial_year),
  ]
}

// ─── CSV ─────────────────────────────────────────────────────────────────────

pub fn write_csv(records: &[SaleRecord]) -> Result<Vec<u8>> {
  let mut writer = csv::Writer::from_writer(Vec::new());
  writer.write_record(HEADERS)?;

  for record in records {
    let fields = row_values(record).map(|v| match v {
      Value::Blank => String::new(),
      Value::Text(s) => s,
      Value::Number(n) => n.to_string(),
    });
    writer.write_record(&fields)?;
  }

  Ok(writer.into_inner().map_err(|e| e.into_error())?)
}

// ─── XLSX ────────────────────────────────────────────────────────────────────

/// Single-sheet workbook. Decimals are written as spreadsheet numbers; dates
/// are written as ISO text so they read back unambiguously.
pub fn write_xlsx(records: &[SaleRecord]) -> Result<Vec<u8>> {
  let mut workbook = Workbook::new();
  let bold = Format::new().set_bold();
  let sheet = workbook.add_worksheet();
  sheet.set_name(SHEET_NAME)?;

  for (col, header) in (0u16..).zip(HEADERS) {
    sheet.write_string_with_format(0, col, header, &bold)?;
  }

  for (row, record) in (1u32..).zip(records) {
    for (col, value) in (0u16..).zip(row_values(record)) {
      match value {
        Value::Blank => {}
        Value::Text(s) => {
          sheet.write_string(row, col, s)?;
        }
        Value::Number(n) => {
          if let Some(f) = n.to_f64() {
            sheet.write_number(row, col, f)?;
          }
        }
      }
    }
  }

  Ok(workbook.save_to_buffer()?)
}
