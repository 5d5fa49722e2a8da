//! Canonical record types: the output of a merge and the input to every
//! query.
//!
//! Records are created only by [`crate::normalize`] and are never mutated
//! afterwards. A new merge replaces the owner's whole set.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─── Owner ───────────────────────────────────────────────────────────────────

/// The authenticated identity that partitions all data.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Owner(String);

impl Owner {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for Owner {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Owner {
  fn from(s: &str) -> Self { Self(s.to_owned()) }
}

impl From<String> for Owner {
  fn from(s: String) -> Self { Self(s) }
}

// ─── SaleRecord ──────────────────────────────────────────────────────────────

/// One row of an owner's canonical dataset.
///
/// Passthrough fields are copied from the upload after type coercion; the
/// last four fields are derived by the normaliser and obey:
///
/// - `invoice_value` is `Some` iff both `sale_value` and `tax_value` are.
/// - `month_name`, `calendar_year` and `financial_year` are `Some` iff
///   `transaction_date` is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
  pub owner:              Owner,
  pub customer_code:      Option<String>,
  pub customer_name:      Option<String>,
  pub customer_place:     Option<String>,
  pub location_of_supply: Option<String>,
  pub transaction_date:   Option<NaiveDate>,
  pub product:            Option<String>,
  pub tax_rate:           Option<Decimal>,
  pub quantity:           Option<Decimal>,
  pub unit_of_quantity:   Option<String>,
  pub sale_value:         Option<Decimal>,
  pub tax_value:          Option<Decimal>,

  // derived
  pub invoice_value:      Option<Decimal>,
  pub month_name:         Option<String>,
  pub calendar_year:      Option<i32>,
  pub financial_year:     Option<String>,
}

impl SaleRecord {
  /// A record for `owner` with every field null.
  pub fn empty(owner: Owner) -> Self {
    Self {
      owner,
      customer_code: None,
      customer_name: None,
      customer_place: None,
      location_of_supply: None,
      transaction_date: None,
      product: None,
      tax_rate: None,
      quantity: None,
      unit_of_quantity: None,
      sale_value: None,
      tax_value: None,
      invoice_value: None,
      month_name: None,
      calendar_year: None,
      financial_year: None,
    }
  }
}

// ─── DatasetInfo ─────────────────────────────────────────────────────────────

/// Metadata about an owner's current canonical set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetInfo {
  pub owner:        Owner,
  pub merged_at:    DateTime<Utc>,
  pub record_count: usize,
}
