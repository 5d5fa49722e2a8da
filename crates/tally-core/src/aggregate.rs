//! Filtered, grouped summaries over a canonical record set.
//!
//! Filtering is two-stage. [`SummaryParams`] holds the options exactly as the
//! caller supplied them; [`SummaryParams::validate`] turns them into a typed
//! [`RecordFilter`], mapping blank or malformed options to "no constraint".

use std::{collections::BTreeMap, str::FromStr as _};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{error::InvalidFilterValue, record::SaleRecord};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Summary options as received from the caller. Every option is optional and
/// blank strings count as absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryParams {
  pub month:          Option<String>,
  pub financial_year: Option<String>,
  pub product:        Option<String>,
  pub tax_rate:       Option<String>,
}

/// A validated predicate over [`SaleRecord`]s. Present options are ANDed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
  /// Lower-cased, trimmed month name.
  pub month:          Option<String>,
  /// Trimmed financial-year label, compared exactly.
  pub financial_year: Option<String>,
  /// Lower-cased, trimmed product name.
  pub product:        Option<String>,
  pub tax_rate:       Option<Decimal>,
}

impl SummaryParams {
  pub fn validate(&self) -> RecordFilter {
    let tax_rate = non_blank(&self.tax_rate).and_then(|raw| match parse_tax_rate(raw) {
      Ok(rate) => Some(rate),
      Err(e) => {
        debug!(error = %e, "ignoring filter option");
        None
      }
    });

    RecordFilter {
      month: non_blank(&self.month).map(str::to_lowercase),
      financial_year: non_blank(&self.financial_year).map(str::to_owned),
      product: non_blank(&self.product).map(str::to_lowercase),
      tax_rate,
    }
  }
}

fn non_blank(opt: &Option<String>) -> Option<&str> {
  opt.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn parse_tax_rate(raw: &str) -> Result<Decimal, InvalidFilterValue> {
  Decimal::from_str(raw)
    .or_else(|_| Decimal::from_scientific(raw))
    .map_err(|_| InvalidFilterValue { option: "tax_rate", value: raw.to_owned() })
}

impl RecordFilter {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  pub fn matches(&self, record: &SaleRecord) -> bool {
    fn folded_eq(field: &Option<String>, wanted: &str) -> bool {
      field.as_deref().is_some_and(|v| v.trim().to_lowercase() == wanted)
    }

    if let Some(month) = &self.month
      && !folded_eq(&record.month_name, month)
    {
      return false;
    }
    if let Some(fy) = &self.financial_year
      && record.financial_year.as_deref().map(str::trim) != Some(fy.as_str())
    {
      return false;
    }
    if let Some(product) = &self.product
      && !folded_eq(&record.product, product)
    {
      return false;
    }
    if let Some(rate) = self.tax_rate
      && record.tax_rate != Some(rate)
    {
      return false;
    }
    true
  }
}

// ─── Group rows ──────────────────────────────────────────────────────────────

/// One aggregated output row keyed by (month, financial year, product).
///
/// Sums skip null inputs (an all-null column sums to zero); `tax_rate` is the
/// mean of the non-null rates, or `None` if there are none. Every numeric
/// output is rounded to two decimal places.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupRow {
  pub month_name:     Option<String>,
  pub financial_year: Option<String>,
  pub product:        Option<String>,
  /// Number of records in the group.
  pub records:        usize,
  pub quantity:       Decimal,
  pub sale_value:     Decimal,
  pub tax_value:      Decimal,
  pub invoice_value:  Decimal,
  pub tax_rate:       Option<Decimal>,
}

type GroupKey = (Option<String>, Option<String>, Option<String>);

#[derive(Default)]
struct Accumulator {
  records:       usize,
  quantity:      Decimal,
  sale_value:    Decimal,
  tax_value:     Decimal,
  invoice_value: Decimal,
  rate_sum:      Decimal,
  rate_count:    u32,
  /// A running total hit the edge of the decimal range and was clamped.
  clamped:       bool,
  rate_overflow: bool,
}

/// Add `value` to `sum`, saturating on overflow. Returns whether it saturated.
fn add_clamped(sum: &mut Decimal, value: Option<Decimal>) -> bool {
  let value = value.unwrap_or_default();
  match sum.checked_add(value) {
    Some(total) => {
      *sum = total;
      false
    }
    None => {
      *sum = sum.saturating_add(value);
      true
    }
  }
}

impl Accumulator {
  fn add(&mut self, r: &SaleRecord) {
    self.records += 1;
    self.clamped |= add_clamped(&mut self.quantity, r.quantity);
    self.clamped |= add_clamped(&mut self.sale_value, r.sale_value);
    self.clamped |= add_clamped(&mut self.tax_value, r.tax_value);
    self.clamped |= add_clamped(&mut self.invoice_value, r.invoice_value);
    if let Some(rate) = r.tax_rate {
      self.rate_overflow |= add_clamped(&mut self.rate_sum, Some(rate));
      self.rate_count += 1;
    }
  }

  fn finish(self, (month_name, financial_year, product): GroupKey) -> GroupRow {
    if self.clamped || self.rate_overflow {
      warn!(
        month = month_name.as_deref().unwrap_or(""),
        financial_year = financial_year.as_deref().unwrap_or(""),
        product = product.as_deref().unwrap_or(""),
        totals_clamped = self.clamped,
        rate_dropped = self.rate_overflow,
        "group totals out of decimal range"
      );
    }
    // A saturated sum has no meaningful mean.
    let tax_rate = (self.rate_count > 0 && !self.rate_overflow)
      .then(|| (self.rate_sum / Decimal::from(self.rate_count)).round_dp(2));
    GroupRow {
      month_name,
      financial_year,
      product,
      records: self.records,
      quantity: self.quantity.round_dp(2),
      sale_value: self.sale_value.round_dp(2),
      tax_value: self.tax_value.round_dp(2),
      invoice_value: self.invoice_value.round_dp(2),
      tax_rate,
    }
  }
}

/// Filter `records` and group the survivors.
///
/// Records with a null key component form their own groups rather than being
/// dropped, so an empty filter accounts for every record. Output is ordered
/// by key, `None` first.
pub fn summarize(records: &[SaleRecord], filter: &RecordFilter) -> Vec<GroupRow> {
  let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();
  for record in records.iter().filter(|r| filter.matches(r)) {
    let key = (
      record.month_name.clone(),
      record.financial_year.clone(),
      record.product.clone(),
    );
    groups.entry(key).or_default().add(record);
  }
  groups.into_iter().map(|(key, acc)| acc.finish(key)).collect()
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;
  use rust_decimal_macros::dec;

  use super::*;
  use crate::{
    normalize::merge,
    record::Owner,
    table::{Cell, RawTable},
  };

  fn sample() -> Vec<SaleRecord> {
    let t = RawTable::new(
      "sales.csv",
      ["Date", "Product", "Tax Rate", "Qty", "Sale Value", "Tax Value"]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    )
    .with_row(row(["2024-01-10", "Widget", "5", "2", "100", "5"]))
    .with_row(row(["2024-01-20", "widget ", "5", "3", "150", "7.5"]))
    .with_row(row(["2024-05-10", "Gadget", "18", "1", "200", "36"]))
    .with_row(row(["2024-05-11", "Gadget", "12", "4", "50", "6"]))
    .with_row(row(["", "Gizmo", "", "7", "10", ""]));
    merge(&Owner::from("alice"), &[t]).unwrap()
  }

  fn row<const N: usize>(cells: [&str; N]) -> Vec<Cell> {
    cells.iter().map(|c| Cell::from(*c)).collect()
  }

  fn params(f: impl FnOnce(&mut SummaryParams)) -> RecordFilter {
    let mut p = SummaryParams::default();
    f(&mut p);
    p.validate()
  }

  #[test]
  fn empty_filter_covers_every_record() {
    let records = sample();
    let groups = summarize(&records, &RecordFilter::default());

    let grouped: usize = groups.iter().map(|g| g.records).sum();
    assert_eq!(grouped, records.len());

    let qty: Decimal = groups.iter().map(|g| g.quantity).sum();
    let expected: Decimal = records.iter().filter_map(|r| r.quantity).sum();
    assert_eq!(qty, expected);
  }

  #[test]
  fn groups_by_month_year_and_product() {
    let groups = summarize(&sample(), &RecordFilter::default());
    // Null-keyed Gizmo row sorts first; "widget " trims to its own product key.
    let keys: Vec<_> = groups
      .iter()
      .map(|g| (g.month_name.as_deref(), g.product.as_deref()))
      .collect();
    assert_eq!(keys, [
      (None, Some("Gizmo")),
      (Some("January"), Some("Widget")),
      (Some("January"), Some("widget")),
      (Some("May"), Some("Gadget")),
    ]);

    let may = &groups[3];
    assert_eq!(may.records, 2);
    assert_eq!(may.quantity, dec!(5));
    assert_eq!(may.sale_value, dec!(250));
    assert_eq!(may.invoice_value, dec!(292));
    assert_eq!(may.tax_rate, Some(dec!(15)));
  }

  #[test]
  fn all_null_rates_average_to_none() {
    let groups = summarize(&sample(), &params(|p| p.product = Some("gizmo".into())));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].tax_rate, None);
    assert_eq!(groups[0].tax_value, dec!(0));
    assert_eq!(groups[0].invoice_value, dec!(0));
  }

  #[test]
  fn month_and_product_match_case_insensitively() {
    let groups = summarize(
      &sample(),
      &params(|p| {
        p.month = Some("  JANUARY ".into());
        p.product = Some("WIDGET".into());
      }),
    );
    assert_eq!(groups.len(), 2);
    let sale: Decimal = groups.iter().map(|g| g.sale_value).sum();
    assert_eq!(sale, dec!(250));
  }

  #[test]
  fn financial_year_filter() {
    let groups =
      summarize(&sample(), &params(|p| p.financial_year = Some(" 2024-2025".into())));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].product.as_deref(), Some("Gadget"));
  }

  #[test]
  fn tax_rate_filter_is_numeric() {
    let groups = summarize(&sample(), &params(|p| p.tax_rate = Some("18.0".into())));
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].records, 1);
    assert_eq!(groups[0].sale_value, dec!(200));
  }

  #[test]
  fn malformed_tax_rate_is_ignored() {
    let records = sample();
    let filter = params(|p| p.tax_rate = Some("abc".into()));
    assert!(filter.is_empty());
    assert_eq!(
      summarize(&records, &filter),
      summarize(&records, &RecordFilter::default())
    );
  }

  #[test]
  fn blank_options_impose_no_constraint() {
    let filter = params(|p| {
      p.month = Some("   ".into());
      p.product = Some(String::new());
    });
    assert!(filter.is_empty());
  }

  #[test]
  fn no_matches_is_an_empty_summary() {
    let groups = summarize(&sample(), &params(|p| p.month = Some("December".into())));
    assert!(groups.is_empty());
    assert!(summarize(&[], &RecordFilter::default()).is_empty());
  }

  #[test]
  fn outputs_round_to_two_places() {
    let mut a = SaleRecord::empty(Owner::from("alice"));
    a.transaction_date = NaiveDate::from_ymd_opt(2024, 6, 1);
    a.month_name = Some("June".into());
    a.financial_year = Some("2024-2025".into());
    a.quantity = Some(dec!(1.005));
    a.tax_rate = Some(dec!(5));
    let mut b = a.clone();
    b.quantity = Some(dec!(1.001));
    b.tax_rate = Some(dec!(12));
    let mut c = a.clone();
    c.tax_rate = Some(dec!(12));

    let groups = summarize(&[a, b, c], &RecordFilter::default());
    assert_eq!(groups[0].quantity, dec!(3.01));
    assert_eq!(groups[0].tax_rate, Some(dec!(9.67)));
  }

  #[test]
  fn totals_beyond_the_decimal_range_are_clamped() {
    let huge = "79228162514264337593543950335";
    let t = RawTable::new(
      "sales.csv",
      ["Product", "Tax Rate", "Sale Value"]
        .iter()
        .map(|c| c.to_string())
        .collect(),
    )
    .with_row(row(["Widget", huge, huge]))
    .with_row(row(["Widget", huge, huge]));
    let records = merge(&Owner::from("alice"), &[t]).unwrap();

    let groups = summarize(&records, &RecordFilter::default());
    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].records, 2);
    assert_eq!(groups[0].sale_value, Decimal::MAX);
    assert_eq!(groups[0].tax_rate, None);

    let negative = vec![SaleRecord { sale_value: Some(Decimal::MIN), ..records[0].clone() }; 2];
    assert_eq!(summarize(&negative, &RecordFilter::default())[0].sale_value, Decimal::MIN);
  }
}
