//! [`SqliteStore`], the SQLite implementation of [`RecordStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use tally_core::{DatasetInfo, Owner, SaleRecord, store::RecordStore};
use tracing::debug;

use crate::{
  Result,
  encode::{RECORD_COLUMNS, RawDataset, RawRecord, encode_dt},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Tally record store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// run sequentially on the connection's thread and `replace` runs inside one
/// transaction, so a reader never observes a half-written set.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Records for `owner` in `seq` order, at most `limit` of them. `None`
  /// when the owner has no dataset row.
  async fn select_records(&self, owner: &Owner, limit: Option<usize>) -> Result<Option<Vec<SaleRecord>>> {
    let owner_str = owner.as_str().to_owned();
    // SQLite treats a negative LIMIT as unbounded.
    let limit_val = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));

    let raws: Option<Vec<RawRecord>> = self
      .conn
      .call(move |conn| {
        let exists = conn
          .query_row(
            "SELECT 1 FROM datasets WHERE owner = ?1",
            rusqlite::params![owner_str],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM sale_records
           WHERE owner = ?1
           ORDER BY seq
           LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![owner_str, limit_val], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(Some(rows))
      })
      .await?;

    raws
      .map(|raws| raws.into_iter().map(|raw| raw.into_record(owner)).collect())
      .transpose()
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for SqliteStore {
  type Error = crate::Error;

  async fn get<'a>(&'a self, owner: &'a Owner) -> Result<Option<Vec<SaleRecord>>> {
    self.select_records(owner, None).await
  }

  async fn head<'a>(&'a self, owner: &'a Owner, limit: usize) -> Result<Option<Vec<SaleRecord>>> {
    self.select_records(owner, Some(limit)).await
  }

  async fn replace<'a>(&'a self, owner: &'a Owner, records: Vec<SaleRecord>) -> Result<DatasetInfo> {
    let info = DatasetInfo {
      owner:        owner.clone(),
      merged_at:    Utc::now(),
      record_count: records.len(),
    };

    let owner_str = owner.as_str().to_owned();
    let at_str    = encode_dt(info.merged_at);
    let count     = i64::try_from(records.len()).unwrap_or(i64::MAX);
    let raws: Vec<RawRecord> = records.iter().map(RawRecord::from_record).collect();

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Cascades to sale_records.
        tx.execute("DELETE FROM datasets WHERE owner = ?1", rusqlite::params![owner_str])?;
        tx.execute(
          "INSERT INTO datasets (owner, merged_at, record_count) VALUES (?1, ?2, ?3)",
          rusqlite::params![owner_str, at_str, count],
        )?;
        {
          let mut stmt = tx.prepare(&format!(
            "INSERT INTO sale_records (owner, seq, {RECORD_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
          ))?;
          for (seq, r) in raws.iter().enumerate() {
            stmt.execute(rusqlite::params![
              owner_str,
              seq as i64,
              r.customer_code,
              r.customer_name,
              r.customer_place,
              r.location_of_supply,
              r.transaction_date,
              r.product,
              r.tax_rate,
              r.quantity,
              r.unit_of_quantity,
              r.sale_value,
              r.tax_value,
              r.invoice_value,
              r.month_name,
              r.calendar_year,
              r.financial_year,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;

    debug!(owner = %owner, records = info.record_count, "replaced dataset");
    Ok(info)
  }

  async fn delete<'a>(&'a self, owner: &'a Owner) -> Result<bool> {
    let owner_str = owner.as_str().to_owned();
    let removed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM datasets WHERE owner = ?1", rusqlite::params![owner_str])?)
      })
      .await?;
    Ok(removed > 0)
  }

  async fn info<'a>(&'a self, owner: &'a Owner) -> Result<Option<DatasetInfo>> {
    let owner_str = owner.as_str().to_owned();
    let raw: Option<RawDataset> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT owner, merged_at, record_count FROM datasets WHERE owner = ?1",
              rusqlite::params![owner_str],
              |row| {
                Ok(RawDataset {
                  owner:        row.get(0)?,
                  merged_at:    row.get(1)?,
                  record_count: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawDataset::into_info).transpose()
  }
}
