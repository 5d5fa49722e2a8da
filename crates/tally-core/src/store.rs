//! The `RecordStore` trait: where canonical record sets live.
//!
//! Implemented by [`crate::memory::MemoryStore`] and by
//! `tally-store-sqlite`. The [`crate::ledger::Ledger`] depends on this
//! abstraction only.

use std::future::Future;

use crate::record::{DatasetInfo, Owner, SaleRecord};

/// A mapping from owner to that owner's canonical record set.
///
/// A set, once written, is only ever replaced whole or deleted. Readers must
/// observe either the complete previous set or the complete new one, never a
/// mixture.
///
/// All methods return `Send` futures so stores can be shared across a
/// multi-threaded runtime.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The owner's full record set in merge order, or `None` if nothing has
  /// been merged since the last reset.
  fn get<'a>(
    &'a self,
    owner: &'a Owner,
  ) -> impl Future<Output = Result<Option<Vec<SaleRecord>>, Self::Error>> + Send + 'a;

  /// The first `limit` records in merge order, or `None` if no set exists.
  fn head<'a>(
    &'a self,
    owner: &'a Owner,
    limit: usize,
  ) -> impl Future<Output = Result<Option<Vec<SaleRecord>>, Self::Error>> + Send + 'a;

  /// Atomically replace the owner's set with `records`.
  fn replace<'a>(
    &'a self,
    owner: &'a Owner,
    records: Vec<SaleRecord>,
  ) -> impl Future<Output = Result<DatasetInfo, Self::Error>> + Send + 'a;

  /// Remove the owner's set. Returns `false` if there was none.
  fn delete<'a>(
    &'a self,
    owner: &'a Owner,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + 'a;

  /// Metadata for the owner's current set.
  fn info<'a>(
    &'a self,
    owner: &'a Owner,
  ) -> impl Future<Output = Result<Option<DatasetInfo>, Self::Error>> + Send + 'a;
}
