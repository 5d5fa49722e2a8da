//! [`Ledger`], the per-owner service that ties the normaliser and the
//! aggregator to a [`RecordStore`].
//!
//! Merges build the complete new record set before touching the store and
//! then hand it to [`RecordStore::replace`] in one call. `merge` and `reset`
//! for the same owner are serialised by a per-owner lock; different owners
//! never wait on each other. Reads take no lock and rely on the store's
//! atomic replace.
//!
//! Callers that do their own work as part of a merge or reset (reading or
//! clearing staged uploads) take the lock with [`Ledger::lock`] and pass the
//! [`OwnerGuard`] to [`Ledger::merge_locked`] / [`Ledger::reset_locked`].

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::info;

use crate::{
  Error, Result,
  aggregate::{GroupRow, SummaryParams, summarize},
  normalize,
  record::{DatasetInfo, Owner, SaleRecord},
  store::RecordStore,
  table::RawTable,
};

type LockMap = Arc<DashMap<Owner, Arc<Mutex<()>>>>;

pub struct Ledger<S> {
  store: Arc<S>,
  /// Entries exist only while some task holds or waits for the owner's lock.
  locks: LockMap,
}

/// Exclusive right to mutate one owner's dataset. Dropping it releases the
/// lock and prunes the owner's entry once nobody else is waiting.
pub struct OwnerGuard {
  owner: Owner,
  guard: Option<OwnedMutexGuard<()>>,
  locks: LockMap,
}

impl OwnerGuard {
  pub fn owner(&self) -> &Owner { &self.owner }
}

impl Drop for OwnerGuard {
  fn drop(&mut self) {
    drop(self.guard.take());
    // The map's shard lock is held during the check, so no new waiter can
    // clone the mutex between the count and the removal.
    self
      .locks
      .remove_if(&self.owner, |_, m| Arc::strong_count(m) == 1);
  }
}

impl<S: RecordStore> Ledger<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store, locks: Arc::default() } }

  /// Wait for exclusive access to `owner`'s dataset.
  pub async fn lock(&self, owner: &Owner) -> OwnerGuard {
    let mutex = Arc::clone(self.locks.entry(owner.clone()).or_default().value());
    OwnerGuard {
      owner: owner.clone(),
      guard: Some(mutex.lock_owned().await),
      locks: Arc::clone(&self.locks),
    }
  }

  /// Normalise `tables` and replace the owner's canonical set with the
  /// result. Returns the number of records written.
  pub async fn merge(&self, owner: &Owner, tables: &[RawTable]) -> Result<usize> {
    let guard = self.lock(owner).await;
    self.merge_locked(&guard, tables).await
  }

  /// [`Ledger::merge`] for a caller already holding the owner's lock.
  pub async fn merge_locked(&self, guard: &OwnerGuard, tables: &[RawTable]) -> Result<usize> {
    let owner = guard.owner();
    let staged = normalize::merge(owner, tables)?;
    let info = self
      .store
      .replace(owner, staged)
      .await
      .map_err(Error::store)?;

    info!(
      owner = %owner,
      tables = tables.len(),
      records = info.record_count,
      "merged dataset"
    );
    Ok(info.record_count)
  }

  /// Grouped summary of the owner's set under `params`. An owner with no
  /// set, or a filter that matches nothing, yields an empty summary.
  pub async fn summarize(&self, owner: &Owner, params: &SummaryParams) -> Result<Vec<GroupRow>> {
    let filter = params.validate();
    let records = self
      .store
      .get(owner)
      .await
      .map_err(Error::store)?
      .unwrap_or_default();
    Ok(summarize(&records, &filter))
  }

  /// The first `limit` records in merge order.
  pub async fn preview(&self, owner: &Owner, limit: usize) -> Result<Vec<SaleRecord>> {
    self
      .store
      .head(owner, limit)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(owner.clone()))
  }

  /// The owner's complete set in merge order.
  pub async fn export(&self, owner: &Owner) -> Result<Vec<SaleRecord>> {
    self
      .store
      .get(owner)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| Error::NotFound(owner.clone()))
  }

  pub async fn info(&self, owner: &Owner) -> Result<Option<DatasetInfo>> {
    self.store.info(owner).await.map_err(Error::store)
  }

  /// Drop the owner's canonical set. Returns `false` if there was none.
  pub async fn reset(&self, owner: &Owner) -> Result<bool> {
    let guard = self.lock(owner).await;
    self.reset_locked(&guard).await
  }

  /// [`Ledger::reset`] for a caller already holding the owner's lock.
  pub async fn reset_locked(&self, guard: &OwnerGuard) -> Result<bool> {
    let owner = guard.owner();
    let removed = self.store.delete(owner).await.map_err(Error::store)?;
    info!(owner = %owner, removed, "reset dataset");
    Ok(removed)
  }
}
