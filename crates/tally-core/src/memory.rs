//! [`MemoryStore`], an in-process [`RecordStore`].
//!
//! Each owner's set sits behind an `Arc`; `replace` builds the new set off to
//! the side and swaps the pointer in a single map insert, so readers holding
//! the old `Arc` keep a consistent snapshot.

use std::{convert::Infallible, sync::Arc};

use chrono::Utc;
use dashmap::DashMap;

use crate::{
  record::{DatasetInfo, Owner, SaleRecord},
  store::RecordStore,
};

struct Dataset {
  info:    DatasetInfo,
  records: Vec<SaleRecord>,
}

/// A [`RecordStore`] held entirely in memory.
///
/// Cloning is cheap; clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
  sets: Arc<DashMap<Owner, Arc<Dataset>>>,
}

impl MemoryStore {
  pub fn new() -> Self { Self::default() }

  fn snapshot(&self, owner: &Owner) -> Option<Arc<Dataset>> {
    self.sets.get(owner).map(|entry| Arc::clone(entry.value()))
  }
}

impl RecordStore for MemoryStore {
  type Error = Infallible;

  async fn get<'a>(&'a self, owner: &'a Owner) -> Result<Option<Vec<SaleRecord>>, Infallible> {
    Ok(self.snapshot(owner).map(|ds| ds.records.clone()))
  }

  async fn head<'a>(
    &'a self,
    owner: &'a Owner,
    limit: usize,
  ) -> Result<Option<Vec<SaleRecord>>, Infallible> {
    Ok(
      self
        .snapshot(owner)
        .map(|ds| ds.records.iter().take(limit).cloned().collect()),
    )
  }

  async fn replace<'a>(
    &'a self,
    owner: &'a Owner,
    records: Vec<SaleRecord>,
  ) -> Result<DatasetInfo, Infallible> {
    let info = DatasetInfo {
      owner:        owner.clone(),
      merged_at:    Utc::now(),
      record_count: records.len(),
    };
    let dataset = Arc::new(Dataset { info: info.clone(), records });
    self.sets.insert(owner.clone(), dataset);
    Ok(info)
  }

  async fn delete<'a>(&'a self, owner: &'a Owner) -> Result<bool, Infallible> {
    Ok(self.sets.remove(owner).is_some())
  }

  async fn info<'a>(&'a self, owner: &'a Owner) -> Result<Option<DatasetInfo>, Infallible> {
    Ok(self.snapshot(owner).map(|ds| ds.info.clone()))
  }
}
