//! Route handlers, one module per resource.

pub mod dataset;
pub mod summary;
pub mod uploads;

use crate::error::ApiError;

/// Run synchronous file work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
  F: FnOnce() -> tally_ingest::Result<T> + Send + 'static,
  T: Send + 'static,
{
  tokio::task::spawn_blocking(f)
    .await
    .map_err(|e| ApiError::Internal(Box::new(e)))?
    .map_err(ApiError::from)
}
