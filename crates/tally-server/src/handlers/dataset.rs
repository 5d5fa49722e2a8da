//! Handlers that act on the caller's canonical dataset.
//!
//! | Method   | Path                        | Notes                                  |
//! |----------|-----------------------------|----------------------------------------|
//! | `POST`   | `/merge`                    | Staged files → new set; 404 if none    |
//! | `GET`    | `/preview[?limit=N]`        | First N records; 404 if no set         |
//! | `GET`    | `/export[?format=xlsx\|csv]` | Attachment download; 404 if no set     |
//! | `DELETE` | `/reset`                    | Drops the set and all staged files     |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
  http::header,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use tally_core::{SaleRecord, store::RecordStore};
use tally_ingest::write::{write_csv, write_xlsx};
use tracing::info;

use crate::{AppState, auth::Authenticated, error::ApiError, handlers::blocking};

// ─── Merge ────────────────────────────────────────────────────────────────────

/// `POST /merge`
pub async fn merge<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> Result<Json<Value>, ApiError>
where
  S: RecordStore + 'static,
{
  // Held from reading the staged files until the new set is stored, so a
  // concurrent reset cannot clear the files in between.
  let guard = state.ledger.lock(&owner).await;

  let uploads = Arc::clone(&state.uploads);
  let who = owner.clone();
  let tables = blocking(move || uploads.load_tables(&who)).await?;

  let records = state.ledger.merge_locked(&guard, &tables).await?;
  let merged_at = state.ledger.info(&owner).await?.map(|i| i.merged_at);
  drop(guard);

  Ok(Json(json!({ "records": records, "merged_at": merged_at })))
}

// ─── Preview ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
  pub limit: Option<usize>,
}

/// `GET /preview[?limit=N]`
pub async fn preview<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Query(params): Query<PreviewParams>,
) -> Result<Json<Vec<SaleRecord>>, ApiError>
where
  S: RecordStore + 'static,
{
  let limit = params.limit.unwrap_or(state.config.preview_limit);
  let records = state.ledger.preview(&owner, limit).await?;
  Ok(Json(records))
}

// ─── Export ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExportParams {
  pub format: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ExportFormat {
  Xlsx,
  Csv,
}

impl ExportFormat {
  fn parse(raw: Option<&str>) -> Result<Self, ApiError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
      None | Some("") | Some("xlsx") => Ok(Self::Xlsx),
      Some("csv") => Ok(Self::Csv),
      Some(other) => Err(ApiError::BadRequest(format!("unknown export format {other:?}"))),
    }
  }

  fn extension(self) -> &'static str {
    match self {
      Self::Xlsx => "xlsx",
      Self::Csv => "csv",
    }
  }

  fn content_type(self) -> &'static str {
    match self {
      Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
      Self::Csv => "text/csv; charset=utf-8",
    }
  }
}

/// `GET /export[?format=xlsx|csv]`
pub async fn export<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Query(params): Query<ExportParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + 'static,
{
  let format = ExportFormat::parse(params.format.as_deref())?;
  let records = state.ledger.export(&owner).await?;

  let bytes = blocking(move || match format {
    ExportFormat::Xlsx => write_xlsx(&records),
    ExportFormat::Csv => write_csv(&records),
  })
  .await?;

  let disposition = format!("attachment; filename=\"{owner}_merged.{}\"", format.extension());
  Ok((
    [
      (header::CONTENT_TYPE, format.content_type().to_owned()),
      (header::CONTENT_DISPOSITION, disposition),
    ],
    bytes,
  ))
}

// ─── Reset ────────────────────────────────────────────────────────────────────

/// `DELETE /reset`
pub async fn reset<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> Result<Json<Value>, ApiError>
where
  S: RecordStore + 'static,
{
  let guard = state.ledger.lock(&owner).await;
  let removed = state.ledger.reset_locked(&guard).await?;

  let uploads = Arc::clone(&state.uploads);
  let who = owner.clone();
  blocking(move || uploads.clear(&who)).await?;
  drop(guard);

  info!(owner = %owner, removed, "reset requested");
  Ok(Json(json!({
    "message": format!("all data for {owner} has been reset"),
    "removed": removed,
  })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn export_format_defaults_to_xlsx() {
    assert_eq!(ExportFormat::parse(None).unwrap(), ExportFormat::Xlsx);
    assert_eq!(ExportFormat::parse(Some(" CSV ")).unwrap(), ExportFormat::Csv);
    assert!(matches!(ExportFormat::parse(Some("pdf")), Err(ApiError::BadRequest(_))));
  }
}
