//! Handlers for `/uploads` endpoints.
//!
//! | Method   | Path                     | Notes                          |
//! |----------|--------------------------|--------------------------------|
//! | `GET`    | `/uploads`               | Staged files, merge order      |
//! | `PUT`    | `/uploads/{file_name}`   | Body: raw file bytes → 201     |
//! | `DELETE` | `/uploads/{stored_name}` | 204, or 404 if not staged      |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use bytes::Bytes;
use tally_core::store::RecordStore;
use tally_ingest::StagedFile;

use crate::{AppState, auth::Authenticated, error::ApiError, handlers::blocking};

/// `GET /uploads`
pub async fn list<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
) -> Result<Json<Vec<StagedFile>>, ApiError>
where
  S: RecordStore + 'static,
{
  let uploads = Arc::clone(&state.uploads);
  let files = blocking(move || uploads.list(&owner)).await?;
  Ok(Json(files))
}

/// `PUT /uploads/{file_name}`
pub async fn save<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(file_name): Path<String>,
  body: Bytes,
) -> Result<impl IntoResponse, ApiError>
where
  S: RecordStore + 'static,
{
  if body.is_empty() {
    return Err(ApiError::BadRequest(format!("upload {file_name:?} is empty")));
  }
  let uploads = Arc::clone(&state.uploads);
  let staged = blocking(move || uploads.save(&owner, &file_name, &body)).await?;
  Ok((StatusCode::CREATED, Json(staged)))
}

/// `DELETE /uploads/{stored_name}`
pub async fn remove<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Path(stored_name): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: RecordStore + 'static,
{
  let uploads = Arc::clone(&state.uploads);
  let name = stored_name.clone();
  if blocking(move || uploads.remove(&owner, &name)).await? {
    Ok(StatusCode::NO_CONTENT)
  } else {
    Err(ApiError::NotFound(format!("no staged file {stored_name:?}")))
  }
}
