//! HTTP surface for Tally.
//!
//! Exposes an axum [`Router`] backed by any [`RecordStore`]. Every route
//! requires HTTP Basic auth; the authenticated username is the owner whose
//! uploads and dataset the request acts on.

pub mod auth;
pub mod error;
pub mod handlers;

pub use error::ApiError;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{delete, get, post, put},
};
use serde::Deserialize;
use tally_core::{Ledger, store::RecordStore};
use tally_ingest::UploadDir;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;
use handlers::{dataset, summary, uploads};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `TALLY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:             String,
  pub port:             u16,
  pub store_path:       PathBuf,
  pub upload_dir:       PathBuf,
  /// Records returned by `GET /preview` when no `limit` is given.
  #[serde(default = "default_preview_limit")]
  pub preview_limit:    usize,
  #[serde(default = "default_max_upload_bytes")]
  pub max_upload_bytes: usize,
  #[serde(default)]
  pub users:            Vec<UserConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

fn default_preview_limit() -> usize { 100 }

fn default_max_upload_bytes() -> usize { 32 * 1024 * 1024 }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S> {
  pub ledger:  Arc<Ledger<S>>,
  pub uploads: Arc<UploadDir>,
  pub auth:    Arc<AuthConfig>,
  pub config:  Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      ledger:  Arc::clone(&self.ledger),
      uploads: Arc::clone(&self.uploads),
      auth:    Arc::clone(&self.auth),
      config:  Arc::clone(&self.config),
    }
  }
}

impl<S: RecordStore> AppState<S> {
  pub fn new(store: S, config: ServerConfig) -> Self {
    Self {
      ledger:  Arc::new(Ledger::new(Arc::new(store))),
      uploads: Arc::new(UploadDir::new(config.upload_dir.clone())),
      auth:    Arc::new(AuthConfig::from_users(&config.users)),
      config:  Arc::new(config),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the Tally [`Router`].
pub fn router<S>(state: AppState<S>) -> Router
where
  S: RecordStore + 'static,
{
  let body_limit = state.config.max_upload_bytes;
  Router::new()
    // Staging
    .route("/uploads",             get(uploads::list::<S>))
    .route("/uploads/{name}",      put(uploads::save::<S>).delete(uploads::remove::<S>))
    // Dataset
    .route("/merge",               post(dataset::merge::<S>))
    .route("/preview",             get(dataset::preview::<S>))
    .route("/summary",             get(summary::handler::<S>))
    .route("/export",              get(dataset::export::<S>))
    .route("/reset",               delete(dataset::reset::<S>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(TraceLayer::new_for_http())
    .with_state(state)
}

// ─── Integration tests ────────────────────────────────────────────────────────
