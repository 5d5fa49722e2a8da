//! `GET /summary`: grouped totals over the caller's merged set.
//!
//! Query options `month`, `financial_year`, `product` and `tax_rate` are all
//! optional; blank or unparseable values are ignored.

use axum::{
  Json,
  extract::{Query, State},
};
use tally_core::{
  aggregate::{GroupRow, SummaryParams},
  store::RecordStore,
};

use crate::{AppState, auth::Authenticated, error::ApiError};

pub async fn handler<S>(
  State(state): State<AppState<S>>,
  Authenticated(owner): Authenticated,
  Query(params): Query<SummaryParams>,
) -> Result<Json<Vec<GroupRow>>, ApiError>
where
  S: RecordStore + 'static,
{
  let rows = state.ledger.summarize(&owner, &params).await?;
  Ok(Json(rows))
}
