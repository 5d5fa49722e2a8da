//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// An error returned by a handler. Every variant renders as
/// `{"error": "<message>"}` with the matching status code.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  /// An upload was accepted but its content cannot be decoded.
  #[error("{0}")]
  Unprocessable(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<tally_core::Error> for ApiError {
  fn from(e: tally_core::Error) -> Self {
    match e {
      tally_core::Error::NoInputData(_) | tally_core::Error::NotFound(_) => {
        Self::NotFound(e.to_string())
      }
      tally_core::Error::Store(inner) => Self::Internal(inner),
    }
  }
}

impl From<tally_ingest::Error> for ApiError {
  fn from(e: tally_ingest::Error) -> Self {
    use tally_ingest::Error as E;
    match e {
      E::InvalidName(_) | E::UnsupportedFormat(_) => Self::BadRequest(e.to_string()),
      e if e.is_bad_input() => Self::Unprocessable(e.to_string()),
      e => Self::Internal(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = match &self {
      ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
      ApiError::NotFound(_) => StatusCode::NOT_FOUND,
      ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
      ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
      ApiError::Internal(e) => {
        error!(error = %e, "request failed");
        StatusCode::INTERNAL_SERVER_ERROR
      }
    };

    let mut res = (status, Json(json!({ "error": self.to_string() }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"tally\""),
      );
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use tally_core::Owner;

  use super::*;

  #[test]
  fn core_errors_map_to_404_and_500() {
    let missing = ApiError::from(tally_core::Error::NoInputData(Owner::from("alice")));
    assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);

    let io = std::io::Error::other("disk on fire");
    let store = ApiError::from(tally_core::Error::Store(Box::new(io)));
    assert_eq!(store.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn ingest_errors_split_by_cause() {
    let bad_name = ApiError::from(tally_ingest::Error::UnsupportedFormat("a.txt".into()));
    assert_eq!(bad_name.into_response().status(), StatusCode::BAD_REQUEST);

    let bad_file = ApiError::from(tally_ingest::Error::File {
      file:   "a.xlsx".into(),
      source: Box::new(tally_ingest::Error::EmptyWorkbook("a.xlsx".into())),
    });
    assert_eq!(bad_file.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);

    let io = ApiError::from(tally_ingest::Error::Io(std::io::Error::other("full")));
    assert_eq!(io.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
  }

  #[test]
  fn unauthorized_carries_challenge() {
    let res = ApiError::Unauthorized.into_response();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key(header::WWW_AUTHENTICATE));
  }
}
