//! HTTP Basic-auth extractor. The authenticated username is the request's
//! [`Owner`].

use std::collections::HashMap;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use tally_core::{Owner, store::RecordStore};

use crate::{AppState, UserConfig, error::ApiError};

/// Accepted credentials: username → argon2 PHC string.
#[derive(Clone, Default)]
pub struct AuthConfig {
  users: HashMap<String, String>,
}

impl AuthConfig {
  pub fn from_users(users: &[UserConfig]) -> Self {
    Self {
      users: users
        .iter()
        .map(|u| (u.username.clone(), u.password_hash.clone()))
        .collect(),
    }
  }
}

/// Present in a handler's arguments means the request was authenticated as
/// the wrapped owner.
pub struct Authenticated(pub Owner);

pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<Owner, ApiError> {
  let encoded = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Basic "))
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let hash = config.users.get(username).ok_or(ApiError::Unauthorized)?;
  let parsed = PasswordHash::new(hash).map_err(|_| ApiError::Unauthorized)?;
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(Owner::from(username))
}

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: RecordStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(parts: &mut Parts, state: &AppState<S>) -> Result<Self, Self::Rejection> {
    verify_auth(&parts.headers, &state.auth).map(Authenticated)
  }
}

#[cfg(test)]
mod tests {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use axum::http::HeaderValue;
  use base64::Engine as _;
  use rand_core::OsRng;

  use super::*;

  fn config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig::from_users(&[
      UserConfig { username: "alice".into(), password_hash: hash.clone() },
      UserConfig { username: "bob".into(), password_hash: hash },
    ])
  }

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  fn basic(user: &str, pass: &str) -> String { format!("Basic {}", B64.encode(format!("{user}:{pass}"))) }

  #[test]
  fn username_becomes_owner() {
    let cfg = config("secret");
    assert_eq!(verify_auth(&headers(&basic("alice", "secret")), &cfg).unwrap(), Owner::from("alice"));
    assert_eq!(verify_auth(&headers(&basic("bob", "secret")), &cfg).unwrap(), Owner::from("bob"));
  }

  #[test]
  fn rejects_bad_credentials() {
    let cfg = config("secret");
    for value in [
      basic("alice", "wrong"),
      basic("mallory", "secret"),
      "Basic !!!not-base64!!!".to_owned(),
      "Bearer abc".to_owned(),
    ] {
      assert!(matches!(verify_auth(&headers(&value), &cfg), Err(ApiError::Unauthorized)), "{value}");
    }
    assert!(matches!(verify_auth(&HeaderMap::new(), &cfg), Err(ApiError::Unauthorized)));
  }
}
