//! API-key verification and the anonymous sign-in endpoint.
//!
//! Clients hold a project id plus an API key. The key travels in the
//! `x-api-key` header and is checked against an argon2 PHC hash from the
//! server configuration. Data requests must also name a collection this
//! server hosts.

use std::sync::Arc;

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
  password_hash::{self, SaltString},
};
use axum::{
  Json,
  extract::{Request, State},
  http::HeaderMap,
  middleware::Next,
  response::Response,
};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Credentials and switches for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub project_id:     String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub api_key_hash:   String,
  pub anonymous_auth: bool,
  /// App ids whose profile collections are served.
  pub app_ids:        Vec<String>,
}

impl AuthConfig {
  pub fn hosts(&self, app_id: &str) -> bool { self.app_ids.iter().any(|a| a == app_id) }
}

/// Argon2 PHC string for a client API key, for `api_key_hash`.
pub fn hash_api_key(key: &str) -> Result<String, password_hash::Error> {
  let salt = SaltString::generate(&mut OsRng);
  Ok(Argon2::default().hash_password(key.as_bytes(), &salt)?.to_string())
}

/// The `{app_id}` segment of `…/artifacts/{app_id}/…`, if the path has one.
fn requested_app_id(path: &str) -> Option<&str> {
  path
    .split('/')
    .skip_while(|segment| *segment != "artifacts")
    .nth(1)
    .filter(|app_id| !app_id.is_empty())
}

/// Check the `x-api-key` header against the configured hash.
pub fn verify_api_key(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Error> {
  let key = headers
    .get(API_KEY_HEADER)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::ApiKeyNotValid)?;

  let parsed_hash = PasswordHash::new(&config.api_key_hash).map_err(|_| Error::ApiKeyNotValid)?;

  Argon2::default()
    .verify_password(key.as_bytes(), &parsed_hash)
    .map_err(|_| Error::ApiKeyNotValid)
}

/// Middleware guarding the data API. A request without a valid key, or for a
/// collection this server does not host, is `permission-denied`.
pub async fn require_api_key(
  State(auth): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Result<Response, Error> {
  if verify_api_key(req.headers(), &auth).is_err() {
    tracing::warn!(uri = %req.uri(), "rejected request without a valid api key");
    return Err(Error::PermissionDenied);
  }
  if let Some(app_id) = requested_app_id(req.uri().path())
    && !auth.hosts(app_id)
  {
    tracing::warn!(app_id, "rejected request for a collection this server does not host");
    return Err(Error::PermissionDenied);
  }
  Ok(next.run(req).await)
}

// ─── Anonymous sign-in ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInBody {
  pub project_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignInResponse {
  pub uid: String,
}

/// `POST /auth/anonymous`, body: `{"projectId":"…"}`
pub async fn anonymous_sign_in(
  State(auth): State<Arc<AuthConfig>>,
  headers: HeaderMap,
  Json(body): Json<SignInBody>,
) -> Result<Json<SignInResponse>, Error> {
  verify_api_key(&headers, &auth)?;
  if body.project_id != auth.project_id {
    return Err(Error::ConfigurationNotFound);
  }
  if !auth.anonymous_auth {
    return Err(Error::OperationNotAllowed);
  }

  let uid = Uuid::new_v4().simple().to_string();
  tracing::info!(%uid, "anonymous sign-in");
  Ok(Json(SignInResponse { uid }))
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn make_config(key: &str) -> AuthConfig {
    AuthConfig {
      project_id:     "family".to_string(),
      api_key_hash:   hash_api_key(key).unwrap(),
      anonymous_auth: true,
      app_ids:        vec!["FamilyShidduchDB".to_string()],
    }
  }

  fn headers_with(key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(API_KEY_HEADER, HeaderValue::from_str(key).unwrap());
    headers
  }

  #[test]
  fn valid_key_passes() {
    let config = make_config("sekrit");
    assert_eq!(verify_api_key(&headers_with("sekrit"), &config), Ok(()));
  }

  #[test]
  fn wrong_key_fails() {
    let config = make_config("sekrit");
    assert_eq!(
      verify_api_key(&headers_with("guess"), &config),
      Err(Error::ApiKeyNotValid)
    );
  }

  #[test]
  fn missing_header_fails() {
    let config = make_config("sekrit");
    assert_eq!(
      verify_api_key(&HeaderMap::new(), &config),
      Err(Error::ApiKeyNotValid)
    );
  }

  #[test]
  fn malformed_hash_fails_closed() {
    let config = AuthConfig {
      project_id:     "family".into(),
      api_key_hash:   "not-a-phc-string".into(),
      anonymous_auth: true,
      app_ids:        Vec::new(),
    };
    assert_eq!(
      verify_api_key(&headers_with("anything"), &config),
      Err(Error::ApiKeyNotValid)
    );
  }

  #[test]
  fn app_id_is_read_from_collection_paths() {
    assert_eq!(
      requested_app_id("/artifacts/FamilyShidduchDB/public/data/profiles"),
      Some("FamilyShidduchDB")
    );
    assert_eq!(
      requested_app_id("/api/artifacts/other/public/data/profiles/p1/matches"),
      Some("other")
    );
    assert_eq!(requested_app_id("/auth/anonymous"), None);
    assert_eq!(requested_app_id("/artifacts/"), None);
  }

  #[test]
  fn hashed_keys_verify_and_salts_differ() {
    let first = hash_api_key("sekrit").unwrap();
    let second = hash_api_key("sekrit").unwrap();
    assert_ne!(first, second);
    assert!(first.starts_with("$argon2"));

    let config = AuthConfig { api_key_hash: second, ..make_config("unused") };
    assert_eq!(verify_api_key(&headers_with("sekrit"), &config), Ok(()));
  }
}
