//! Error types and axum `IntoResponse` implementation.
//!
//! Identity errors carry the provider-style codes clients match on
//! (`auth/api-key-not-valid` and friends). [`ConfigError`] covers startup.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
  /// A data request arrived without a valid API key.
  #[error("permission-denied")]
  PermissionDenied,

  #[error("auth/api-key-not-valid")]
  ApiKeyNotValid,

  /// Anonymous sign-in is switched off for this deployment.
  #[error("auth/operation-not-allowed")]
  OperationNotAllowed,

  /// The sign-in named a project this server does not host.
  #[error("auth/configuration-not-found")]
  ConfigurationNotFound,
}

impl Error {
  pub fn code(&self) -> &'static str {
    match self {
      Error::PermissionDenied => "permission-denied",
      Error::ApiKeyNotValid => "auth/api-key-not-valid",
      Error::OperationNotAllowed => "auth/operation-not-allowed",
      Error::ConfigurationNotFound => "auth/configuration-not-found",
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Error::PermissionDenied => StatusCode::FORBIDDEN,
      Error::ApiKeyNotValid | Error::OperationNotAllowed => StatusCode::BAD_REQUEST,
      Error::ConfigurationNotFound => StatusCode::NOT_FOUND,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    (self.status(), Json(json!({ "error": self.code() }))).into_response()
  }
}

/// Problems with the server configuration, reported before binding.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("could not read configuration: {0}")]
  Read(#[from] config::ConfigError),

  #[error("`project_id` must be set")]
  MissingProjectId,

  #[error("`api_key_hash` is not an argon2 PHC string ({0}); generate one with --hash-key")]
  InvalidKeyHash(String),

  #[error("`app_ids` must name at least one collection")]
  NoAppIds,
}
