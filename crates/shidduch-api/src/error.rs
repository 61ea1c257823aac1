//! Handler errors, rendered as `{"error": "<message>"}`.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use shidduch_core::profile::ProfileId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
  #[error("profile not found: {0}")]
  ProfileNotFound(ProfileId),

  /// The backing store failed; details go to the log.
  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  pub fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  fn status(&self) -> StatusCode {
    match self {
      Self::ProfileNotFound(_) => StatusCode::NOT_FOUND,
      Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    if let Self::Store(e) = &self {
      tracing::error!(error = %e, "store operation failed");
    }
    (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
  }
}
