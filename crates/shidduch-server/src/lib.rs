//! Self-hostable backend for the Shidduch profile directory.
//!
//! Mounts the JSON API from `shidduch-api` under `/api`, guarded by an API
//! key, next to a minimal identity endpoint for anonymous sign-in.

pub mod auth;
pub mod error;

pub use error::{ConfigError, Error};

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use argon2::PasswordHash;
use axum::{Router, middleware, routing::post};
use serde::Deserialize;
use shidduch_core::store::{DEFAULT_APP_ID, ProfileStore};
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, anonymous_sign_in, require_api_key};

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_host() -> String { "127.0.0.1".to_string() }

fn default_port() -> u16 { 5232 }

fn default_store_path() -> PathBuf { PathBuf::from("shidduch.db") }

fn default_true() -> bool { true }

fn default_app_ids() -> Vec<String> { vec![DEFAULT_APP_ID.to_string()] }

/// Runtime server configuration, deserialised from `shidduch.toml` and
/// `SHIDDUCH_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  /// Project identifier clients must present on sign-in.
  pub project_id:     String,
  /// argon2 PHC hash of the client API key.
  pub api_key_hash:   String,
  #[serde(default = "default_true")]
  pub anonymous_auth: bool,
  /// Collections served under `/api/artifacts/{app_id}/…`. From the
  /// environment as a comma-separated `SHIDDUCH_APP_IDS`.
  #[serde(default = "default_app_ids")]
  pub app_ids:        Vec<String>,
}

impl ServerConfig {
  /// Read `path` (optional) and `SHIDDUCH_*` variables, then validate.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    let cfg: Self = config::Config::builder()
      .add_source(config::File::from(path.to_path_buf()).required(false))
      .add_source(
        config::Environment::with_prefix("SHIDDUCH")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("app_ids"),
      )
      .build()?
      .try_deserialize()?;
    cfg.validate()
  }

  /// Reject settings that would only fail later, on the first request.
  pub fn validate(self) -> Result<Self, ConfigError> {
    if self.project_id.trim().is_empty() {
      return Err(ConfigError::MissingProjectId);
    }
    PasswordHash::new(&self.api_key_hash)
      .map_err(|e| ConfigError::InvalidKeyHash(e.to_string()))?;
    if self.app_ids.iter().all(|a| a.trim().is_empty()) {
      return Err(ConfigError::NoAppIds);
    }
    Ok(self)
  }

  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      project_id:     self.project_id.clone(),
      api_key_hash:   self.api_key_hash.clone(),
      anonymous_auth: self.anonymous_auth,
      app_ids:        self.app_ids.clone(),
    }
  }
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the server.
#[derive(Clone)]
pub struct AppState<S: ProfileStore> {
  pub store: Arc<S>,
  pub auth:  Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full server router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: ProfileStore + Send + Sync + 'static,
{
  let api = shidduch_api::api_router(state.store.clone())
    .layer(middleware::from_fn_with_state(state.auth.clone(), require_api_key));

  Router::new()
    .route("/auth/anonymous", post(anonymous_sign_in))
    .with_state(state.auth)
    .nest("/api", api)
    .layer(TraceLayer::new_for_http())
}
