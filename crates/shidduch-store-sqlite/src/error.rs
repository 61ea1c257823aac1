//! Error type for `shidduch-store-sqlite`.

use shidduch_core::profile::ProfileId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("profile not found: {0}")]
  NotFound(ProfileId),

  /// The change notifier went away; only happens while the store is being
  /// torn down.
  #[error("store change notifier closed")]
  NotifierClosed,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
