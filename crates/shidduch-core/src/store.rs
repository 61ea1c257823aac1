//! The `ProfileStore` trait and the collection path it is keyed by.
//!
//! The trait is implemented by storage backends (e.g. `shidduch-store-sqlite`).
//! Higher layers (`shidduch-api`, `shidduch-server`) depend on this
//! abstraction, not on any concrete backend.

use std::{fmt, future::Future};

use serde::{Deserialize, Serialize};

use crate::profile::{Profile, ProfileId, ProfileRecord};

/// Application namespace used when no identifier is configured.
pub const DEFAULT_APP_ID: &str = "FamilyShidduchDB";

// ─── Collection path ─────────────────────────────────────────────────────────

/// Logical location of the profile collection:
/// `artifacts/{app_id}/public/data/profiles`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionPath {
  app_id: String,
}

impl CollectionPath {
  pub fn profiles(app_id: impl Into<String>) -> Self {
    Self { app_id: app_id.into() }
  }

  pub fn app_id(&self) -> &str { &self.app_id }

  pub fn segments(&self) -> [&str; 5] {
    ["artifacts", &self.app_id, "public", "data", "profiles"]
  }
}

impl Default for CollectionPath {
  fn default() -> Self { Self::profiles(DEFAULT_APP_ID) }
}

impl fmt::Display for CollectionPath {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.segments().join("/"))
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Every document in a collection at one store version.
///
/// `version` increases on every write to the store; profiles are in no
/// particular order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
  pub version:  u64,
  pub profiles: Vec<Profile>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a profile document store.
///
/// Identities are assigned by the store on [`create`](Self::create);
/// timestamps inside the record are the caller's responsibility.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait ProfileStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new document and return it with its fresh identity.
  fn create(
    &self,
    path: CollectionPath,
    record: ProfileRecord,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Replace the fields of an existing document. The identity never changes.
  ///
  /// Returns an error if no document with `id` exists in `path`.
  fn update(
    &self,
    path: CollectionPath,
    id: ProfileId,
    record: ProfileRecord,
  ) -> impl Future<Output = Result<Profile, Self::Error>> + Send + '_;

  /// Remove a document. Returns an error if it does not exist.
  fn delete(
    &self,
    path: CollectionPath,
    id: ProfileId,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Retrieve one document. Returns `None` if not found.
  fn get(
    &self,
    path: CollectionPath,
    id: ProfileId,
  ) -> impl Future<Output = Result<Option<Profile>, Self::Error>> + Send + '_;

  /// The whole collection at the current store version.
  fn snapshot(
    &self,
    path: CollectionPath,
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + '_;

  /// Resolve with a fresh snapshot once the store version exceeds
  /// `after_version`. Resolves immediately if it already does.
  fn wait_for_change(
    &self,
    path: CollectionPath,
    after_version: u64,
  ) -> impl Future<Output = Result<Snapshot, Self::Error>> + Send + '_;
}
