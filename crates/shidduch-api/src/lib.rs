//! JSON REST API for the Shidduch profile directory.
//!
//! Exposes an axum [`Router`] backed by any
//! [`shidduch_core::store::ProfileStore`]. Auth, TLS, and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", shidduch_api::api_router(store.clone()))
//! ```

pub mod error;
pub mod matches;
pub mod profiles;

use std::sync::Arc;

use axum::{Router, routing::get};
use shidduch_core::store::ProfileStore;

pub use error::ApiError;

/// Route prefix of the profile collection, relative to the API root.
pub const PROFILES_ROUTE: &str = "/artifacts/{app_id}/public/data/profiles";

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: ProfileStore + Send + Sync + 'static,
{
  Router::new()
    .route(
      PROFILES_ROUTE,
      get(profiles::list::<S>).post(profiles::create::<S>),
    )
    .route(
      &format!("{PROFILES_ROUTE}/{{id}}"),
      get(profiles::get_one::<S>)
        .put(profiles::update::<S>)
        .delete(profiles::delete::<S>),
    )
    .route(
      &format!("{PROFILES_ROUTE}/{{id}}/matches"),
      get(matches::handler::<S>),
    )
    .with_state(store)
}
