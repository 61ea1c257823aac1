//! SQLite backend for the Shidduch profile store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. A [`tokio::sync::watch`] channel
//! carries the store version so readers can wait for the next change.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
