//! Core types and logic for the Shidduch profile directory.
//!
//! No HTTP, terminal or database code lives here. Every other crate in the
//! workspace depends on it.

pub mod assistant;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod form;
pub mod matching;
pub mod profile;
pub mod store;

pub use error::{Error, Result};
