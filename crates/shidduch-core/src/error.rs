//! Error types for `shidduch-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{field} must be a whole number, got {value:?}")]
  InvalidNumber { field: &'static str, value: String },

  #[error("image is {size} bytes; the limit is {limit} bytes")]
  ImageTooLarge { size: usize, limit: usize },

  #[error("unsupported image type: {0:?}")]
  UnsupportedImage(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
