//! Error type for `shidduch-assistant`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistantError {
  #[error("no assistant API key is configured")]
  MissingApiKey,

  #[error("assistant request failed with status {status}: {body}")]
  Status { status: u16, body: String },

  #[error("assistant returned no candidates")]
  NoCandidates,

  #[error("assistant reply was blocked ({0})")]
  Blocked(String),

  #[error("assistant reply could not be read: {0}")]
  Malformed(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
}

impl AssistantError {
  /// The service refused the API key itself, so retrying with the same key
  /// is pointless.
  pub fn is_key_rejected(&self) -> bool {
    match self {
      Self::MissingApiKey => true,
      Self::Status { status: 401 | 403, .. } => true,
      Self::Status { status: 400, body } => body.contains("API_KEY_INVALID"),
      _ => false,
    }
  }

  /// A short explanation for the person at the keyboard.
  pub fn summary(&self) -> String {
    match self {
      Self::MissingApiKey => "no Gemini API key is set".to_string(),
      _ if self.is_key_rejected() => "the Gemini API key was rejected".to_string(),
      Self::Status { status: 429, .. } => "the assistant is rate limited, try again shortly".to_string(),
      Self::Status { status, .. } => format!("the assistant service answered with status {status}"),
      Self::NoCandidates => "the assistant sent back no answer".to_string(),
      Self::Blocked(reason) => format!("the reply was blocked by the safety filter ({reason})"),
      Self::Malformed(_) => "the assistant's reply could not be read".to_string(),
      Self::Http(_) => "the assistant service could not be reached".to_string(),
    }
  }
}

pub type Result<T, E = AssistantError> = std::result::Result<T, E>;
