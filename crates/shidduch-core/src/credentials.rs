//! Parsing of the backend connection configuration the user pastes in.
//!
//! The pasted text is usually a snippet copied from a provider console, e.g.
//! `const config = { apiKey: "...", projectId: '...' };`, so parsing is
//! tolerant: surrounding code is stripped and bareword keys and single quotes
//! are repaired before giving up.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Backend address used when the configuration does not name one.
pub const DEFAULT_DATABASE_URL: &str = "http://localhost:5232";

static BAREWORD_KEY: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"(^|[{,])\s*(['"])?([A-Za-z0-9_]+)(['"])?\s*:"#).expect("static regex is valid")
});

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigParseError {
  #[error("configuration is not valid JSON, even after repair: {0}")]
  Malformed(String),

  #[error("configuration is missing required field `{0}`")]
  MissingField(&'static str),
}

/// Connection details for the profile backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendConfig {
  #[serde(default)]
  pub api_key:      String,
  #[serde(default)]
  pub project_id:   String,
  #[serde(rename = "databaseURL", default, skip_serializing_if = "Option::is_none")]
  pub database_url: Option<String>,
  /// Keys this application does not use, kept so the stored copy matches
  /// what was pasted.
  #[serde(flatten)]
  pub extra:        Map<String, Value>,
}

impl BackendConfig {
  /// Base URL of the backend, without a trailing slash.
  pub fn base_url(&self) -> &str {
    self
      .database_url
      .as_deref()
      .filter(|u| !u.trim().is_empty())
      .unwrap_or(DEFAULT_DATABASE_URL)
      .trim_end_matches('/')
  }

  fn validate(self) -> Result<Self, ConfigParseError> {
    if self.api_key.trim().is_empty() {
      return Err(ConfigParseError::MissingField("apiKey"));
    }
    if self.project_id.trim().is_empty() {
      return Err(ConfigParseError::MissingField("projectId"));
    }
    Ok(self)
  }
}

/// The text between the first `{` and the last `}`, or the trimmed input if
/// there is no such span.
fn object_span(raw: &str) -> &str {
  match (raw.find('{'), raw.rfind('}')) {
    (Some(start), Some(end)) if start < end => &raw[start..=end],
    _ => raw.trim(),
  }
}

/// Quote bareword keys and turn single quotes into double quotes. Only a
/// name right after `{` or `,` counts as a key, so `host:port` inside a value
/// is left alone.
fn repair(text: &str) -> String {
  BAREWORD_KEY
    .replace_all(text, r#"${1}"${3}": "#)
    .replace('\'', "\"")
}

/// Parse a pasted configuration blob.
pub fn parse_backend_config(raw: &str) -> Result<BackendConfig, ConfigParseError> {
  let span = object_span(raw);
  let config = match serde_json::from_str::<BackendConfig>(span) {
    Ok(config) => config,
    Err(_) => serde_json::from_str::<BackendConfig>(&repair(span))
      .map_err(|e| ConfigParseError::Malformed(e.to_string()))?,
  };
  config.validate()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn strict_json_parses() {
    let config =
      parse_backend_config(r#"{"apiKey":"k","projectId":"p","authDomain":"a"}"#).unwrap();
    assert_eq!(config.api_key, "k");
    assert_eq!(config.project_id, "p");
    assert_eq!(config.extra["authDomain"], "a");
  }

  #[test]
  fn barewords_and_single_quotes_are_repaired() {
    let config = parse_backend_config(r#"{apiKey: 'abc', projectId: "p1"}"#).unwrap();
    assert_eq!(config.api_key, "abc");
    assert_eq!(config.project_id, "p1");
  }

  #[test]
  fn surrounding_code_is_stripped() {
    let raw = "const firebaseConfig = {\n  apiKey: \"abc\",\n  projectId: \"p1\",\n};\n";
    let err = parse_backend_config(raw).unwrap_err();
    // A trailing comma is not something the repair pass fixes.
    assert!(matches!(err, ConfigParseError::Malformed(_)));

    let raw = "const firebaseConfig = {\n  apiKey: \"abc\",\n  projectId: \"p1\"\n};\n";
    let config = parse_backend_config(raw).unwrap();
    assert_eq!(config.project_id, "p1");
  }

  #[test]
  fn repair_leaves_colons_inside_values_alone() {
    let config = parse_backend_config(
      "{apiKey: 'k', projectId: 'p', databaseURL: 'http://192.168.1.5:5232'}",
    )
    .unwrap();
    assert_eq!(config.base_url(), "http://192.168.1.5:5232");

    let config =
      parse_backend_config("{\n  'apiKey' : 'k',\n  projectId:'p',\n  authDomain: 'a.example.org:443'\n}")
        .unwrap();
    assert_eq!(config.api_key, "k");
    assert_eq!(config.extra["authDomain"], "a.example.org:443");
  }

  #[test]
  fn missing_api_key_is_reported() {
    let err = parse_backend_config(r#"{"projectId":"p1"}"#).unwrap_err();
    assert_eq!(err, ConfigParseError::MissingField("apiKey"));

    let err = parse_backend_config(r#"{"apiKey":"k","projectId":""}"#).unwrap_err();
    assert_eq!(err, ConfigParseError::MissingField("projectId"));
  }

  #[test]
  fn garbage_is_malformed() {
    let err = parse_backend_config("hello there").unwrap_err();
    assert!(matches!(err, ConfigParseError::Malformed(_)));
  }

  #[test]
  fn database_url_defaults_and_trims_slash() {
    let config = parse_backend_config(r#"{"apiKey":"k","projectId":"p"}"#).unwrap();
    assert_eq!(config.base_url(), DEFAULT_DATABASE_URL);

    let config = parse_backend_config(
      r#"{"apiKey":"k","projectId":"p","databaseURL":"https://db.example.org/"}"#,
    )
    .unwrap();
    assert_eq!(config.base_url(), "https://db.example.org");
  }

  #[test]
  fn stored_form_round_trips() {
    let config = parse_backend_config(r#"{"apiKey":"k","projectId":"p","appId":"x"}"#).unwrap();
    let stored = serde_json::to_string(&config).unwrap();
    assert_eq!(parse_backend_config(&stored).unwrap(), config);
  }
}
