//! Request and response bodies of the `generateContent` call.

use serde::{Deserialize, Serialize};
use shidduch_core::assistant::ChatMessage;

/// Harm categories whose blocking threshold is relaxed on every request.
const RELAXED_CATEGORIES: [&str; 4] = [
  "HARM_CATEGORY_HARASSMENT",
  "HARM_CATEGORY_HATE_SPEECH",
  "HARM_CATEGORY_SEXUALLY_EXPLICIT",
  "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
  pub contents:        Vec<Content>,
  pub safety_settings: Vec<SafetySetting>,
}

impl GenerateContentRequest {
  /// Preamble first, then the history, then the new message.
  pub fn new(preamble: &str, history: &[ChatMessage], message: &str) -> Self {
    let mut contents = Vec::with_capacity(history.len() + 2);
    contents.push(Content::user(preamble));
    contents.extend(history.iter().map(Content::from));
    contents.push(Content::user(message));

    Self {
      contents,
      safety_settings: RELAXED_CATEGORIES
        .iter()
        .map(|category| SafetySetting {
          category:  (*category).to_string(),
          threshold: "BLOCK_NONE".to_string(),
        })
        .collect(),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct Content {
  pub role:  &'static str,
  pub parts: Vec<Part>,
}

impl Content {
  fn user(text: &str) -> Self {
    Self { role: "user", parts: vec![Part { text: text.to_string() }] }
  }
}

impl From<&ChatMessage> for Content {
  fn from(message: &ChatMessage) -> Self {
    let role = if message.is_user() { "user" } else { "model" };
    Self { role, parts: vec![Part { text: message.text().to_string() }] }
  }
}

#[derive(Debug, Serialize)]
pub struct Part {
  pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SafetySetting {
  pub category:  String,
  pub threshold: String,
}

// ─── Response ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
  #[serde(default)]
  pub candidates:      Vec<Candidate>,
  pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
  pub content:       Option<ContentResponse>,
  pub finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ContentResponse {
  #[serde(default)]
  pub parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
pub struct PartResponse {
  pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
  pub block_reason: Option<String>,
}
