//! [`GeminiClient`]: one `generateContent` call per conversation turn.

use std::time::Duration;

use reqwest::Client;
use shidduch_core::assistant::{ASSISTANT_PREAMBLE, AssistantReply, ChatMessage, parse_reply};

use crate::{
  error::{AssistantError, Result},
  wire::{GenerateContentRequest, GenerateContentResponse},
};

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// HTTP client for the hosted model.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct GeminiClient {
  client:   Client,
  api_key:  Option<String>,
  model:    String,
  endpoint: String,
}

impl GeminiClient {
  /// A client for the default model and endpoint. A missing or blank key is
  /// accepted here and reported when a message is sent.
  pub fn new(api_key: Option<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(60))
      .build()?;
    Ok(Self {
      client,
      api_key: api_key.filter(|k| !k.trim().is_empty()),
      model: DEFAULT_MODEL.to_string(),
      endpoint: DEFAULT_ENDPOINT.to_string(),
    })
  }

  pub fn with_model(mut self, model: impl Into<String>) -> Self {
    self.model = model.into();
    self
  }

  pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
    self.endpoint = endpoint.into().trim_end_matches('/').to_string();
    self
  }

  pub fn model(&self) -> &str { &self.model }

  pub fn has_api_key(&self) -> bool { self.api_key.is_some() }

  fn url(&self) -> String {
    format!("{}/v1beta/models/{}:generateContent", self.endpoint, self.model)
  }

  /// Send `message` with the conversation so far and return the raw reply
  /// text.
  pub async fn generate(&self, history: &[ChatMessage], message: &str) -> Result<String> {
    let api_key = self.api_key.as_deref().ok_or(AssistantError::MissingApiKey)?;
    let body = GenerateContentRequest::new(ASSISTANT_PREAMBLE, history, message);

    tracing::debug!(model = %self.model, turns = history.len(), "sending assistant request");
    let response = self
      .client
      .post(self.url())
      .query(&[("key", api_key)])
      .json(&body)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      return Err(AssistantError::Status { status: status.as_u16(), body });
    }

    let bytes = response.bytes().await?;
    let parsed: GenerateContentResponse =
      serde_json::from_slice(&bytes).map_err(|e| AssistantError::Malformed(e.to_string()))?;

    extract_text(parsed)
  }

  /// [`generate`](Self::generate), then split the reply into text and draft.
  pub async fn reply(&self, history: &[ChatMessage], message: &str) -> Result<AssistantReply> {
    let raw = self.generate(history, message).await?;
    let reply = parse_reply(&raw);
    if reply.draft.is_none() {
      tracing::debug!("assistant reply carried no usable draft");
    }
    Ok(reply)
  }
}

fn extract_text(response: GenerateContentResponse) -> Result<String> {
  if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
    return Err(AssistantError::Blocked(reason));
  }

  let candidate = response
    .candidates
    .into_iter()
    .next()
    .ok_or(AssistantError::NoCandidates)?;

  if candidate.finish_reason.as_deref() == Some("SAFETY") {
    return Err(AssistantError::Blocked("SAFETY".to_string()));
  }

  let text: String = candidate
    .content
    .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
    .unwrap_or_default();

  if text.is_empty() {
    return Err(AssistantError::Malformed("candidate has no text".to_string()));
  }
  Ok(text)
}
