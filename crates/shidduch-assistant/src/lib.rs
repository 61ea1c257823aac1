//! Client for the hosted language model behind the profile assistant.
//!
//! Sends the conversation to a Gemini `generateContent` endpoint and hands
//! the reply to [`shidduch_core::assistant::parse_reply`].

mod client;
mod wire;

pub mod error;

pub use client::{DEFAULT_MODEL, GeminiClient};
pub use error::{AssistantError, Result};
