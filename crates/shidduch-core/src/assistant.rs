//! Conversation state and reply parsing for the profile-writing assistant.
//!
//! The HTTP side lives in `shidduch-assistant`; this module only knows how
//! to turn a model reply into display text plus an optional [`ProfileDraft`],
//! and how the running conversation evolves.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::profile::{Gender, lenient};

/// Instruction text sent ahead of every conversation.
pub const ASSISTANT_PREAMBLE: &str = "\
אתה עוזר אדיב של שדכנית משפחתית. תפקידך לראיין את המשתמש בעברית ולבנות \
כרטיס מועמד לשידוך.
שאל שאלה אחת או שתיים בכל פעם, בטון חם וקצר, עד שיש לך תמונה מלאה.
בסוף כל תשובה הוסף בלוק ```json``` עם כל מה שידוע עד עכשיו על המועמד, \
באובייקט JSON אחד שטוח עם המפתחות הבאים בלבד (השמט מפתחות שאינם ידועים):
firstName, lastName, gender (\"male\" או \"female\"), age (מספר), height (מספר בס\"מ), \
appearance, religiousLevel, lifeStage, currentOccupation, pastOccupations, \
highSchool, postHighSchool, origin, livingToday, aboutMe, characterTraits, \
interests, motto, lookingForText, lookingForMinAge (מספר), lookingForMaxAge (מספר), \
lookingForReligiousLevel, contactName.
אל תמציא פרטים שהמשתמש לא אמר.";

/// First assistant line shown in a fresh conversation.
pub const GREETING: &str =
  "שלום! ספרו לי על המועמד או המועמדת ואני אבנה עבורכם כרטיס. איך קוראים לו או לה?";

/// Shown in place of a reply when the model call fails.
pub const APOLOGY: &str = "מצטער, הייתה תקלה בתקשורת עם העוזר. אפשר לנסות לשלוח שוב.";

static JSON_FENCE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"(?si)```json\s*(.*?)\s*```").expect("static regex is valid"));

// ─── Messages ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatMessage {
  User(String),
  Assistant(String),
}

impl ChatMessage {
  pub fn text(&self) -> &str {
    match self {
      Self::User(t) | Self::Assistant(t) => t,
    }
  }

  pub fn is_user(&self) -> bool { matches!(self, Self::User(_)) }
}

// ─── Draft ───────────────────────────────────────────────────────────────────

/// A profile as far as the assistant has pieced it together. Every field is
/// optional; match-preference fields are flat, as on the form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileDraft {
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub first_name:                  Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub last_name:                   Option<String>,
  #[serde(deserialize_with = "lenient::optional_gender", skip_serializing_if = "Option::is_none")]
  pub gender:                      Option<Gender>,
  #[serde(deserialize_with = "lenient::optional_number", skip_serializing_if = "Option::is_none")]
  pub age:                         Option<u32>,
  #[serde(deserialize_with = "lenient::optional_number", skip_serializing_if = "Option::is_none")]
  pub height:                      Option<u32>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub appearance:                  Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub religious_level:             Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub life_stage:                  Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub current_occupation:          Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub past_occupations:            Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub high_school:                 Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub post_high_school:            Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub origin:                      Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub living_today:                Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub about_me:                    Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub character_traits:            Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub interests:                   Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub motto:                       Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub looking_for_text:            Option<String>,
  #[serde(deserialize_with = "lenient::optional_number", skip_serializing_if = "Option::is_none")]
  pub looking_for_min_age:         Option<u32>,
  #[serde(deserialize_with = "lenient::optional_number", skip_serializing_if = "Option::is_none")]
  pub looking_for_max_age:         Option<u32>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub looking_for_religious_level: Option<String>,
  #[serde(deserialize_with = "lenient::optional_text", skip_serializing_if = "Option::is_none")]
  pub contact_name:                Option<String>,
}

macro_rules! each_draft_field {
  ($mac:ident) => {
    $mac!(
      first_name,
      last_name,
      gender,
      age,
      height,
      appearance,
      religious_level,
      life_stage,
      current_occupation,
      past_occupations,
      high_school,
      post_high_school,
      origin,
      living_today,
      about_me,
      character_traits,
      interests,
      motto,
      looking_for_text,
      looking_for_min_age,
      looking_for_max_age,
      looking_for_religious_level,
      contact_name
    )
  };
}

impl ProfileDraft {
  /// Overwrite every field that `newer` has a value for.
  pub fn merge(&mut self, newer: ProfileDraft) {
    macro_rules! overwrite {
      ($($f:ident),*) => {
        $(if newer.$f.is_some() { self.$f = newer.$f; })*
      };
    }
    each_draft_field!(overwrite);
  }

  pub fn is_empty(&self) -> bool {
    macro_rules! none {
      ($($f:ident),*) => { true $(&& self.$f.is_none())* };
    }
    each_draft_field!(none)
  }
}

// ─── Reply parsing ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssistantReply {
  /// The conversational part, with the fenced block removed.
  pub text:  String,
  /// `None` when the reply had no block or the block did not parse.
  pub draft: Option<ProfileDraft>,
}

/// Split a raw model reply into its text and its ```json``` draft block.
pub fn parse_reply(raw: &str) -> AssistantReply {
  let Some(found) = JSON_FENCE.captures(raw) else {
    return AssistantReply { text: raw.trim().to_string(), draft: None };
  };

  let whole = found.get(0).map(|m| m.range()).unwrap_or_default();
  let body = found.get(1).map(|m| m.as_str()).unwrap_or_default();

  let mut text = String::with_capacity(raw.len());
  text.push_str(&raw[..whole.start]);
  text.push_str(&raw[whole.end..]);

  AssistantReply {
    text:  text.trim().to_string(),
    draft: serde_json::from_str(body).ok(),
  }
}

// ─── Conversation ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Conversation {
  messages: Vec<ChatMessage>,
  preview:  ProfileDraft,
  pending:  bool,
}

impl Default for Conversation {
  fn default() -> Self {
    Self {
      messages: vec![ChatMessage::Assistant(GREETING.to_string())],
      preview:  ProfileDraft::default(),
      pending:  false,
    }
  }
}

impl Conversation {
  pub fn new() -> Self { Self::default() }

  pub fn messages(&self) -> &[ChatMessage] { &self.messages }

  pub fn is_pending(&self) -> bool { self.pending }

  /// Append the user's message and mark a reply as pending.
  ///
  /// Returns the history as it was before this message, for sending along
  /// with it, or `None` if the text is blank or a reply is still pending.
  pub fn begin_turn(&mut self, text: &str) -> Option<Vec<ChatMessage>> {
    let text = text.trim();
    if text.is_empty() || self.pending {
      return None;
    }
    let history = self.messages.clone();
    self.messages.push(ChatMessage::User(text.to_string()));
    self.pending = true;
    Some(history)
  }

  pub fn record_reply(&mut self, reply: AssistantReply) {
    self.pending = false;
    if !reply.text.is_empty() {
      self.messages.push(ChatMessage::Assistant(reply.text));
    }
    if let Some(draft) = reply.draft {
      self.preview.merge(draft);
    }
  }

  /// Close the pending turn with an apology that names what went wrong.
  pub fn record_failure(&mut self, reason: &str) {
    self.pending = false;
    let text = if reason.trim().is_empty() {
      APOLOGY.to_string()
    } else {
      format!("{APOLOGY}\n({})", reason.trim())
    };
    self.messages.push(ChatMessage::Assistant(text));
  }

  /// The running draft, if anything has been extracted yet.
  pub fn preview(&self) -> Option<&ProfileDraft> {
    (!self.preview.is_empty()).then_some(&self.preview)
  }

  /// The draft to copy into the profile form, if there is one.
  pub fn approve(&self) -> Option<ProfileDraft> { self.preview().cloned() }

  pub fn reset(&mut self) { *self = Self::default(); }
}
