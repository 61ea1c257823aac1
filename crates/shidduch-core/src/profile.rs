//! Profile records, the only entity the directory persists.
//!
//! Wire names are camelCase so documents written by older clients decode
//! unchanged. Missing keys fall back to empty text or zero; unknown keys are
//! ignored.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Advisory size cap for embedded photos.
pub const MAX_IMAGE_BYTES: usize = 150_000;

// ─── Identity ────────────────────────────────────────────────────────────────

/// Opaque document key, assigned by the backend when a profile is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
  pub fn new(id: impl Into<String>) -> Self { Self(id.into()) }

  /// A fresh random key, as handed out by a store on create.
  pub fn generate() -> Self { Self(Uuid::new_v4().simple().to_string()) }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for ProfileId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

// ─── Gender ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  strum::Display,
  strum::EnumString,
  strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Gender {
  #[default]
  #[strum(to_string = "male", serialize = "זכר")]
  Male,
  #[strum(to_string = "female", serialize = "נקבה")]
  Female,
}

impl Gender {
  pub fn toggled(self) -> Self {
    match self {
      Self::Male => Self::Female,
      Self::Female => Self::Male,
    }
  }
}

// ─── Match preference ────────────────────────────────────────────────────────

/// What the profile is looking for in a partner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MatchPreference {
  #[serde(deserialize_with = "lenient::number")]
  pub min_age:         u32,
  #[serde(deserialize_with = "lenient::number")]
  pub max_age:         u32,
  pub religious_level: String,
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// Everything stored for one candidate, minus the backend-assigned identity.
///
/// `created_at` and `updated_at` are milliseconds since the Unix epoch and
/// are stamped by the writing client, not by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileRecord {
  pub first_name:         String,
  pub last_name:          String,
  #[serde(deserialize_with = "lenient::gender")]
  pub gender:             Gender,
  #[serde(deserialize_with = "lenient::number")]
  pub age:                u32,
  /// Centimetres.
  #[serde(deserialize_with = "lenient::number")]
  pub height:             u32,
  pub appearance:         String,
  pub religious_level:    String,
  pub current_occupation: String,
  pub past_occupations:   String,
  pub life_stage:         String,
  pub origin:             String,
  pub living_today:       String,
  pub high_school:        String,
  pub post_high_school:   String,
  pub about_me:           String,
  pub looking_for_text:   String,
  pub interests:          String,
  pub character_traits:   String,
  pub motto:              String,
  pub contact_name:       String,
  /// Inline `data:` URI.
  #[serde(skip_serializing_if = "Option::is_none")]
  pub image:              Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub looking_for:        Option<MatchPreference>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub created_at:         Option<i64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub updated_at:         Option<i64>,
}

impl ProfileRecord {
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name)
  }
}

/// A stored profile: its identity plus the record fields, flattened on the
/// wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:     ProfileId,
  #[serde(flatten)]
  pub record: ProfileRecord,
}

// ─── Images ──────────────────────────────────────────────────────────────────

/// Encode raw image bytes as a `data:` URI suitable for
/// [`ProfileRecord::image`].
///
/// The media type is inferred from the file name's extension.
pub fn image_data_uri(bytes: &[u8], file_name: &str) -> Result<String> {
  if bytes.len() > MAX_IMAGE_BYTES {
    return Err(Error::ImageTooLarge {
      size:  bytes.len(),
      limit: MAX_IMAGE_BYTES,
    });
  }

  let ext = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  let media_type = match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => return Err(Error::UnsupportedImage(file_name.to_string())),
  };

  Ok(format!("data:{media_type};base64,{}", B64.encode(bytes)))
}

// ─── Lenient decoding ────────────────────────────────────────────────────────

/// Deserialisers that accept the loosely-typed values older documents and
/// model output contain (numbers as strings, `null`, free-form gender).
pub(crate) mod lenient {
  use serde::{Deserialize, Deserializer};

  use super::Gender;

  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Loose {
    Int(u64),
    Float(f64),
    Text(String),
    Other(serde::de::IgnoredAny),
  }

  fn to_u32(value: Loose) -> Option<u32> {
    match value {
      Loose::Int(n) => u32::try_from(n).ok(),
      Loose::Float(f) if f.is_finite() && f >= 0.0 => Some(f.round() as u32),
      Loose::Text(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  /// Numbers default to `0` when missing or unreadable.
  pub fn number<'de, D>(d: D) -> Result<u32, D::Error>
  where
    D: Deserializer<'de>,
  {
    Ok(
      Option::<Loose>::deserialize(d)?
        .and_then(to_u32)
        .unwrap_or_default(),
    )
  }

  pub fn optional_number<'de, D>(d: D) -> Result<Option<u32>, D::Error>
  where
    D: Deserializer<'de>,
  {
    Ok(Option::<Loose>::deserialize(d)?.and_then(to_u32))
  }

  /// Text fields in model output sometimes arrive as bare numbers.
  pub fn optional_text<'de, D>(d: D) -> Result<Option<String>, D::Error>
  where
    D: Deserializer<'de>,
  {
    Ok(match Option::<Loose>::deserialize(d)? {
      Some(Loose::Text(s)) => Some(s),
      Some(Loose::Int(n)) => Some(n.to_string()),
      Some(Loose::Float(f)) => Some(f.to_string()),
      _ => None,
    })
  }

  /// Unknown or missing gender falls back to the default.
  pub fn gender<'de, D>(d: D) -> Result<Gender, D::Error>
  where
    D: Deserializer<'de>,
  {
    Ok(optional_gender(d)?.unwrap_or_default())
  }

  pub fn optional_gender<'de, D>(d: D) -> Result<Option<Gender>, D::Error>
  where
    D: Deserializer<'de>,
  {
    Ok(match Option::<Loose>::deserialize(d)? {
      Some(Loose::Text(s)) => s.trim().parse().ok(),
      _ => None,
    })
  }
}
