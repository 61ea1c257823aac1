//! Conversions between profile documents and their SQLite row form.
//!
//! The record is stored as compact camelCase JSON, exactly as it appears on
//! the wire. Timestamps are duplicated into integer columns for ordering.

use shidduch_core::profile::{Profile, ProfileId, ProfileRecord};

use crate::Result;

pub fn encode_record(record: &ProfileRecord) -> Result<String> {
  Ok(serde_json::to_string(record)?)
}

/// Row values read back from the `profiles` table.
pub struct RawProfile {
  pub profile_id: String,
  pub doc_json:   String,
}

impl RawProfile {
  pub const COLUMNS: &'static str = "profile_id, doc_json";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      profile_id: row.get(0)?,
      doc_json:   row.get(1)?,
    })
  }

  pub fn into_profile(self) -> Result<Profile> {
    Ok(Profile {
      id:     ProfileId::new(self.profile_id),
      record: serde_json::from_str(&self.doc_json)?,
    })
  }
}
