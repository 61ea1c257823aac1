//! The in-memory, live-synced profile directory.
//!
//! The directory is never edited directly: writes go to the store and the
//! list changes only when the next [`Snapshot`] arrives.

use crate::{
  matching::{MatchRules, ScoredMatch, rank_matches},
  profile::{Gender, Profile, ProfileId},
  store::Snapshot,
};

// ─── Filter ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GenderFilter {
  #[default]
  All,
  Only(Gender),
}

impl GenderFilter {
  /// All → male → female → all.
  pub fn next(self) -> Self {
    match self {
      Self::All => Self::Only(Gender::Male),
      Self::Only(Gender::Male) => Self::Only(Gender::Female),
      Self::Only(Gender::Female) => Self::All,
    }
  }

  fn admits(self, gender: Gender) -> bool {
    match self {
      Self::All => true,
      Self::Only(g) => g == gender,
    }
  }
}

/// Search text plus gender restriction, as typed into the directory view.
#[derive(Debug, Clone, Default)]
pub struct DirectoryFilter {
  /// Matched as a substring of the full name, origin or current residence.
  pub search: String,
  pub gender: GenderFilter,
}

impl DirectoryFilter {
  pub fn matches(&self, profile: &Profile) -> bool {
    let r = &profile.record;
    let term = self.search.as_str();
    let text_hit = r.full_name().contains(term)
      || r.origin.contains(term)
      || r.living_today.contains(term);
    text_hit && self.gender.admits(r.gender)
  }
}

// ─── Directory ───────────────────────────────────────────────────────────────

/// Sort newest-created first. Documents without `created_at` sort as if
/// created at the epoch; ties keep their order.
pub fn sort_newest_first(profiles: &mut [Profile]) {
  profiles.sort_by(|a, b| {
    let a = a.record.created_at.unwrap_or(0);
    let b = b.record.created_at.unwrap_or(0);
    b.cmp(&a)
  });
}

#[derive(Debug, Default)]
pub struct Directory {
  profiles:          Vec<Profile>,
  version:           Option<u64>,
  awaiting_snapshot: bool,
  pending_writes:    usize,
}

impl Directory {
  pub fn new() -> Self { Self::default() }

  // ── Subscription ──────────────────────────────────────────────────────

  /// Mark the directory as loading until the first snapshot arrives.
  pub fn start_subscription(&mut self) {
    self.awaiting_snapshot = true;
  }

  /// Replace the list wholesale with `snapshot`'s documents.
  pub fn apply_snapshot(&mut self, snapshot: Snapshot) {
    let mut profiles = snapshot.profiles;
    sort_newest_first(&mut profiles);
    self.profiles = profiles;
    self.version = Some(snapshot.version);
    self.awaiting_snapshot = false;
  }

  /// The subscription died. The list keeps its last contents.
  pub fn subscription_failed(&mut self) {
    self.awaiting_snapshot = false;
  }

  /// Forget everything, e.g. after the connection configuration is reset.
  pub fn clear(&mut self) { *self = Self::default(); }

  // ── Writes ────────────────────────────────────────────────────────────

  pub fn begin_write(&mut self) { self.pending_writes += 1; }

  pub fn end_write(&mut self) {
    self.pending_writes = self.pending_writes.saturating_sub(1);
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  pub fn is_loading(&self) -> bool {
    self.awaiting_snapshot || self.pending_writes > 0
  }

  /// Version of the last applied snapshot, if any.
  pub fn version(&self) -> Option<u64> { self.version }

  pub fn profiles(&self) -> &[Profile] { &self.profiles }

  pub fn get(&self, id: &ProfileId) -> Option<&Profile> {
    self.profiles.iter().find(|p| &p.id == id)
  }

  pub fn filtered(&self, filter: &DirectoryFilter) -> Vec<&Profile> {
    self.profiles.iter().filter(|p| filter.matches(p)).collect()
  }

  /// Ranked matches for the profile `target`, or empty if it is unknown.
  pub fn matches_for(&self, target: &ProfileId, rules: MatchRules) -> Vec<ScoredMatch> {
    self
      .get(target)
      .map(|t| rank_matches(t, &self.profiles, rules))
      .unwrap_or_default()
  }
}
