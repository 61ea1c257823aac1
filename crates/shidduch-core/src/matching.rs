//! Rule-based compatibility scoring between two profiles.
//!
//! The score is a sum of small components plus a flat base boost, capped at
//! [`MAX_SCORE`]. Only opposite-gender pairs score above zero.

use serde::{Deserialize, Serialize};

use crate::profile::{Gender, Profile, ProfileRecord};

pub const MAX_SCORE: u32 = 100;
/// Added to every opposite-gender pair before capping, under either rule set.
pub const BASE_BOOST: u32 = 20;
pub const DEFAULT_MIN_AGE: u32 = 18;
pub const DEFAULT_MAX_AGE: u32 = 99;

const AGE_IN_RANGE: u32 = 40;
const AGE_NEAR_MISS: u32 = 30;
const AGE_PENALTY_PER_YEAR: u32 = 5;
const RELIGION_EXACT: u32 = 30;
const RELIGION_PARTIAL: u32 = 15;
const RELIGION_UNKNOWN: u32 = 10;
const HEIGHT_FIT: u32 = 10;
/// How much taller than a male target a candidate may be.
const HEIGHT_TOLERANCE_CM: u32 = 10;

// ─── Rules ───────────────────────────────────────────────────────────────────

/// The two scoring rule sets the directory has shipped with.
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
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MatchRules {
  /// Age, religious level and height; no credit for missing religious data.
  #[default]
  Classic,
  /// Age and religious level only; a missing religious level on either side
  /// earns a neutral 10 points.
  Assistant,
}

impl MatchRules {
  fn scores_height(self) -> bool { matches!(self, Self::Classic) }

  fn unknown_religion_points(self) -> u32 {
    match self {
      Self::Classic => 0,
      Self::Assistant => RELIGION_UNKNOWN,
    }
  }
}

// ─── Scoring ─────────────────────────────────────────────────────────────────

/// Score `candidate` as a partner for `target`, in `0..=100`.
pub fn score(candidate: &ProfileRecord, target: &ProfileRecord, rules: MatchRules) -> u32 {
  if candidate.gender == target.gender {
    return 0;
  }

  let mut total = age_points(candidate, target);
  total += religion_points(candidate, target, rules);
  if rules.scores_height() {
    total += height_points(candidate, target);
  }

  (total + BASE_BOOST).min(MAX_SCORE)
}

/// The target's preferred age range; zero bounds count as unset.
fn preferred_ages(target: &ProfileRecord) -> (u32, u32) {
  let pref = target.looking_for.as_ref();
  let min = pref.map(|p| p.min_age).filter(|&a| a != 0);
  let max = pref.map(|p| p.max_age).filter(|&a| a != 0);
  (min.unwrap_or(DEFAULT_MIN_AGE), max.unwrap_or(DEFAULT_MAX_AGE))
}

fn age_points(candidate: &ProfileRecord, target: &ProfileRecord) -> u32 {
  let (min, max) = preferred_ages(target);
  let age = candidate.age;
  if age >= min && age <= max {
    return AGE_IN_RANGE;
  }
  let distance = age.abs_diff(min).min(age.abs_diff(max));
  AGE_NEAR_MISS.saturating_sub(distance.saturating_mul(AGE_PENALTY_PER_YEAR))
}

fn religion_points(
  candidate: &ProfileRecord,
  target: &ProfileRecord,
  rules: MatchRules,
) -> u32 {
  let have = candidate.religious_level.as_str();
  let wanted = target.looking_for.as_ref().map(|p| p.religious_level.as_str());

  if wanted == Some(have) {
    return RELIGION_EXACT;
  }

  match wanted {
    Some(w) if !w.is_empty() && !have.is_empty() => {
      if have.contains(w) || w.contains(have) {
        RELIGION_PARTIAL
      } else {
        0
      }
    }
    _ => rules.unknown_religion_points(),
  }
}

fn height_points(candidate: &ProfileRecord, target: &ProfileRecord) -> u32 {
  let fits = match target.gender {
    Gender::Female => candidate.height >= target.height,
    Gender::Male => candidate.height <= target.height.saturating_add(HEIGHT_TOLERANCE_CM),
  };
  if fits { HEIGHT_FIT } else { 0 }
}

// ─── Ranking ─────────────────────────────────────────────────────────────────

/// One entry of a match result list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoredMatch {
  pub profile: Profile,
  pub score:   u32,
}

/// Score every other profile against `target`, drop zero scores and sort by
/// score, highest first. Equal scores keep their directory order.
pub fn rank_matches(
  target: &Profile,
  directory: &[Profile],
  rules: MatchRules,
) -> Vec<ScoredMatch> {
  let mut matches: Vec<ScoredMatch> = directory
    .iter()
    .filter(|p| p.id != target.id)
    .map(|p| ScoredMatch {
      score:   score(&p.record, &target.record, rules),
      profile: p.clone(),
    })
    .filter(|m| m.score > 0)
    .collect();

  matches.sort_by(|a, b| b.score.cmp(&a.score));
  matches
}
