//! `GET …/profiles/{id}/matches[?rules=classic|assistant]`
//!
//! Scores every other profile in the collection against the target and
//! returns the non-zero results, best first.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use shidduch_core::{
  matching::{MatchRules, ScoredMatch, rank_matches},
  profile::ProfileId,
  store::{CollectionPath, ProfileStore},
};

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct MatchParams {
  #[serde(default)]
  pub rules: MatchRules,
}

pub async fn handler<S>(
  State(store): State<Arc<S>>,
  Path((app_id, id)): Path<(String, String)>,
  Query(params): Query<MatchParams>,
) -> Result<Json<Vec<ScoredMatch>>, ApiError>
where
  S: ProfileStore,
{
  let id = ProfileId::new(id);
  let snapshot = store
    .snapshot(CollectionPath::profiles(app_id))
    .await
    .map_err(ApiError::store)?;

  let target = snapshot
    .profiles
    .iter()
    .find(|p| p.id == id)
    .ok_or_else(|| ApiError::ProfileNotFound(id.clone()))?;

  Ok(Json(rank_matches(target, &snapshot.profiles, params.rules)))
}
