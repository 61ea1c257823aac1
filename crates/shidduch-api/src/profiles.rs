//! Handlers for the profile collection.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `…/profiles` | Snapshot; `?after_version=N[&wait_ms=M]` long-polls |
//! | `POST`   | `…/profiles` | Body: profile record; returns 201 + stored profile |
//! | `GET`    | `…/profiles/{id}` | 404 if not found |
//! | `PUT`    | `…/profiles/{id}` | Body: profile record; identity is kept |
//! | `DELETE` | `…/profiles/{id}` | 204 on success |
//!
//! `…` is `/artifacts/{app_id}/public/data`.

use std::{sync::Arc, time::Duration};

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use shidduch_core::{
  profile::{Profile, ProfileId, ProfileRecord},
  store::{CollectionPath, ProfileStore, Snapshot},
};

use crate::error::ApiError;

/// Long-poll wait used when the client does not ask for one.
pub const DEFAULT_WAIT: Duration = Duration::from_secs(25);
/// Upper bound on a single long-poll.
pub const MAX_WAIT: Duration = Duration::from_secs(60);

// ─── List / long-poll ────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// If set, hold the request until the store version exceeds this value.
  pub after_version: Option<u64>,
  /// Milliseconds to hold a long-poll before answering with the unchanged
  /// snapshot.
  pub wait_ms:       Option<u64>,
}

/// `GET …/profiles[?after_version=N&wait_ms=M]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Path(app_id): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Snapshot>, ApiError>
where
  S: ProfileStore,
{
  let path = CollectionPath::profiles(app_id);

  let Some(after) = params.after_version else {
    let snapshot = store.snapshot(path).await.map_err(ApiError::store)?;
    return Ok(Json(snapshot));
  };

  let wait = params
    .wait_ms
    .map(Duration::from_millis)
    .unwrap_or(DEFAULT_WAIT)
    .min(MAX_WAIT);

  let snapshot = match tokio::time::timeout(wait, store.wait_for_change(path.clone(), after)).await
  {
    Ok(result) => result.map_err(ApiError::store)?,
    Err(_) => store.snapshot(path).await.map_err(ApiError::store)?,
  };
  Ok(Json(snapshot))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST …/profiles`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Path(app_id): Path<String>,
  Json(record): Json<ProfileRecord>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProfileStore,
{
  let profile = store
    .create(CollectionPath::profiles(app_id), record)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(profile)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET …/profiles/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path((app_id, id)): Path<(String, String)>,
) -> Result<Json<Profile>, ApiError>
where
  S: ProfileStore,
{
  let profile = find(&*store, CollectionPath::profiles(app_id), ProfileId::new(id)).await?;
  Ok(Json(profile))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PUT …/profiles/{id}`
pub async fn update<S>(
  State(store): State<Arc<S>>,
  Path((app_id, id)): Path<(String, String)>,
  Json(record): Json<ProfileRecord>,
) -> Result<Json<Profile>, ApiError>
where
  S: ProfileStore,
{
  let path = CollectionPath::profiles(app_id);
  let id = ProfileId::new(id);
  find(&*store, path.clone(), id.clone()).await?;

  let profile = store
    .update(path, id, record)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(profile))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE …/profiles/{id}`
pub async fn delete<S>(
  State(store): State<Arc<S>>,
  Path((app_id, id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError>
where
  S: ProfileStore,
{
  let path = CollectionPath::profiles(app_id);
  let id = ProfileId::new(id);
  find(&*store, path.clone(), id.clone()).await?;

  store.delete(path, id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// Fetch a profile or fail with 404.
pub(crate) async fn find<S>(
  store: &S,
  path: CollectionPath,
  id: ProfileId,
) -> Result<Profile, ApiError>
where
  S: ProfileStore,
{
  store
    .get(path, id.clone())
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::ProfileNotFound(id))
}
