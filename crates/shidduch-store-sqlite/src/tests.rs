//! Integration tests for `SqliteStore` against an in-memory database.

use std::time::Duration;

use shidduch_core::{
  profile::{Gender, ProfileId, ProfileRecord},
  store::{CollectionPath, ProfileStore},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn record(first: &str, created_at: i64) -> ProfileRecord {
  ProfileRecord {
    first_name: first.into(),
    gender: Gender::Female,
    age: 24,
    created_at: Some(created_at),
    updated_at: Some(created_at),
    ..Default::default()
  }
}

// ─── CRUD ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_assigns_identity_and_get_returns_it() {
  let s = store().await;
  let path = CollectionPath::default();

  let created = s.create(path.clone(), record("Leah", 1)).await.unwrap();
  assert!(!created.id.as_str().is_empty());

  let fetched = s.get(path, created.id.clone()).await.unwrap().unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  let result = s
    .get(CollectionPath::default(), ProfileId::new("nope"))
    .await
    .unwrap();
  assert!(result.is_none());
}

#[tokio::test]
async fn update_replaces_fields_but_keeps_identity() {
  let s = store().await;
  let path = CollectionPath::default();
  let created = s.create(path.clone(), record("Leah", 1)).await.unwrap();

  let mut changed = created.record.clone();
  changed.motto = "Kindness first".into();
  changed.updated_at = Some(2);
  let updated = s
    .update(path.clone(), created.id.clone(), changed)
    .await
    .unwrap();
  assert_eq!(updated.id, created.id);

  let fetched = s.get(path, created.id).await.unwrap().unwrap();
  assert_eq!(fetched.record.motto, "Kindness first");
  assert_eq!(fetched.record.created_at, Some(1));
  assert_eq!(fetched.record.updated_at, Some(2));
}

#[tokio::test]
async fn update_missing_is_not_found() {
  let s = store().await;
  let err = s
    .update(CollectionPath::default(), ProfileId::new("ghost"), record("x", 1))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_removes_and_second_delete_fails() {
  let s = store().await;
  let path = CollectionPath::default();
  let created = s.create(path.clone(), record("Leah", 1)).await.unwrap();

  s.delete(path.clone(), created.id.clone()).await.unwrap();
  assert!(s.get(path.clone(), created.id.clone()).await.unwrap().is_none());

  let err = s.delete(path, created.id).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

// ─── Collections and snapshots ───────────────────────────────────────────────

#[tokio::test]
async fn collections_are_isolated_by_app_id() {
  let s = store().await;
  let a = CollectionPath::profiles("family-a");
  let b = CollectionPath::profiles("family-b");

  let in_a = s.create(a.clone(), record("Leah", 1)).await.unwrap();
  s.create(b.clone(), record("Rachel", 2)).await.unwrap();

  assert_eq!(s.snapshot(a).await.unwrap().profiles.len(), 1);
  assert_eq!(s.snapshot(b.clone()).await.unwrap().profiles.len(), 1);
  assert!(s.get(b, in_a.id).await.unwrap().is_none());
}

#[tokio::test]
async fn every_write_advances_the_version() {
  let s = store().await;
  let path = CollectionPath::default();
  let v0 = s.snapshot(path.clone()).await.unwrap().version;

  let p = s.create(path.clone(), record("Leah", 1)).await.unwrap();
  let v1 = s.snapshot(path.clone()).await.unwrap().version;
  s.update(path.clone(), p.id.clone(), record("Leah", 1)).await.unwrap();
  let v2 = s.snapshot(path.clone()).await.unwrap().version;
  s.delete(path.clone(), p.id).await.unwrap();
  let v3 = s.snapshot(path).await.unwrap().version;

  assert!(v0 < v1 && v1 < v2 && v2 < v3);
  assert_eq!(s.version(), v3);
}

#[tokio::test]
async fn failed_write_does_not_advance_the_version() {
  let s = store().await;
  let before = s.version();
  let _ = s.delete(CollectionPath::default(), ProfileId::new("ghost")).await;
  assert_eq!(s.version(), before);
}

#[tokio::test]
async fn wait_for_change_resolves_immediately_when_behind() {
  let s = store().await;
  let path = CollectionPath::default();
  s.create(path.clone(), record("Leah", 1)).await.unwrap();

  let snap = tokio::time::timeout(Duration::from_secs(1), s.wait_for_change(path, 0))
    .await
    .expect("should not block")
    .unwrap();
  assert_eq!(snap.profiles.len(), 1);
}

#[tokio::test]
async fn wait_for_change_wakes_on_the_next_write() {
  let s = store().await;
  let path = CollectionPath::default();
  let current = s.version();

  let waiter = {
    let s = s.clone();
    let path = path.clone();
    tokio::spawn(async move { s.wait_for_change(path, current).await })
  };

  tokio::time::sleep(Duration::from_millis(20)).await;
  assert!(!waiter.is_finished());

  s.create(path, record("Leah", 1)).await.unwrap();
  let snap = tokio::time::timeout(Duration::from_secs(1), waiter)
    .await
    .expect("waiter should wake")
    .unwrap()
    .unwrap();
  assert!(snap.version > current);
  assert_eq!(snap.profiles[0].record.first_name, "Leah");
}

#[tokio::test]
async fn file_store_keeps_data_and_version_across_reopen() {
  let dir = tempfile::tempdir().unwrap();
  let db = dir.path().join("profiles.db");
  let path = CollectionPath::default();

  let version = {
    let s = SqliteStore::open(&db).await.unwrap();
    s.create(path.clone(), record("Leah", 1)).await.unwrap();
    s.version()
  };

  let s = SqliteStore::open(&db).await.unwrap();
  assert_eq!(s.version(), version);
  assert_eq!(s.snapshot(path).await.unwrap().profiles.len(), 1);
}
