//! [`SqliteStore`]: the SQLite implementation of [`ProfileStore`].

use std::{path::Path, sync::Arc};

use rusqlite::OptionalExtension as _;
use tokio::sync::watch;

use shidduch_core::{
  profile::{Profile, ProfileId, ProfileRecord},
  store::{CollectionPath, ProfileStore, Snapshot},
};

use crate::{
  Error, Result,
  encode::{RawProfile, encode_record},
  schema::{BUMP_VERSION, READ_VERSION, SCHEMA},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A profile store backed by a single SQLite file.
///
/// Cloning is cheap; the connection and the change notifier are both
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:    tokio_rusqlite::Connection,
  version: Arc<watch::Sender<u64>>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    let version: u64 = conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(conn.query_row(READ_VERSION, [], |r| r.get::<_, i64>(0))? as u64)
      })
      .await?;

    let (tx, _) = watch::channel(version);
    Ok(Self { conn, version: Arc::new(tx) })
  }

  /// The current store version.
  pub fn version(&self) -> u64 { *self.version.borrow() }

  fn publish(&self, version: u64) {
    tracing::debug!(version, "store version advanced");
    self.version.send_replace(version);
  }

  async fn read_snapshot(&self, path: &CollectionPath) -> Result<Snapshot> {
    let app_id = path.app_id().to_owned();

    let (version, raws): (u64, Vec<RawProfile>) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let version = tx.query_row(READ_VERSION, [], |r| r.get::<_, i64>(0))? as u64;
        let rows = {
          let mut stmt = tx.prepare(&format!(
            "SELECT {} FROM profiles WHERE app_id = ?1 ORDER BY rowid",
            RawProfile::COLUMNS
          ))?;
          stmt
            .query_map(rusqlite::params![app_id], RawProfile::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok((version, rows))
      })
      .await?;

    let profiles = raws
      .into_iter()
      .map(RawProfile::into_profile)
      .collect::<Result<_>>()?;

    Ok(Snapshot { version, profiles })
  }
}

// ─── ProfileStore impl ───────────────────────────────────────────────────────

impl ProfileStore for SqliteStore {
  type Error = Error;

  async fn create(&self, path: CollectionPath, record: ProfileRecord) -> Result<Profile> {
    let profile = Profile { id: ProfileId::generate(), record };

    let id_str     = profile.id.as_str().to_owned();
    let app_id     = path.app_id().to_owned();
    let doc_json   = encode_record(&profile.record)?;
    let created_at = profile.record.created_at;
    let updated_at = profile.record.updated_at;

    let version: u64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO profiles (profile_id, app_id, doc_json, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, app_id, doc_json, created_at, updated_at],
        )?;
        let version = tx.query_row(BUMP_VERSION, [], |r| r.get::<_, i64>(0))? as u64;
        tx.commit()?;
        Ok(version)
      })
      .await?;

    self.publish(version);
    tracing::info!(id = %profile.id, collection = %path, "profile created");
    Ok(profile)
  }

  async fn update(
    &self,
    path: CollectionPath,
    id: ProfileId,
    record: ProfileRecord,
  ) -> Result<Profile> {
    let id_str     = id.as_str().to_owned();
    let app_id     = path.app_id().to_owned();
    let doc_json   = encode_record(&record)?;
    let created_at = record.created_at;
    let updated_at = record.updated_at;

    let version: Option<u64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "UPDATE profiles SET doc_json = ?3, created_at = ?4, updated_at = ?5
           WHERE profile_id = ?1 AND app_id = ?2",
          rusqlite::params![id_str, app_id, doc_json, created_at, updated_at],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let version = tx.query_row(BUMP_VERSION, [], |r| r.get::<_, i64>(0))? as u64;
        tx.commit()?;
        Ok(Some(version))
      })
      .await?;

    let version = version.ok_or_else(|| Error::NotFound(id.clone()))?;
    self.publish(version);
    tracing::info!(%id, collection = %path, "profile updated");
    Ok(Profile { id, record })
  }

  async fn delete(&self, path: CollectionPath, id: ProfileId) -> Result<()> {
    let id_str = id.as_str().to_owned();
    let app_id = path.app_id().to_owned();

    let version: Option<u64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let changed = tx.execute(
          "DELETE FROM profiles WHERE profile_id = ?1 AND app_id = ?2",
          rusqlite::params![id_str, app_id],
        )?;
        if changed == 0 {
          return Ok(None);
        }
        let version = tx.query_row(BUMP_VERSION, [], |r| r.get::<_, i64>(0))? as u64;
        tx.commit()?;
        Ok(Some(version))
      })
      .await?;

    let version = version.ok_or_else(|| Error::NotFound(id.clone()))?;
    self.publish(version);
    tracing::info!(%id, collection = %path, "profile deleted");
    Ok(())
  }

  async fn get(&self, path: CollectionPath, id: ProfileId) -> Result<Option<Profile>> {
    let id_str = id.as_str().to_owned();
    let app_id = path.app_id().to_owned();

    let raw: Option<RawProfile> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {} FROM profiles WHERE profile_id = ?1 AND app_id = ?2",
                RawProfile::COLUMNS
              ),
              rusqlite::params![id_str, app_id],
              RawProfile::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProfile::into_profile).transpose()
  }

  async fn snapshot(&self, path: CollectionPath) -> Result<Snapshot> {
    self.read_snapshot(&path).await
  }

  async fn wait_for_change(&self, path: CollectionPath, after_version: u64) -> Result<Snapshot> {
    let mut rx = self.version.subscribe();
    if rx.wait_for(|v| *v > after_version).await.is_err() {
      return Err(Error::NotifierClosed);
    }
    self.read_snapshot(&path).await
  }
}
