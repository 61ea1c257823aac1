//! Background task that keeps the directory in step with the backend.
//!
//! The task long-polls the collection and forwards every new snapshot to the
//! event loop. It stops on the first error; dropping the [`SyncHandle`]
//! stops it too.
//!
//! Each subscription carries a generation number. Events from an older
//! generation can still sit in the channel after a reset, so the app drops
//! any event whose generation is not the current one.

use std::time::Duration;

use shidduch_core::store::Snapshot;
use tokio::{sync::mpsc::UnboundedSender, task::JoinHandle};

use crate::{
  app::AppEvent,
  client::{BackendClient, RequestFailed},
};

/// How long the server may hold each long-poll open.
pub const LONG_POLL_WAIT: Duration = Duration::from_secs(20);

/// Why the subscription ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncFailure {
  pub message:           String,
  pub permission_denied: bool,
}

impl SyncFailure {
  fn from_error(e: &anyhow::Error) -> Self {
    Self {
      message:           format!("{e:#}"),
      permission_denied: e
        .downcast_ref::<RequestFailed>()
        .is_some_and(RequestFailed::is_permission_denied),
    }
  }
}

/// Owns the running subscription task.
pub struct SyncHandle {
  task: JoinHandle<()>,
}

impl Drop for SyncHandle {
  fn drop(&mut self) { self.task.abort(); }
}

pub fn spawn(
  client: BackendClient,
  events: UnboundedSender<AppEvent>,
  generation: u64,
) -> SyncHandle {
  spawn_with_wait(client, events, generation, LONG_POLL_WAIT)
}

fn spawn_with_wait(
  client: BackendClient,
  events: UnboundedSender<AppEvent>,
  generation: u64,
  wait: Duration,
) -> SyncHandle {
  let task = tokio::spawn(async move {
    if let Err(e) = run(&client, &events, generation, wait).await {
      let failure = SyncFailure::from_error(&e);
      let _ = events.send(AppEvent::SubscriptionFailed { generation, failure });
    }
  });
  SyncHandle { task }
}

async fn run(
  client: &BackendClient,
  events: &UnboundedSender<AppEvent>,
  generation: u64,
  wait: Duration,
) -> anyhow::Result<()> {
  let mut snapshot = client.snapshot().await?;
  loop {
    let version = snapshot.version;
    tracing::debug!(generation, version, profiles = snapshot.profiles.len(), "snapshot");
    if events.send(AppEvent::Snapshot { generation, snapshot }).is_err() {
      return Ok(());
    }
    snapshot = next_version(client, version, wait).await?;
  }
}

async fn next_version(client: &BackendClient, after: u64, wait: Duration) -> anyhow::Result<Snapshot> {
  loop {
    let snapshot = client.wait_for_change(after, wait).await?;
    if snapshot.version > after {
      return Ok(snapshot);
    }
  }
}
