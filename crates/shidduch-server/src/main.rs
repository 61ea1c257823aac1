//! `shidduch-server`: hosts the profile collections the terminal clients
//! sync against.
//!
//! Settings come from `shidduch.toml` (or `--config`) and `SHIDDUCH_*`
//! environment variables; see [`ServerConfig`]. A new client key is set up
//! by running with `--hash-key` and putting the printed string in
//! `api_key_hash`.

use std::{
  io::{self, BufRead as _, Write as _},
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::{Context as _, bail};
use clap::Parser;
use shidduch_core::store::{CollectionPath, ProfileStore as _};
use shidduch_server::{AppState, ServerConfig, auth::hash_api_key};
use shidduch_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Shidduch profile directory server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "shidduch.toml")]
  config: PathBuf,

  /// Listen on this port instead of the configured one.
  #[arg(short, long)]
  port: Option<u16>,

  /// Read a client API key from stdin, print its argon2 hash and exit.
  #[arg(long)]
  hash_key: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  if cli.hash_key {
    return print_key_hash();
  }

  let mut cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("loading {}", cli.config.display()))?;
  if let Some(port) = cli.port {
    cfg.port = port;
  }

  let store = open_store(&cfg.store_path).await?;
  for app_id in &cfg.app_ids {
    let path = CollectionPath::profiles(app_id.as_str());
    let snapshot = store
      .snapshot(path.clone())
      .await
      .with_context(|| format!("reading {path}"))?;
    tracing::info!(collection = %path, profiles = snapshot.profiles.len(), "hosting");
  }
  if cfg.anonymous_auth {
    tracing::info!(project = %cfg.project_id, "anonymous sign-in enabled");
  } else {
    tracing::warn!(
      project = %cfg.project_id,
      "anonymous sign-in disabled; clients will see auth/operation-not-allowed"
    );
  }

  let address = format!("{}:{}", cfg.host, cfg.port);
  let state = AppState {
    store: Arc::new(store),
    auth:  Arc::new(cfg.auth()),
  };
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;
  tracing::info!("listening on http://{address}");

  axum::serve(listener, shidduch_server::router(state))
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")
}

/// Open the SQLite file, creating its directory on first run.
async fn open_store(configured: &Path) -> anyhow::Result<SqliteStore> {
  let path = expand_home(configured);
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    std::fs::create_dir_all(parent)
      .with_context(|| format!("creating store directory {}", parent.display()))?;
  }
  SqliteStore::open(&path)
    .await
    .with_context(|| format!("opening profile store at {}", path.display()))
}

fn print_key_hash() -> anyhow::Result<()> {
  eprint!("API key: ");
  io::stderr().flush().ok();
  let mut line = String::new();
  io::stdin().lock().read_line(&mut line)?;

  let key = line.trim();
  if key.is_empty() {
    bail!("no API key given");
  }
  let hash = hash_api_key(key).map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?;
  println!("{hash}");
  Ok(())
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::warn!("could not listen for ctrl-c: {e}");
    std::future::pending::<()>().await;
  }
  tracing::info!("shutting down");
}

/// `~/…` is relative to the user's home directory.
fn expand_home(path: &Path) -> PathBuf {
  match (path.strip_prefix("~"), dirs::home_dir()) {
    (Ok(rest), Some(home)) => home.join(rest),
    _ => path.to_path_buf(),
  }
}
