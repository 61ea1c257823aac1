//! `shidduch`: terminal UI for the family matchmaking directory.
//!
//! # Usage
//!
//! ```
//! shidduch
//! shidduch --app-id OurFamily --data-dir ~/.config/shidduch
//! ```
//!
//! On first start the setup screen asks for the backend configuration; it is
//! saved in the data directory together with the assistant key.

mod app;
mod client;
mod credentials;
mod sync;
mod ui;

use std::{
  fs, io,
  path::{Path, PathBuf},
  sync::Mutex,
  time::Duration,
};

use anyhow::{Context, Result};
use app::{App, AppEvent, Settings};
use clap::Parser;
use credentials::CredentialStore;
use crossterm::{
  event::{self, DisableBracketedPaste, EnableBracketedPaste, Event, KeyEventKind},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use serde::Deserialize;
use shidduch_assistant::DEFAULT_MODEL;
use shidduch_core::store::DEFAULT_APP_ID;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "shidduch", about = "Terminal UI for the family matchmaking directory")]
struct Args {
  /// Directory for saved credentials, settings.toml and the log
  /// (default: <config dir>/shidduch).
  #[arg(long, env = "SHIDDUCH_DATA_DIR", value_name = "DIR")]
  data_dir: Option<PathBuf>,

  /// Application namespace of the profile collection.
  #[arg(long, env = "SHIDDUCH_APP_ID")]
  app_id: Option<String>,

  /// Assistant model name.
  #[arg(long, env = "SHIDDUCH_MODEL")]
  model: Option<String>,

  /// Base URL of the assistant API.
  #[arg(long, env = "SHIDDUCH_ASSISTANT_ENDPOINT")]
  assistant_endpoint: Option<String>,

  /// Log file (default: <data dir>/shidduch.log).
  #[arg(long, value_name = "FILE")]
  log_file: Option<PathBuf>,
}

// ─── Settings file ────────────────────────────────────────────────────────────

/// Shape of the optional `settings.toml` in the data directory.
#[derive(Deserialize, Default)]
#[serde(default)]
struct SettingsFile {
  app_id:             Option<String>,
  model:              Option<String>,
  assistant_endpoint: Option<String>,
  log_file:           Option<PathBuf>,
}

fn default_data_dir() -> PathBuf {
  dirs::config_dir()
    .unwrap_or_else(|| PathBuf::from("."))
    .join("shidduch")
}

fn load_settings(path: &Path) -> Result<SettingsFile> {
  match fs::read_to_string(path) {
    Ok(raw) => toml::from_str(&raw).with_context(|| format!("parsing {}", path.display())),
    Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SettingsFile::default()),
    Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
  }
}

/// Log to a file; the terminal belongs to the UI.
fn init_logging(path: &Path) -> Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
  }
  let file = fs::OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("opening log file {}", path.display()))?;

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(Mutex::new(file))
    .with_ansi(false)
    .init();
  Ok(())
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();

  let data_dir = args.data_dir.unwrap_or_else(default_data_dir);
  let file_cfg = load_settings(&data_dir.join("settings.toml"))?;

  // CLI flags and env override settings.toml, which overrides defaults.
  let log_file = args
    .log_file
    .or(file_cfg.log_file)
    .unwrap_or_else(|| data_dir.join("shidduch.log"));
  init_logging(&log_file)?;

  let settings = Settings {
    app_id:             args
      .app_id
      .or(file_cfg.app_id)
      .unwrap_or_else(|| DEFAULT_APP_ID.to_string()),
    model:              args
      .model
      .or(file_cfg.model)
      .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
    assistant_endpoint: args.assistant_endpoint.or(file_cfg.assistant_endpoint),
  };
  tracing::info!(
    app_id = %settings.app_id,
    model = %settings.model,
    data_dir = %data_dir.display(),
    "starting"
  );

  let (events_tx, mut events_rx) = mpsc::unbounded_channel();
  let mut app = App::new(settings, CredentialStore::new(&data_dir), events_tx)?;

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)
    .context("entering alternate screen")?;
  let backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(backend).context("creating terminal")?;

  app.start();
  let run_result = run_event_loop(&mut terminal, &mut app, &mut events_rx).await;

  // Restore terminal regardless of result.
  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), DisableBracketedPaste, LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  tracing::info!("exiting");
  run_result
}

// ─── Event loop ───────────────────────────────────────────────────────────────

async fn run_event_loop(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App,
  events: &mut UnboundedReceiver<AppEvent>,
) -> Result<()> {
  loop {
    while let Ok(event) = events.try_recv() {
      app.handle_event(event);
    }

    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    match maybe_event {
      Some(Event::Key(key)) if key.kind == KeyEventKind::Press => {
        if !app.handle_key(key) {
          break;
        }
      }
      Some(Event::Paste(text)) => app.handle_paste(&text),
      _ => {}
    }
  }

  Ok(())
}
