//! Persistent storage for the backend configuration and the assistant key.
//!
//! Both live as plain files in the data directory, so a reset is a file
//! removal.

use std::{
  fs, io,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use shidduch_core::credentials::{BackendConfig, parse_backend_config};

const BACKEND_FILE: &str = "backend_config.json";
const ASSISTANT_KEY_FILE: &str = "assistant_key";

#[derive(Debug, Clone)]
pub struct CredentialStore {
  dir: PathBuf,
}

impl CredentialStore {
  pub fn new(dir: impl Into<PathBuf>) -> Self { Self { dir: dir.into() } }

  pub fn dir(&self) -> &Path { &self.dir }

  // ── Backend configuration ─────────────────────────────────────────────────

  /// The saved configuration. A file that no longer parses counts as absent.
  pub fn load_backend(&self) -> Option<BackendConfig> {
    let raw = read_optional(&self.dir.join(BACKEND_FILE))?;
    match parse_backend_config(&raw) {
      Ok(config) => Some(config),
      Err(e) => {
        tracing::warn!(error = %e, "ignoring unreadable saved backend configuration");
        None
      }
    }
  }

  pub fn save_backend(&self, config: &BackendConfig) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("encoding backend configuration")?;
    self.write(BACKEND_FILE, &json)
  }

  pub fn clear_backend(&self) -> Result<()> {
    remove_if_exists(&self.dir.join(BACKEND_FILE)).context("removing backend configuration")
  }

  // ── Assistant key ─────────────────────────────────────────────────────────

  pub fn load_assistant_key(&self) -> Option<String> {
    read_optional(&self.dir.join(ASSISTANT_KEY_FILE))
      .map(|k| k.trim().to_string())
      .filter(|k| !k.is_empty())
  }

  pub fn save_assistant_key(&self, key: &str) -> Result<()> {
    self.write(ASSISTANT_KEY_FILE, key.trim())
  }

  pub fn clear_assistant_key(&self) -> Result<()> {
    remove_if_exists(&self.dir.join(ASSISTANT_KEY_FILE)).context("removing assistant key")
  }

  fn write(&self, name: &str, contents: &str) -> Result<()> {
    fs::create_dir_all(&self.dir)
      .with_context(|| format!("creating data directory {}", self.dir.display()))?;
    let path = self.dir.join(name);
    fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
  }
}

fn read_optional(path: &Path) -> Option<String> {
  match fs::read_to_string(path) {
    Ok(raw) => Some(raw),
    Err(e) if e.kind() == io::ErrorKind::NotFound => None,
    Err(e) => {
      tracing::warn!(path = %path.display(), error = %e, "could not read credential file");
      None
    }
  }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
  match fs::remove_file(path) {
    Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
    _ => Ok(()),
  }
}
