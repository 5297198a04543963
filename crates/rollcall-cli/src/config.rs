//! Application configuration: `rollcall.toml` overlaid with `ROLLCALL_*`
//! environment variables. Nested keys use a double underscore, e.g.
//! `ROLLCALL_INBOX__DEDUPE=true`.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use rollcall_engine::{InboxConfig, SyncConfig};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  /// SQLite cache file.
  pub store_path:   PathBuf,
  /// Directory holding the face artifact images.
  pub artifact_dir: PathBuf,
  pub sync:         SyncConfig,
  pub inbox:        InboxConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      store_path:   PathBuf::from("~/.local/share/rollcall/cache.db"),
      artifact_dir: PathBuf::from("~/.local/share/rollcall/faces"),
      sync:         SyncConfig::default(),
      inbox:        InboxConfig::default(),
    }
  }
}

impl AppConfig {
  /// Read `path` if it exists, then apply environment overrides. Paths come
  /// back with `~` expanded.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("ROLLCALL")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: AppConfig =
      settings.try_deserialize().context("failed to deserialise AppConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    cfg.artifact_dir = expand_tilde(&cfg.artifact_dir);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
