//! Application configuration: an optional TOML file layered with
//! `DIALTRACE__*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use dialtrace_engine::EngineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
  pub host:       String,
  pub port:       u16,
  /// SQLite database file. A leading `~/` is expanded.
  pub store_path: PathBuf,
  pub engine:     EngineConfig,
}

impl Default for AppConfig {
  fn default() -> Self {
    Self {
      host:       "127.0.0.1".to_owned(),
      port:       8080,
      store_path: PathBuf::from("~/.local/share/dialtrace/history.db"),
      engine:     EngineConfig::default(),
    }
  }
}

impl AppConfig {
  /// Read `path` if it exists, then apply environment overrides such as
  /// `DIALTRACE__PORT=9000` or `DIALTRACE__ENGINE__CACHE_TTL_SECS=0`.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("DIALTRACE")
          .prefix_separator("__")
          .separator("__"),
      )
      .build()
      .context("failed to read config file")?;

    let mut cfg: AppConfig = settings
      .try_deserialize()
      .context("failed to deserialise AppConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
