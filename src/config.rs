use anyhow::{Context, Result, anyhow, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

use crate::constants::constants;
use crate::store::is_valid_key;

/// User preferences from `config.toml`. Every field is optional; gaps are
/// filled from the environment, the command line and finally built-in defaults.
#[derive(Serialize, Deserialize, Default, Debug, Clone, PartialEq, Eq)]
pub struct Config {
  pub api_key: Option<String>,
  pub base_url: Option<String>,
  pub storage_key: Option<String>,
  pub request_timeout_secs: Option<u64>,
  pub debounce_ms: Option<u64>,
  pub theme_name: Option<String>,
  pub log_level: Option<String>,
}

/// Fully resolved runtime settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
  pub api_key: String,
  pub base_url: String,
  pub storage_key: String,
  pub timeout: Duration,
  pub debounce: Duration,
  pub log_level: String,
}

fn project_dirs() -> Option<ProjectDirs> {
  ProjectDirs::from("", "", "popcorn")
}

/// Default location of the watched list and the log file.
pub fn default_data_dir() -> Option<PathBuf> {
  project_dirs().map(|d| d.data_dir().to_path_buf())
}

impl Config {
  pub fn path() -> Option<PathBuf> {
    project_dirs().map(|d| d.config_dir().join("config.toml"))
  }

  /// Read the config file. A missing file is an empty config; an unreadable
  /// one is an error so the caller can report it once logging is up.
  pub fn load() -> Result<Self> {
    match Self::path() {
      Some(path) => Self::read_from(&path),
      None => Ok(Self::default()),
    }
  }

  pub fn read_from(path: &Path) -> Result<Self> {
    let content = match std::fs::read_to_string(path) {
      Ok(content) => content,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
      Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
  }

  pub fn save(&self) {
    if let Some(path) = Self::path()
      && let Err(e) = self.save_to(&path)
    {
      warn!(err = %e, "failed to save preferences");
    }
  }

  pub fn save_to(&self, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
      std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string(self).context("Failed to encode preferences")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
  }

  /// Layer `other` on top of `self`; fields set in `other` win.
  pub fn merge(self, other: Config) -> Config {
    Config {
      api_key: other.api_key.or(self.api_key),
      base_url: other.base_url.or(self.base_url),
      storage_key: other.storage_key.or(self.storage_key),
      request_timeout_secs: other.request_timeout_secs.or(self.request_timeout_secs),
      debounce_ms: other.debounce_ms.or(self.debounce_ms),
      theme_name: other.theme_name.or(self.theme_name),
      log_level: other.log_level.or(self.log_level),
    }
  }

  /// The `OMDB_API_KEY` / `OMDB_BASE_URL` layer.
  pub fn from_env(lookup: impl Fn(&str) -> Option<String>) -> Config {
    let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
    Config { api_key: non_empty("OMDB_API_KEY"), base_url: non_empty("OMDB_BASE_URL"), ..Config::default() }
  }

  pub fn settings(&self) -> Result<Settings> {
    let api_key = self.api_key.clone().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
      anyhow!("No API key configured. Set OMDB_API_KEY, pass --api-key, or add api_key to config.toml")
    })?;
    let c = constants();
    let storage_key = self.storage_key.clone().unwrap_or_else(|| c.default_storage_key.clone());
    if !is_valid_key(&storage_key) {
      bail!("Invalid storage key '{}': use only letters, digits, '-' and '_'", storage_key);
    }
    Ok(Settings {
      api_key,
      base_url: self.base_url.clone().unwrap_or_else(|| c.default_base_url.clone()),
      storage_key,
      timeout: Duration::from_secs(self.request_timeout_secs.unwrap_or(c.default_timeout_secs).max(1)),
      debounce: Duration::from_millis(self.debounce_ms.unwrap_or(c.default_debounce_ms)),
      log_level: self.log_level.clone().unwrap_or_else(|| "info".to_string()),
    })
  }
}
