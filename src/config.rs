use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_TTL_SECS;

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
  pub database: DatabaseConfig,
  pub cache: CacheConfig,
  pub log: LogConfig,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatabaseConfig {
  /// SQLite file (defaults to <data dir>/issue-charts/charts.db)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct CacheConfig {
  /// Serve line charts through the cache
  pub enabled: bool,
  /// SQLite cache file (defaults to <data dir>/issue-charts/cache.db)
  pub path: Option<PathBuf>,
  /// Seconds a cached chart is served before it is recomputed
  pub ttl_secs: i64,
}

impl CacheConfig {
  /// Entry lifetime, or `None` when `ttl_secs` is not positive or too large
  /// to represent.
  pub fn ttl(&self) -> Option<Duration> {
    Duration::try_seconds(self.ttl_secs).filter(|ttl| *ttl > Duration::zero())
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
      ttl_secs: DEFAULT_TTL_SECS,
    }
  }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive used when ISSUE_CHARTS_LOG is unset
  pub level: String,
  /// Directory for daily log files
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      dir: None,
    }
  }
}

impl LogConfig {
  /// Configured log directory, falling back to <data dir>/issue-charts/logs.
  pub fn resolved_dir(&self) -> Option<PathBuf> {
    self
      .dir
      .clone()
      .or_else(|| dirs::data_dir().map(|d| d.join("issue-charts").join("logs")))
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./issue-charts.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/issue-charts/config.yaml
  ///
  /// Without any file the defaults apply.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("issue-charts.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("issue-charts").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.cache.ttl().is_none() {
      return Err(eyre!(
        "cache.ttl_secs must be a positive number of seconds, got {}",
        config.cache.ttl_secs
      ));
    }
    Ok(config)
  }
}
