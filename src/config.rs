use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::StaleTimes;
use crate::cache::{CacheConfig, RetryPolicy};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheSettings,
  /// Custom title for header
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_url")]
  pub url: String,
  #[serde(default = "default_timeout")]
  pub timeout_secs: u64,
  /// Language requested for interpretations
  #[serde(default = "default_language")]
  pub language: String,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_url(),
      timeout_secs: default_timeout(),
      language: default_language(),
    }
  }
}

fn default_url() -> String {
  "http://localhost:8000".to_string()
}

fn default_timeout() -> u64 {
  30
}

fn default_language() -> String {
  "ru".to_string()
}

/// Cache windows, in seconds.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CacheSettings {
  pub list_stale_secs: u64,
  pub detail_stale_secs: u64,
  pub search_stale_secs: u64,
  pub user_stale_secs: u64,
  pub default_stale_secs: u64,
  pub gc_secs: u64,
  pub max_retries: u32,
}

impl Default for CacheSettings {
  fn default() -> Self {
    Self {
      list_stale_secs: 2 * 60,
      detail_stale_secs: 5 * 60,
      search_stale_secs: 60,
      user_stale_secs: 5 * 60,
      default_stale_secs: 60,
      gc_secs: 5 * 60,
      max_retries: 3,
    }
  }
}

impl CacheSettings {
  pub fn cache_config(&self) -> CacheConfig {
    CacheConfig {
      default_stale: Duration::from_secs(self.default_stale_secs),
      gc_time: Duration::from_secs(self.gc_secs),
      retry: RetryPolicy {
        max_retries: self.max_retries,
        ..RetryPolicy::default()
      },
    }
  }

  pub fn stale_times(&self) -> StaleTimes {
    StaleTimes {
      list: Duration::from_secs(self.list_stale_secs),
      detail: Duration::from_secs(self.detail_stale_secs),
      search: Duration::from_secs(self.search_stale_secs),
      user: Duration::from_secs(self.user_stale_secs),
    }
  }
}

impl ApiConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dreambook.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dreambook/config.yaml
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
    let local = PathBuf::from("dreambook.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dreambook").join("config.yaml");
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

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // an empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_empty_file_uses_defaults() {
    let config = Config::parse("").unwrap();
    assert_eq!(config.api.url, "http://localhost:8000");
    assert_eq!(config.cache, CacheSettings::default());
    assert_eq!(config.cache.stale_times(), StaleTimes::default());
  }

  #[test]
  fn test_partial_sections_fill_in_defaults() {
    let config = Config::parse(
      r#"
api:
  url: https://dreams.example.com
  language: en
cache:
  list_stale_secs: 30
  max_retries: 0
"#,
    )
    .unwrap();

    assert_eq!(config.api.url, "https://dreams.example.com");
    assert_eq!(config.api.language, "en");
    assert_eq!(config.api.timeout(), Duration::from_secs(30));
    assert_eq!(config.cache.stale_times().list, Duration::from_secs(30));
    assert_eq!(config.cache.stale_times().detail, Duration::from_secs(300));
    assert_eq!(config.cache.cache_config().retry.max_retries, 0);
  }

  #[test]
  fn test_missing_explicit_file_is_an_error() {
    assert!(Config::load(Some(Path::new("/definitely/not/here.yaml"))).is_err());
  }
}
