use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL of the character service; `/characters` is appended
  pub base_url: String,
  /// Items requested per page
  #[serde(default = "default_page_size")]
  pub page_size: u32,
  /// Per-request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// When false, pages are only cached in memory for the current run
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Database file (defaults to $XDG_DATA_HOME/charpage/cache.db)
  pub path: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      path: None,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Directory for daily rolling log files; stderr only when unset
  pub directory: Option<PathBuf>,
  /// Default filter directive, overridden by CHARPAGE_LOG or RUST_LOG
  #[serde(default = "default_filter")]
  pub filter: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      directory: None,
      filter: default_filter(),
    }
  }
}

fn default_page_size() -> u32 {
  20
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_true() -> bool {
  true
}

fn default_filter() -> String {
  "warn".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./charpage.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/charpage/config.yaml
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
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/charpage/config.yaml\n\
                 See charpage.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("charpage.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("charpage").join("config.yaml");
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

    if config.remote.page_size == 0 {
      return Err(eyre!("remote.page_size must be greater than zero"));
    }

    Ok(config)
  }

  /// Get the API token from the environment, if one is set.
  ///
  /// Checks CHARPAGE_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("CHARPAGE_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("remote:\n  base_url: https://example.com/v1/public\n").unwrap();

    assert_eq!(config.remote.page_size, 20);
    assert_eq!(config.remote.timeout_secs, 10);
    assert!(config.cache.enabled);
    assert!(config.cache.path.is_none());
    assert!(config.log.directory.is_none());
    assert_eq!(config.log.filter, "warn");
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
remote:
  base_url: https://example.com
  page_size: 50
  timeout_secs: 3
cache:
  enabled: false
  path: /tmp/chars.db
log:
  directory: /tmp/charpage-logs
  filter: debug
"#;
    let config = Config::parse(yaml).unwrap();

    assert_eq!(config.remote.page_size, 50);
    assert_eq!(config.remote.timeout_secs, 3);
    assert!(!config.cache.enabled);
    assert_eq!(config.cache.path, Some(PathBuf::from("/tmp/chars.db")));
    assert_eq!(config.log.filter, "debug");
  }

  #[test]
  fn test_zero_page_size_is_rejected() {
    let yaml = "remote:\n  base_url: https://example.com\n  page_size: 0\n";
    assert!(Config::parse(yaml).is_err());
  }

  #[test]
  fn test_missing_remote_is_rejected() {
    assert!(Config::parse("cache:\n  enabled: true\n").is_err());
  }

  #[test]
  fn test_load_from_explicit_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("charpage.yaml");
    std::fs::write(&path, "remote:\n  base_url: https://example.com\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.remote.base_url, "https://example.com");

    assert!(Config::load(Some(&dir.path().join("missing.yaml"))).is_err());
  }
}
