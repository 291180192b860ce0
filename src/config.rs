use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub throttle: ThrottleConfig,
  pub cache: CacheConfig,
  pub log: LogConfig,
}

/// Limits for user-triggered refreshes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
  /// Calls admitted per interval
  pub limit: usize,
  pub interval_secs: u64,
}

impl Default for ThrottleConfig {
  fn default() -> Self {
    Self {
      limit: 5,
      interval_secs: 10,
    }
  }
}

impl ThrottleConfig {
  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// How long a fetched record stays fresh
  pub ttl_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { ttl_secs: 30 }
  }
}

impl CacheConfig {
  pub fn ttl(&self) -> Duration {
    Duration::from_secs(self.ttl_secs)
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive, overridden by `RUST_LOG`
  pub level: String,
  /// Write daily log files here instead of stderr
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file, falling back to defaults.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./shiftclock.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shiftclock/config.yaml
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
    // Check current directory
    let local = PathBuf::from("shiftclock.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shiftclock").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to load config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config =
      serde_yaml::from_str(contents).map_err(|e| eyre!("Invalid config: {}", e))?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.throttle.limit == 0 {
      return Err(eyre!("throttle.limit must be greater than zero"));
    }
    if self.throttle.interval_secs == 0 {
      return Err(eyre!("throttle.interval_secs must be greater than zero"));
    }
    if self.cache.ttl_secs == 0 {
      return Err(eyre!("cache.ttl_secs must be greater than zero"));
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  #[test]
  fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.throttle.limit, 5);
    assert_eq!(config.throttle.interval(), Duration::from_secs(10));
    assert_eq!(config.cache.ttl(), Duration::from_secs(30));
    assert_eq!(config.log.level, "info");
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_partial_yaml_keeps_defaults() {
    let config = Config::from_yaml("throttle:\n  limit: 2\n").unwrap();
    assert_eq!(config.throttle.limit, 2);
    assert_eq!(config.throttle.interval_secs, 10);
    assert_eq!(config.cache.ttl_secs, 30);
  }

  #[test]
  fn test_zero_values_are_rejected() {
    assert!(Config::from_yaml("throttle:\n  limit: 0\n").is_err());
    assert!(Config::from_yaml("throttle:\n  interval_secs: 0\n").is_err());
    assert!(Config::from_yaml("cache:\n  ttl_secs: 0\n").is_err());
  }

  #[test]
  fn test_load_explicit_path() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cache:\n  ttl_secs: 90\nlog:\n  level: debug").unwrap();

    let config = Config::load(Some(file.path())).unwrap();
    assert_eq!(config.cache.ttl_secs, 90);
    assert_eq!(config.log.level, "debug");
  }

  #[test]
  fn test_missing_explicit_path_is_an_error() {
    let err = Config::load(Some(Path::new("/definitely/not/here.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
