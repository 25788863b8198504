use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Environment variable that overrides `api.url`
pub const API_URL_ENV: &str = "PXP_API_URL";

pub const DEFAULT_API_URL: &str = "http://localhost:8101";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub api: ApiConfig,
  /// Custom title for header (defaults to the API host if not set)
  pub title: Option<String>,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_api_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      url: default_api_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

/// How the cached list reacts to a successful mutation
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CachePolicy {
  /// Patch the cached list from the mutation's response
  #[default]
  Patch,
  /// Mark the list stale and fetch it again
  Refetch,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Seconds a fetched list is served without refetching
  #[serde(default = "default_stale_secs")]
  pub stale_secs: u64,
  #[serde(default)]
  pub policy: CachePolicy,
  /// Keep the last known list on disk for offline start
  #[serde(default = "default_persist")]
  pub persist: bool,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      stale_secs: default_stale_secs(),
      policy: CachePolicy::default(),
      persist: default_persist(),
    }
  }
}

fn default_api_url() -> String {
  DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_stale_secs() -> u64 {
  10
}

fn default_persist() -> bool {
  true
}

impl Config {
  /// Load configuration.
  ///
  /// Search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./pxp.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/pxp/config.yaml
  ///
  /// With no file found the defaults are used. `PXP_API_URL` overrides the
  /// file's `api.url` either way.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Config::default(),
    };

    if let Ok(url) = std::env::var(API_URL_ENV) {
      if !url.trim().is_empty() {
        config.api.url = url.trim().to_string();
      }
    }

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("pxp.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("pxp").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty file is valid and means "all defaults"
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Replace the API URL (command line override) and re-validate
  pub fn with_api_url(mut self, url: String) -> Result<Self> {
    self.api.url = url;
    self.validate()?;
    Ok(self)
  }

  fn validate(&self) -> Result<()> {
    let url = Url::parse(&self.api.url)
      .map_err(|e| eyre!("Invalid api.url '{}': {}", self.api.url, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!(
        "Invalid api.url '{}': scheme must be http or https",
        self.api.url
      ));
    }
    if self.api.timeout_secs == 0 {
      return Err(eyre!("api.timeout_secs must be greater than zero"));
    }
    Ok(())
  }

  /// Header title: explicit `title` or the API host
  pub fn display_title(&self) -> String {
    if let Some(title) = &self.title {
      return title.clone();
    }
    Url::parse(&self.api.url)
      .ok()
      .and_then(|u| {
        let host = u.host_str()?.to_string();
        Some(match u.port() {
          Some(port) => format!("{host}:{port}"),
          None => host,
        })
      })
      .unwrap_or_else(|| self.api.url.clone())
  }
}
