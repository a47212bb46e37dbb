use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_VERSION: u64 = 1;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";

/// Environment variable that overrides the configured API URL.
pub const API_URL_ENV: &str = "TASKTREE_API_URL";

fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("tasktree")
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_version() -> u64 {
    CONFIG_VERSION
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ClientConfig {
    #[serde(default = "default_version")]
    pub version: u64,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Request timeout. `None` waits for the server indefinitely.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub debug_logging: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            api_url: default_api_url(),
            timeout_secs: None,
            debug_logging: false,
        }
    }
}

impl ClientConfig {
    pub fn config_path() -> PathBuf {
        default_config_dir().join("config.json")
    }

    /// Load from the default location, then apply the environment override.
    pub fn load() -> Self {
        let mut config = Self::load_from(&Self::config_path());
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.apply_api_url(&url);
        }
        config
    }

    /// Read a config file, falling back to defaults when it is missing or unreadable.
    pub fn load_from(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str::<Self>(&content) {
            Ok(config) if config.version == CONFIG_VERSION => config,
            Ok(config) => {
                log::warn!(
                    "Config {} has version {}, expected {}; using defaults",
                    path.display(),
                    config.version,
                    CONFIG_VERSION
                );
                Self::default()
            }
            Err(e) => {
                log::warn!("Failed to parse {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save_to(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    /// Write `url` into the config file at `path`, keeping its other settings.
    pub fn persist_api_url(path: &Path, url: &str) -> std::io::Result<Self> {
        let mut stored = Self::load_from(path);
        stored.apply_api_url(url);
        stored.save_to(path)?;
        log::info!("Saved API URL {} to {}", stored.api_url, path.display());
        Ok(stored)
    }

    /// Replace the API URL unless `url` is blank.
    pub fn apply_api_url(&mut self, url: &str) {
        let url = url.trim();
        if !url.is_empty() {
            self.api_url = url.trim_end_matches('/').to_string();
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}
