//! Client configuration management.
//!
//! This module handles loading and saving the client configuration: the
//! remote base URL, the application id/token pair issued by the remote
//! system, the last used login email and the transport timeouts.
//!
//! Configuration is stored at `~/.config/osmcache/config.json`; the
//! `OSM_BASE_URL`, `OSM_APP_ID` and `OSM_APP_TOKEN` environment variables
//! take precedence over the file.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{OsmError, Result};

/// Application name used for config/cache directory paths
pub const APP_NAME: &str = "osmcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Default remote endpoint root
pub const DEFAULT_BASE_URL: &str = "https://www.onlinescoutmanager.co.uk";

/// Connect timeout in seconds. Kept short: there is no retry, so a dead
/// host should surface quickly.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Whole-request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_token: String,
    #[serde(default)]
    pub last_email: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            app_id: String::new(),
            app_token: String::new(),
            last_email: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl ClientConfig {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_env();
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| OsmError::Config(format!("read {}: {}", path.display(), e)))?;
            serde_json::from_str(&contents)
                .map_err(|e| OsmError::Config(format!("parse {}: {}", path.display(), e)))
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let io_err =
            |e: std::io::Error| OsmError::Config(format!("write {}: {}", path.display(), e));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| OsmError::Config(e.to_string()))?;
        std::fs::write(path, contents).map_err(io_err)
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("OSM_BASE_URL") {
            self.base_url = url;
        }
        if let Ok(id) = std::env::var("OSM_APP_ID") {
            self.app_id = id;
        }
        if let Ok(token) = std::env::var("OSM_APP_TOKEN") {
            self.app_token = token;
        }
    }

    /// Missing application credentials make every call pointless.
    pub fn validate(&self) -> Result<()> {
        if self.app_id.trim().is_empty() {
            return Err(OsmError::Config("application id is not set".to_string()));
        }
        if self.app_token.trim().is_empty() {
            return Err(OsmError::Config("application token is not set".to_string()));
        }
        if self.base_url.trim().is_empty() {
            return Err(OsmError::Config("base URL is not set".to_string()));
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| OsmError::Config("Could not find config directory".to_string()))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding persisted sessions and logs.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| OsmError::Config("Could not find cache directory".to_string()))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
