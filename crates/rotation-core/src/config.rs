//! Application configuration management.
//!
//! Settings are read from a JSON file (by default
//! `<config dir>/rotation/config.json`). Every field has a default, so a
//! partial file or no file at all is valid; command-line flags are layered
//! on top by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::default_cache_directory;
use crate::catalog::DEFAULT_API_BASE_URL;
use crate::error::{Error, Result};
use crate::sync::{DEFAULT_PLAYLIST_NAME, DEFAULT_SAMPLE_SIZE, SyncOptions};

/// Default query server bind address.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default query server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Query server settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

const fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppConfig {
    /// Directory holding the entity cache and summaries file.
    #[serde(default = "default_cache_directory")]
    pub cache_directory: PathBuf,
    /// Catalog API root.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Bearer token for the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// User who owns the target playlist.
    #[serde(default)]
    pub self_user: String,
    /// User whose playlists are the sources.
    #[serde(default)]
    pub source_user: String,
    /// Target playlist name.
    #[serde(default = "default_playlist_name")]
    pub playlist_name: String,
    /// Tracks per rotation.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,
    /// Query server settings.
    #[serde(default)]
    pub server: ServerConfig,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_playlist_name() -> String {
    DEFAULT_PLAYLIST_NAME.to_string()
}

const fn default_sample_size() -> usize {
    DEFAULT_SAMPLE_SIZE
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_directory: default_cache_directory(),
            api_base_url: default_api_base_url(),
            access_token: None,
            self_user: String::new(),
            source_user: String::new(),
            playlist_name: default_playlist_name(),
            sample_size: DEFAULT_SAMPLE_SIZE,
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load the default config file, writing defaults when there is none.
    pub fn load() -> Result<Self> {
        let config_path = config_file_path();

        if !config_path.exists() {
            debug!("Config file not found, using defaults");
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                warn!("Failed to save default config: {}", e);
            }
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Load a config file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse config file: {e}")))?;

        info!("Loaded config from {}", path.display());
        debug!("Cache directory: {}", config.cache_directory.display());

        Ok(config)
    }

    /// Save to the default config file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its directory if needed.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Configuration(format!(
                    "Failed to create config directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| {
            Error::Configuration(format!(
                "Failed to write config file {}: {e}",
                path.display()
            ))
        })?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Check that a sync run can start with these settings.
    pub fn validate_for_sync(&self) -> Result<()> {
        self.sync_options(false).validate()?;

        if self.access_token.as_deref().is_none_or(|t| t.trim().is_empty()) {
            return Err(Error::configuration(
                "an access token is required to sync (set ROTATION_ACCESS_TOKEN)",
            ));
        }

        Ok(())
    }

    /// Check that the query server can start with these settings.
    pub fn validate_for_serve(&self) -> Result<()> {
        if self.server.host.trim().is_empty() {
            return Err(Error::configuration("server host is empty"));
        }
        Ok(())
    }

    /// Sync options derived from these settings.
    #[must_use]
    pub fn sync_options(&self, dry_run: bool) -> SyncOptions {
        SyncOptions::new(self.self_user.clone(), self.source_user.clone())
            .with_playlist_name(self.playlist_name.clone())
            .with_size(self.sample_size)
            .with_dry_run(dry_run)
    }

    /// Path of the default config file.
    #[must_use]
    pub fn config_file_path() -> PathBuf {
        config_file_path()
    }
}

fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join("rotation")
        .join("config.json")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn ready() -> AppConfig {
        AppConfig {
            self_user: "me".to_string(),
            source_user: "me".to_string(),
            access_token: Some("token".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.playlist_name, "discovery monthly");
        assert_eq!(config.sample_size, 30);
        assert_eq!(config.api_base_url, "https://api.spotify.com/v1");
        assert_eq!(config.server.bind_address(), "127.0.0.1:8080");
        assert!(config.access_token.is_none());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, r#"{"self_user":"me","server":{"port":9000}}"#).unwrap();

        let config = AppConfig::load_from(&path).expect("load");
        assert_eq!(config.self_user, "me");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.sample_size, DEFAULT_SAMPLE_SIZE);
    }

    #[test]
    fn test_malformed_file_is_configuration_error() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_save_and_reload() {
        let temp_dir = TempDir::new().expect("Should create temp dir");
        let path = temp_dir.path().join("nested").join("config.json");

        let config = ready();
        config.save_to(&path).expect("save");
        assert_eq!(AppConfig::load_from(&path).expect("load"), config);
    }

    #[test]
    fn test_validate_for_sync() {
        assert!(ready().validate_for_sync().is_ok());

        let no_token = AppConfig {
            access_token: None,
            ..ready()
        };
        assert!(no_token.validate_for_sync().is_err());

        let blank_token = AppConfig {
            access_token: Some("  ".to_string()),
            ..ready()
        };
        assert!(blank_token.validate_for_sync().is_err());

        let no_user = AppConfig {
            source_user: String::new(),
            ..ready()
        };
        assert!(no_user.validate_for_sync().is_err());
    }

    #[test]
    fn test_serve_does_not_need_credentials() {
        assert!(AppConfig::default().validate_for_serve().is_ok());
    }

    #[test]
    fn test_sync_options_from_config() {
        let options = AppConfig {
            sample_size: 12,
            playlist_name: "weekly".to_string(),
            ..ready()
        }
        .sync_options(true);
        assert_eq!(options.size, 12);
        assert_eq!(options.playlist_name, "weekly");
        assert!(options.dry_run);
    }
}
