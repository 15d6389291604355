//! Client configuration
//!
//! Holds the Dropbox app credentials, the endpoint hosts and the popup
//! geometry. Persisted as JSON in the platform config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

/// Errors that can occur while loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing the config file failed
    #[error("Config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid JSON for this schema
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds an unusable value
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// No platform config directory could be determined
    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Endpoint hosts, without trailing slash
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hosts {
    /// Metadata / control host
    #[serde(default = "default_api_host")]
    pub api: String,
    /// File content host
    #[serde(default = "default_content_host")]
    pub content: String,
    /// Host serving the authorization page
    #[serde(default = "default_auth_host")]
    pub auth: String,
}

fn default_api_host() -> String {
    "https://api.dropboxapi.com".to_string()
}

fn default_content_host() -> String {
    "https://content.dropboxapi.com".to_string()
}

fn default_auth_host() -> String {
    "https://www.dropbox.com".to_string()
}

impl Default for Hosts {
    fn default() -> Self {
        Self {
            api: default_api_host(),
            content: default_content_host(),
            auth: default_auth_host(),
        }
    }
}

impl Hosts {
    /// Points every host at one base URL (for testing against a mock server)
    pub fn single(base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        Self {
            api: base.clone(),
            content: base.clone(),
            auth: base,
        }
    }
}

/// Size and position of the authorization popup, in logical pixels
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PopupGeometry {
    pub width: f64,
    pub height: f64,
    pub left: f64,
    pub top: f64,
}

impl Default for PopupGeometry {
    fn default() -> Self {
        Self {
            width: 540.0,
            height: 960.0,
            left: 0.0,
            top: 0.0,
        }
    }
}

/// Configuration for a [`DropboxClient`](crate::DropboxClient)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
    /// Dropbox app key, sent as `client_id`
    pub app_key: String,
    /// Redirect URI registered for the app
    pub redirect_uri: String,
    /// Endpoint hosts
    #[serde(default)]
    pub hosts: Hosts,
    /// Authorization popup geometry
    #[serde(default)]
    pub popup: PopupGeometry,
}

impl ClientConfig {
    /// Creates a configuration with default hosts and popup geometry
    pub fn new(app_key: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        Self {
            app_key: app_key.into(),
            redirect_uri: redirect_uri.into(),
            hosts: Hosts::default(),
            popup: PopupGeometry::default(),
        }
    }

    /// Replaces the endpoint hosts
    pub fn with_hosts(mut self, hosts: Hosts) -> Self {
        self.hosts = hosts;
        self
    }

    /// Replaces the popup geometry
    pub fn with_popup(mut self, popup: PopupGeometry) -> Self {
        self.popup = popup;
        self
    }

    /// Checks that the app key is set and every URL is absolute
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.app_key.trim().is_empty() {
            return Err(ConfigError::Invalid("app_key is empty".into()));
        }

        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("hosts.api", &self.hosts.api),
            ("hosts.content", &self.hosts.content),
            ("hosts.auth", &self.hosts.auth),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{} is not a valid URL: {}", name, e)))?;
        }

        Ok(())
    }

    /// Gets the config directory path (cross-platform)
    fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("dbxlink"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/dbxlink"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("dbxlink"))
        }
    }

    /// Gets the default config file path
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        Self::config_dir()
            .map(|dir| dir.join("config.json"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// Loads configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::default_path()?)
    }

    /// Loads and validates configuration from a file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        tracing::debug!("Loaded config from {:?}", path.as_ref());
        Ok(config)
    }

    /// Saves configuration to the default path
    pub fn save(&self) -> Result<PathBuf, ConfigError> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Saves configuration to a file, creating parent directories as needed
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }
}
