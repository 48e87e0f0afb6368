//! Application settings loaded from config.toml
//!
//! Settings are optional: a missing config.toml yields the defaults, and the
//! `DATABASE_URL` environment variable always wins over the file.

use crate::config::database::DEFAULT_DATABASE_URL;
use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Settings {
    /// Connection string for the ledger store
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// `tracing` filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Parses settings from TOML text.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })
    }

    /// Applies environment overrides on top of the loaded values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database_url = url;
        }
        self
    }
}

/// Loads settings from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    Settings::from_toml(&contents)
}

/// Loads settings from ./config.toml when present, falling back to defaults,
/// then applies environment overrides.
pub fn load_default_settings() -> Result<Settings> {
    let path = Path::new("config.toml");
    let settings = if path.exists() {
        load_settings(path)?
    } else {
        tracing::debug!("No config.toml found, using default settings");
        Settings::default()
    };
    Ok(settings.with_env_overrides())
}
