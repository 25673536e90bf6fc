// src/config.rs

//! Process-wide configuration
//!
//! Settings are loaded once at startup from a TOML file and passed by
//! reference into every component that needs them. A missing file is not
//! an error; built-in defaults apply.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "/etc/appdb/config.toml";

/// Environment variable overriding the configuration file location
pub const CONFIG_PATH_ENV: &str = "APPDB_CONFIG";

/// Default base URL the manifests are fetched from
const DEFAULT_REPO_URL: &str = "https://apps.example.org/";

/// Default database file location
const DEFAULT_DB_PATH: &str = "/var/lib/appdb/appdb.db";

/// Process-wide settings, read-only after startup
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the remote repository serving the YAML manifests
    pub repo_url: String,

    /// Location of the SQLite database file
    pub db_path: PathBuf,

    /// Verbose output (raises the log level to debug)
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_url: DEFAULT_REPO_URL.to_string(),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            verbose: false,
        }
    }
}

impl Config {
    /// Load the configuration from its default location
    ///
    /// Resolution order: `$APPDB_CONFIG` if set, else
    /// `/etc/appdb/config.toml`. A file that does not exist yields the
    /// built-in defaults; a file that exists but cannot be read or parsed
    /// is an error.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => PathBuf::from(path),
            Err(_) => PathBuf::from(DEFAULT_CONFIG_PATH),
        };

        if !path.exists() {
            debug!(
                "No configuration file at {}, using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load the configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }
}
