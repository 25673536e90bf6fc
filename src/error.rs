// src/error.rs

use thiserror::Error;

/// Core error types for appdb
#[derive(Error, Debug)]
pub enum Error {
    /// Transport-level failure while talking to the remote repository
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote repository answered with a non-success status
    #[error("Download failed: {0}")]
    Download(String),

    /// Malformed YAML in a remote manifest
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A manifest parsed as YAML but does not have the expected shape
    #[error("Manifest schema error: {0}")]
    Schema(String),

    /// JSON encoding of stored app fields failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file exists but could not be loaded
    #[error("Failed to load configuration: {0}")]
    Config(String),

    /// A source's on-disk configuration disagrees with the manifest
    #[error("Source '{source_name}' is misconfigured: {reason}")]
    ConfigurationMismatch { source_name: String, reason: String },

    /// A privileged command was invoked without root
    #[error("This command must be run as root")]
    PrivilegeRequired,

    /// The underlying package manager is not present on this host
    #[error("Source '{0}' is not available on this host")]
    SourceUnavailable(String),

    /// A package-manager command ran but reported failure
    #[error("Command '{command}' failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// Result type alias using appdb's Error type
pub type Result<T> = std::result::Result<T, Error>;
