// src/repository/mod.rs

//! Remote repository access
//!
//! This module provides functionality for:
//! - Fetching the YAML manifests from the configured base URL
//! - Downloading source support files (apt signing keys)
//!
//! Fetches are single-attempt and fail fast; a network or parse failure
//! aborts the current command.

pub mod manifest;

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Name of the remote document describing the package sources
pub const SOURCE_MANIFEST: &str = "sourceconf.yaml";

/// Name of the remote document describing the app catalog
pub const CATALOG_MANIFEST: &str = "repo.yaml";

/// Join a manifest name onto the configured base repository URL
pub fn manifest_url(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}

/// HTTP client wrapper for the remote repository
pub struct RepositoryClient {
    client: Client,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(Error::Network)?;

        Ok(Self { client })
    }

    /// Fetch and parse a YAML document from `url`
    ///
    /// A non-success status or a transport failure is a network-level
    /// error; malformed YAML is a parse error. One attempt, no retries.
    pub fn fetch_yaml(&self, url: &str) -> Result<serde_yaml::Value> {
        info!("Fetching manifest from {}", url);

        let response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response.text()?;
        let document = serde_yaml::from_str(&body)?;

        debug!("Fetched and parsed {}", url);
        Ok(document)
    }

    /// Download a file to the specified path
    ///
    /// Writes to a temporary sibling first, then renames into place, so a
    /// partial download never replaces an existing file.
    pub fn download_file(&self, url: &str, dest_path: &Path) -> Result<()> {
        info!("Downloading {} to {}", url, dest_path.display());

        // Create parent directory if it doesn't exist
        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut response = self.client.get(url).send()?;

        if !response.status().is_success() {
            return Err(Error::Download(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let temp_path = dest_path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        io::copy(&mut response, &mut file)?;
        fs::rename(&temp_path, dest_path)?;

        debug!("Downloaded {}", dest_path.display());
        Ok(())
    }
}
