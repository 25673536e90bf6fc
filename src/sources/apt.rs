// src/sources/apt.rs

//! apt source adapter
//!
//! Managed configuration is a single repository list file under
//! `sources.list.d` plus signing keys in a keyring directory. Installed
//! packages come from `dpkg-query`.
//!
//! Manifest spec shape:
//!
//! ```yaml
//! apt:
//!   repos:
//!     - deb [signed-by=/etc/apt/keyrings/org.gpg] https://example.org/apt stable main
//!   keys:
//!     org: https://example.org/keys/org.gpg
//! ```

use crate::db::models::{InstalledApp, SourceIndex};
use crate::error::{Error, Result};
use crate::repository::RepositoryClient;
use crate::sources::process::{CommandLines, probe};
use crate::sources::traits::{InstalledIter, PackageSource};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, info};

/// File the managed repository entries are written to
pub const SOURCES_LIST: &str = "appdb.list";

const DEFAULT_SOURCES_DIR: &str = "/etc/apt/sources.list.d";
const DEFAULT_KEYRING_DIR: &str = "/etc/apt/keyrings";
const DEFAULT_DPKG_QUERY: &str = "dpkg-query";

/// Configuration the source manifest can require of apt
#[derive(Debug, Default, Deserialize)]
struct AptSpec {
    /// Repository lines, written verbatim to the managed list file
    #[serde(default)]
    repos: Vec<String>,

    /// Signing keys: keyring file name -> download URL
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

/// The apt package source
pub struct AptSource {
    sources_dir: PathBuf,
    keyring_dir: PathBuf,
    dpkg_query: String,
}

impl AptSource {
    /// Adapter over the host's real apt configuration
    pub fn new() -> Self {
        Self {
            sources_dir: PathBuf::from(DEFAULT_SOURCES_DIR),
            keyring_dir: PathBuf::from(DEFAULT_KEYRING_DIR),
            dpkg_query: DEFAULT_DPKG_QUERY.to_string(),
        }
    }

    /// Adapter with explicit paths and dpkg-query command
    ///
    /// Lets tests point the adapter at scratch directories and stub
    /// executables.
    pub fn with_paths(
        sources_dir: impl Into<PathBuf>,
        keyring_dir: impl Into<PathBuf>,
        dpkg_query: impl Into<String>,
    ) -> Self {
        Self {
            sources_dir: sources_dir.into(),
            keyring_dir: keyring_dir.into(),
            dpkg_query: dpkg_query.into(),
        }
    }

    fn parse_spec(&self, spec: &Value) -> Result<AptSpec> {
        serde_yaml::from_value(spec.clone()).map_err(Error::Yaml)
    }

    fn list_path(&self) -> PathBuf {
        self.sources_dir.join(SOURCES_LIST)
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.keyring_dir.join(format!("{}.gpg", name))
    }

    fn mismatch(&self, reason: String) -> Error {
        Error::ConfigurationMismatch {
            source_name: self.name().to_string(),
            reason,
        }
    }
}

impl Default for AptSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PackageSource for AptSource {
    fn name(&self) -> &'static str {
        "apt"
    }

    fn is_available(&self) -> bool {
        probe(&self.dpkg_query)
    }

    fn check_configuration(&self, spec: &Value) -> Result<()> {
        let spec = self.parse_spec(spec)?;
        let list_path = self.list_path();

        if !spec.repos.is_empty() {
            let contents = fs::read_to_string(&list_path).map_err(|_| {
                self.mismatch(format!("repository list {} is missing", list_path.display()))
            })?;

            let present: HashSet<&str> = contents
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .collect();

            for repo in &spec.repos {
                if !present.contains(repo.trim()) {
                    return Err(self.mismatch(format!(
                        "repository entry '{}' is missing from {}",
                        repo,
                        list_path.display()
                    )));
                }
            }
        }

        for name in spec.keys.keys() {
            let key_path = self.key_path(name);
            if !key_path.exists() {
                return Err(self.mismatch(format!(
                    "signing key {} is missing",
                    key_path.display()
                )));
            }
        }

        debug!("apt configuration matches the manifest");
        Ok(())
    }

    fn generate_configuration(&self, spec: &Value) -> Result<()> {
        let spec = self.parse_spec(spec)?;

        fs::create_dir_all(&self.sources_dir)?;

        let mut contents =
            String::from("# Managed by appdb; regenerated on every update-source run.\n");
        for repo in &spec.repos {
            contents.push_str(repo);
            contents.push('\n');
        }
        fs::write(self.list_path(), contents)?;
        info!(
            "Wrote {} repository entries to {}",
            spec.repos.len(),
            self.list_path().display()
        );

        if !spec.keys.is_empty() {
            fs::create_dir_all(&self.keyring_dir)?;
            let client = RepositoryClient::new()?;
            for (name, url) in &spec.keys {
                client.download_file(url, &self.key_path(name))?;
            }
            info!("Installed {} signing keys", spec.keys.len());
        }

        Ok(())
    }

    fn list_installed<'a>(&'a self, index: &'a SourceIndex) -> Result<InstalledIter<'a>> {
        let mut command = Command::new(&self.dpkg_query);
        // dpkg-query expands the \t and \n escapes itself
        command.args(["-W", "-f", "${Package}\\t${Version}\\n"]);

        let lines = CommandLines::spawn(self.name(), command)?;

        Ok(Box::new(lines.filter_map(move |line| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(Error::Io(e))),
            };

            let trimmed = line.trim();
            if trimmed.is_empty() {
                return None;
            }

            let (package, version) = match trimmed.split_once('\t') {
                Some((package, version)) => {
                    let version = version.trim();
                    (
                        package,
                        (!version.is_empty()).then(|| version.to_string()),
                    )
                }
                None => (trimmed, None),
            };

            let app_id = index
                .get(package)
                .cloned()
                .unwrap_or_else(|| package.to_string());

            Some(Ok(InstalledApp::new(
                app_id,
                "apt".to_string(),
                version,
            )))
        })))
    }
}
