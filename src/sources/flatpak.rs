// src/sources/flatpak.rs

//! flatpak source adapter
//!
//! Flatpak keeps its remote configuration internally, so both checking
//! and regeneration go through the `flatpak` CLI rather than files on
//! disk. Installed apps come from `flatpak list`.
//!
//! Manifest spec shape:
//!
//! ```yaml
//! flatpak:
//!   remotes:
//!     flathub: https://dl.flathub.org/repo/flathub.flatpakrepo
//! ```

use crate::db::models::{InstalledApp, SourceIndex};
use crate::error::{Error, Result};
use crate::sources::process::{CommandLines, probe, run};
use crate::sources::traits::{InstalledIter, PackageSource};
use serde::Deserialize;
use serde_yaml::Value;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, info};

const DEFAULT_FLATPAK: &str = "flatpak";

/// Configuration the source manifest can require of flatpak
#[derive(Debug, Default, Deserialize)]
struct FlatpakSpec {
    /// Required remotes: remote name -> location
    ///
    /// The location is either a repo URL or a `.flatpakrepo` description
    /// file; flatpak resolves the latter itself.
    #[serde(default)]
    remotes: BTreeMap<String, String>,
}

/// The flatpak package source
pub struct FlatpakSource {
    flatpak: String,
}

impl FlatpakSource {
    /// Adapter over the host's flatpak installation
    pub fn new() -> Self {
        Self {
            flatpak: DEFAULT_FLATPAK.to_string(),
        }
    }

    /// Adapter with an explicit flatpak command
    ///
    /// Lets tests substitute a stub executable.
    pub fn with_command(command: impl Into<String>) -> Self {
        Self {
            flatpak: command.into(),
        }
    }

    fn parse_spec(&self, spec: &Value) -> Result<FlatpakSpec> {
        serde_yaml::from_value(spec.clone()).map_err(Error::Yaml)
    }

    fn mismatch(&self, reason: String) -> Error {
        Error::ConfigurationMismatch {
            source_name: self.name().to_string(),
            reason,
        }
    }

    fn invoke(&self, args: &[&str]) -> Result<String> {
        let mut command = Command::new(&self.flatpak);
        command.args(args);
        run(self.name(), &mut command)
    }

    /// Remotes currently configured on the host, name -> reported URL
    fn current_remotes(&self) -> Result<BTreeMap<String, String>> {
        let out = self.invoke(&["remotes", "--columns=name,url"])?;

        let mut remotes = BTreeMap::new();
        for line in out.lines() {
            let mut parts = line.split_whitespace();
            if let Some(name) = parts.next() {
                let url = parts.next().unwrap_or("").to_string();
                remotes.insert(name.to_string(), url);
            }
        }
        Ok(remotes)
    }
}

impl Default for FlatpakSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a configured remote satisfies the spec location
///
/// `.flatpakrepo` locations are resolved by flatpak to a repo URL we
/// cannot reconstruct, so only the remote's existence can be verified.
fn location_matches(spec_location: &str, actual_url: &str) -> bool {
    if spec_location.ends_with(".flatpakrepo") {
        return true;
    }
    spec_location.trim_end_matches('/') == actual_url.trim_end_matches('/')
}

impl PackageSource for FlatpakSource {
    fn name(&self) -> &'static str {
        "flatpak"
    }

    fn is_available(&self) -> bool {
        probe(&self.flatpak)
    }

    fn check_configuration(&self, spec: &Value) -> Result<()> {
        let spec = self.parse_spec(spec)?;
        if spec.remotes.is_empty() {
            return Ok(());
        }

        let current = self.current_remotes()?;
        for (name, location) in &spec.remotes {
            match current.get(name) {
                None => {
                    return Err(self.mismatch(format!("remote '{}' is not configured", name)));
                }
                Some(url) if !location_matches(location, url) => {
                    return Err(self.mismatch(format!(
                        "remote '{}' points at {} instead of {}",
                        name, url, location
                    )));
                }
                _ => {}
            }
        }

        debug!("flatpak remotes match the manifest");
        Ok(())
    }

    fn generate_configuration(&self, spec: &Value) -> Result<()> {
        let spec = self.parse_spec(spec)?;
        if spec.remotes.is_empty() {
            return Ok(());
        }

        let current = self.current_remotes()?;
        for (name, location) in &spec.remotes {
            match current.get(name) {
                None => {
                    self.invoke(&["remote-add", "--if-not-exists", name, location])?;
                    info!("Added flatpak remote '{}'", name);
                }
                Some(url) if !location_matches(location, url) => {
                    let url_arg = format!("--url={}", location);
                    self.invoke(&["remote-modify", &url_arg, name])?;
                    info!("Repointed flatpak remote '{}' at {}", name, location);
                }
                _ => debug!("flatpak remote '{}' already configured", name),
            }
        }

        Ok(())
    }

    fn list_installed<'a>(&'a self, index: &'a SourceIndex) -> Result<InstalledIter<'a>> {
        let mut command = Command::new(&self.flatpak);
        command.args(["list", "--app", "--columns=application,version"]);

        let lines = CommandLines::spawn(self.name(), command)?;

        Ok(Box::new(lines.filter_map(move |line| {
            let line = match line {
                Ok(line) => line,
                Err(e) => return Some(Err(Error::Io(e))),
            };

            let mut parts = line.split_whitespace();
            let application = parts.next()?;
            let version = parts.next().map(str::to_string);

            let app_id = index
                .get(application)
                .cloned()
                .unwrap_or_else(|| application.to_string());

            Some(Ok(InstalledApp::new(
                app_id,
                "flatpak".to_string(),
                version,
            )))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn spec(yaml: &str) -> Value {
        serde_yaml::from_str(yaml).unwrap()
    }

    /// Stub flatpak that answers `remotes` and `list` with canned output
    fn fake_flatpak(dir: &Path, remotes: &str, list: &str) -> String {
        let path = dir.join("fake-flatpak");
        let script = format!(
            "#!/bin/sh\ncase \"$1\" in\n  remotes) printf '{}' ;;\n  list) printf '{}' ;;\n  *) exit 0 ;;\nesac\n",
            remotes, list
        );
        fs::write(&path, script).unwrap();
        let mut perms = fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_check_matching_remote() {
        let dir = TempDir::new().unwrap();
        let adapter = FlatpakSource::with_command(fake_flatpak(
            dir.path(),
            "flathub\\thttps://dl.flathub.org/repo/\\n",
            "",
        ));

        adapter
            .check_configuration(&spec(
                "remotes:\n  flathub: https://dl.flathub.org/repo\n",
            ))
            .unwrap();
    }

    #[test]
    fn test_check_missing_remote() {
        let dir = TempDir::new().unwrap();
        let adapter = FlatpakSource::with_command(fake_flatpak(dir.path(), "", ""));

        let err = adapter
            .check_configuration(&spec(
                "remotes:\n  flathub: https://dl.flathub.org/repo\n",
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigurationMismatch { source_name, .. } if source_name == "flatpak"
        ));
    }

    #[test]
    fn test_check_wrong_url() {
        let dir = TempDir::new().unwrap();
        let adapter = FlatpakSource::with_command(fake_flatpak(
            dir.path(),
            "flathub\\thttps://mirror.example.org/repo/\\n",
            "",
        ));

        let err = adapter
            .check_configuration(&spec(
                "remotes:\n  flathub: https://dl.flathub.org/repo\n",
            ))
            .unwrap_err();
        match err {
            Error::ConfigurationMismatch { reason, .. } => {
                assert!(reason.contains("mirror.example.org"), "got: {}", reason);
            }
            other => panic!("expected configuration mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_flatpakrepo_location_is_checked_by_name_only() {
        let dir = TempDir::new().unwrap();
        let adapter = FlatpakSource::with_command(fake_flatpak(
            dir.path(),
            "flathub\\thttps://dl.flathub.org/repo/\\n",
            "",
        ));

        // The reported URL differs from the .flatpakrepo location; only
        // the remote's presence counts.
        adapter
            .check_configuration(&spec(
                "remotes:\n  flathub: https://dl.flathub.org/repo/flathub.flatpakrepo\n",
            ))
            .unwrap();
    }

    #[test]
    fn test_empty_spec_never_shells_out() {
        // A stub that always fails would surface any unexpected call
        let adapter = FlatpakSource::with_command("definitely-not-flatpak");
        adapter.check_configuration(&spec("{}")).unwrap();
        adapter.generate_configuration(&spec("{}")).unwrap();
    }

    #[test]
    fn test_list_installed_maps_through_index() {
        let dir = TempDir::new().unwrap();
        let adapter = FlatpakSource::with_command(fake_flatpak(
            dir.path(),
            "",
            "org.example.Foo\\t1.2.0\\norg.other.Tool\\t\\n",
        ));

        let mut index = SourceIndex::new();
        index.insert("org.example.Foo".to_string(), "app1".to_string());

        let installed: Vec<InstalledApp> = adapter
            .list_installed(&index)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(installed.len(), 2);
        assert_eq!(installed[0].app_id, "app1");
        assert_eq!(installed[0].version.as_deref(), Some("1.2.0"));
        assert_eq!(installed[1].app_id, "org.other.Tool");
        assert_eq!(installed[1].version, None);
        assert!(installed.iter().all(|app| app.source == "flatpak"));
    }

    #[test]
    fn test_missing_flatpak_is_source_unavailable() {
        let adapter = FlatpakSource::with_command("definitely-not-flatpak");

        assert!(!adapter.is_available());

        let err = adapter
            .check_configuration(&spec(
                "remotes:\n  flathub: https://dl.flathub.org/repo\n",
            ))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SourceUnavailable(source) if source == "flatpak"
        ));

        let index = SourceIndex::new();
        let result = adapter.list_installed(&index);
        assert!(matches!(
            result.map(|_| ()).unwrap_err(),
            Error::SourceUnavailable(_)
        ));
    }
}
