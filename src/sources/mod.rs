// src/sources/mod.rs

//! Package-source management for appdb
//!
//! Each supported package manager implements the `PackageSource` trait;
//! the `SourceManager` holds the registry of adapters and drives the
//! three cross-source workflows: configuration checking, configuration
//! generation, and installed-package scanning.
//!
//! The registry is populated from the statically known adapters, never
//! from the manifest; the manifest only supplies configuration data for
//! adapters that already exist in code.

pub mod apt;
pub mod flatpak;
mod process;
pub mod traits;

pub use traits::PackageSource;

use crate::db::models::{App, InstalledApp};
use crate::db::{self, Database};
use crate::error::{Error, Result};
use crate::repository::manifest::SourceSpecs;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Registry of source adapters and the operations spanning them
pub struct SourceManager {
    sources: BTreeMap<&'static str, Box<dyn PackageSource>>,
}

impl SourceManager {
    /// Manager over the statically known adapters
    pub fn new() -> Self {
        Self::with_sources(vec![
            Box::new(apt::AptSource::new()),
            Box::new(flatpak::FlatpakSource::new()),
        ])
    }

    /// Manager over an explicit adapter set
    pub fn with_sources(sources: Vec<Box<dyn PackageSource>>) -> Self {
        Self {
            sources: sources.into_iter().map(|s| (s.name(), s)).collect(),
        }
    }

    /// Check every source present in both the registry and the manifest
    ///
    /// Short-circuits on the first misconfigured source. Manifest entries
    /// without a registered adapter, and adapters whose package manager
    /// is absent from this host, are skipped with a warning.
    pub fn check_sources(&self, specs: &SourceSpecs) -> Result<()> {
        for (name, spec) in specs {
            let Some(source) = self.sources.get(name.as_str()) else {
                warn!("No adapter for source '{}', skipping check", name);
                continue;
            };
            if !source.is_available() {
                warn!("Source '{}' is not available on this host, skipping check", name);
                continue;
            }
            source.check_configuration(spec)?;
            debug!("Source '{}' is correctly configured", name);
        }
        Ok(())
    }

    /// Regenerate configuration for every manifest source with a
    /// registered adapter
    ///
    /// The caller must have verified elevated privilege already. An
    /// unavailable source is skipped with a warning; any other failure
    /// aborts.
    pub fn generate_sources(&self, specs: &SourceSpecs) -> Result<()> {
        for (name, spec) in specs {
            let Some(source) = self.sources.get(name.as_str()) else {
                warn!("No adapter for source '{}', skipping generation", name);
                continue;
            };
            match source.generate_configuration(spec) {
                Ok(()) => debug!("Generated configuration for source '{}'", name),
                Err(Error::SourceUnavailable(_)) => {
                    warn!(
                        "Source '{}' is not available on this host, skipping generation",
                        name
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Rebuild the installed-apps table from every registered source
    ///
    /// Runs as one transaction: clear, then stream each source's report
    /// row by row. Unavailable sources are skipped; a hard failure rolls
    /// the whole rebuild back so readers keep the previous table.
    /// Returns the number of rows recorded.
    pub fn update_installed(&self, db: &mut Database) -> Result<usize> {
        db.transaction(|tx| {
            InstalledApp::clear_all(tx)?;

            let mut count = 0;
            for (name, source) in &self.sources {
                if !source.is_available() {
                    warn!("Source '{}' is not available on this host, skipping", name);
                    continue;
                }

                let index = App::package_index(tx, name)?;
                let installed = match source.list_installed(&index) {
                    Ok(installed) => installed,
                    Err(Error::SourceUnavailable(_)) => {
                        warn!("Source '{}' is not available on this host, skipping", name);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let mut rows = 0;
                for app in installed {
                    app?.insert(tx)?;
                    rows += 1;
                }
                debug!("Source '{}' reported {} installed apps", name, rows);
                count += rows;
            }

            db::models::set_meta(tx, db::META_INSTALLED_UPDATED, &db::current_timestamp())?;
            Ok(count)
        })
    }
}

impl Default for SourceManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::SourceIndex;
    use crate::sources::traits::InstalledIter;
    use serde_yaml::Value;

    /// In-memory adapter with canned behavior
    struct StubSource {
        name: &'static str,
        available: bool,
        installed: Vec<(&'static str, Option<&'static str>)>,
        check_error: Option<&'static str>,
    }

    impl StubSource {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                available: true,
                installed: Vec::new(),
                check_error: None,
            }
        }
    }

    impl PackageSource for StubSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn is_available(&self) -> bool {
            self.available
        }

        fn check_configuration(&self, _spec: &Value) -> Result<()> {
            match self.check_error {
                Some(reason) => Err(Error::ConfigurationMismatch {
                    source_name: self.name.to_string(),
                    reason: reason.to_string(),
                }),
                None => Ok(()),
            }
        }

        fn generate_configuration(&self, _spec: &Value) -> Result<()> {
            if !self.available {
                return Err(Error::SourceUnavailable(self.name.to_string()));
            }
            Ok(())
        }

        fn list_installed<'a>(&'a self, index: &'a SourceIndex) -> Result<InstalledIter<'a>> {
            if !self.available {
                return Err(Error::SourceUnavailable(self.name.to_string()));
            }
            Ok(Box::new(self.installed.iter().map(move |(package, version)| {
                let app_id = index
                    .get(*package)
                    .cloned()
                    .unwrap_or_else(|| package.to_string());
                Ok(InstalledApp::new(
                    app_id,
                    self.name.to_string(),
                    version.map(str::to_string),
                ))
            })))
        }
    }

    fn specs_for(names: &[&str]) -> SourceSpecs {
        names
            .iter()
            .map(|name| (name.to_string(), serde_yaml::from_str("{}").unwrap()))
            .collect()
    }

    fn test_db() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_writable(&dir.path().join("appdb.db")).unwrap();
        (dir, db)
    }

    #[test]
    fn test_default_registry_has_static_adapters() {
        let manager = SourceManager::new();
        assert!(manager.sources.contains_key("apt"));
        assert!(manager.sources.contains_key("flatpak"));
    }

    #[test]
    fn test_check_sources_all_ok() {
        let manager = SourceManager::with_sources(vec![
            Box::new(StubSource::new("alpha")),
            Box::new(StubSource::new("beta")),
        ]);

        manager.check_sources(&specs_for(&["alpha", "beta"])).unwrap();
    }

    #[test]
    fn test_check_sources_reports_first_failure() {
        let mut bad = StubSource::new("beta");
        bad.check_error = Some("repository entry missing");

        let manager = SourceManager::with_sources(vec![
            Box::new(StubSource::new("alpha")),
            Box::new(bad),
        ]);

        let err = manager
            .check_sources(&specs_for(&["alpha", "beta"]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::ConfigurationMismatch { source_name, .. } if source_name == "beta"
        ));
    }

    #[test]
    fn test_check_sources_skips_unknown_and_unavailable() {
        let mut offline = StubSource::new("beta");
        offline.available = false;
        // Would fail if it were checked
        offline.check_error = Some("should never be seen");

        let manager = SourceManager::with_sources(vec![
            Box::new(StubSource::new("alpha")),
            Box::new(offline),
        ]);

        // "gamma" has no adapter at all
        manager
            .check_sources(&specs_for(&["alpha", "beta", "gamma"]))
            .unwrap();
    }

    #[test]
    fn test_generate_sources_skips_unavailable() {
        let mut offline = StubSource::new("beta");
        offline.available = false;

        let manager = SourceManager::with_sources(vec![
            Box::new(StubSource::new("alpha")),
            Box::new(offline),
        ]);

        manager
            .generate_sources(&specs_for(&["alpha", "beta"]))
            .unwrap();
    }

    #[test]
    fn test_update_installed_streams_all_sources() {
        let (_dir, mut db) = test_db();

        // Catalog maps foo-pkg to app1 for the "alpha" source
        let mut app = App::new("app1".to_string(), "Foo".to_string());
        app.sources.insert("alpha".to_string(), "foo-pkg".to_string());
        db.rebuild_catalog(&[app]).unwrap();

        let mut alpha = StubSource::new("alpha");
        alpha.installed = vec![("foo-pkg", Some("1.2")), ("app9", Some("0.1"))];
        let mut beta = StubSource::new("beta");
        beta.installed = vec![("org.example.Tool", None)];

        let manager = SourceManager::with_sources(vec![Box::new(alpha), Box::new(beta)]);
        let count = manager.update_installed(&mut db).unwrap();
        assert_eq!(count, 3);

        let rows = InstalledApp::list_all(db.conn()).unwrap();
        assert_eq!(rows.len(), 3);
        // foo-pkg was translated to its catalog id; app9 is recorded as
        // reported even though the catalog does not know it
        assert_eq!(rows[0].app_id, "app1");
        assert_eq!(rows[0].source, "alpha");
        assert_eq!(rows[1].app_id, "app9");
        assert_eq!(rows[2].app_id, "org.example.Tool");
        assert_eq!(rows[2].source, "beta");
    }

    #[test]
    fn test_update_installed_skips_unavailable_source() {
        let (_dir, mut db) = test_db();
        db.rebuild_catalog(&[]).unwrap();

        let mut alpha = StubSource::new("alpha");
        alpha.installed = vec![("foo-pkg", Some("1.2"))];
        let mut offline = StubSource::new("beta");
        offline.available = false;
        offline.installed = vec![("never-seen", None)];

        let manager = SourceManager::with_sources(vec![Box::new(alpha), Box::new(offline)]);
        let count = manager.update_installed(&mut db).unwrap();
        assert_eq!(count, 1);

        let rows = InstalledApp::list_all(db.conn()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_id, "foo-pkg");
    }

    #[test]
    fn test_update_installed_replaces_previous_rows() {
        let (_dir, mut db) = test_db();
        db.rebuild_catalog(&[]).unwrap();

        db.transaction(|tx| {
            InstalledApp::new("stale".to_string(), "alpha".to_string(), None).insert(tx)
        })
        .unwrap();

        let mut alpha = StubSource::new("alpha");
        alpha.installed = vec![("fresh", None)];

        let manager = SourceManager::with_sources(vec![Box::new(alpha)]);
        manager.update_installed(&mut db).unwrap();

        let rows = InstalledApp::list_all(db.conn()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].app_id, "fresh");
    }

    #[test]
    fn test_update_installed_stamps_timestamp() {
        let (_dir, mut db) = test_db();
        db.rebuild_catalog(&[]).unwrap();

        let manager = SourceManager::with_sources(vec![Box::new(StubSource::new("alpha"))]);
        manager.update_installed(&mut db).unwrap();

        assert!(
            db::models::get_meta(db.conn(), db::META_INSTALLED_UPDATED)
                .unwrap()
                .is_some()
        );
    }
}
