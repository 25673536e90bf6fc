// src/repository/manifest.rs

//! Manifest-to-domain conversion
//!
//! Walks the parsed YAML documents and produces domain entities. Parsing
//! is strict: a malformed entry fails the whole parse rather than being
//! skipped, so a bad manifest never yields a silently incomplete catalog.
//!
//! Expected catalog shape (`repo.yaml`):
//!
//! ```yaml
//! app1:
//!   name: Foo
//!   description: An optional description
//!   sources:
//!     apt: foo-pkg
//!     flatpak: org.example.Foo
//!   metadata:
//!     flatpak:
//!       branch: stable
//! ```
//!
//! Expected source shape (`sourceconf.yaml`): a mapping of source name to
//! that adapter's configuration; the value shape is owned by the adapter.

use crate::db::models::App;
use crate::error::{Error, Result};
use serde_yaml::Value;
use std::collections::BTreeMap;

/// Per-source configuration specs, keyed by source name
pub type SourceSpecs = BTreeMap<String, Value>;

/// Convert the catalog manifest into domain App entities
pub fn apps_from_yaml(doc: &Value) -> Result<Vec<App>> {
    let mapping = doc.as_mapping().ok_or_else(|| {
        Error::Schema("app manifest must be a mapping of app id to app entry".to_string())
    })?;

    let mut apps = Vec::with_capacity(mapping.len());
    for (key, entry) in mapping {
        let id = key
            .as_str()
            .ok_or_else(|| Error::Schema("app ids must be strings".to_string()))?;

        if !entry.is_mapping() {
            return Err(Error::Schema(format!("app '{}' must be a mapping", id)));
        }

        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::Schema(format!("app '{}' is missing required string field 'name'", id))
            })?;

        let mut app = App::new(id.to_string(), name.to_string());

        if let Some(description) = entry.get("description") {
            let description = description.as_str().ok_or_else(|| {
                Error::Schema(format!("app '{}': 'description' must be a string", id))
            })?;
            app.description = Some(description.to_string());
        }

        if let Some(sources) = entry.get("sources") {
            app.sources = sources_from_yaml(id, sources)?;
        }

        if let Some(metadata) = entry.get("metadata") {
            if !metadata.is_mapping() {
                return Err(Error::Schema(format!(
                    "app '{}': 'metadata' must be a mapping",
                    id
                )));
            }
            let metadata = serde_json::to_value(metadata).map_err(|e| {
                Error::Schema(format!("app '{}': metadata is not representable: {}", id, e))
            })?;
            app.metadata = Some(metadata);
        }

        apps.push(app);
    }

    Ok(apps)
}

/// Parse one app's source-name -> package-id mapping
fn sources_from_yaml(id: &str, sources: &Value) -> Result<BTreeMap<String, String>> {
    let mapping = sources.as_mapping().ok_or_else(|| {
        Error::Schema(format!(
            "app '{}': 'sources' must be a mapping of source name to package id",
            id
        ))
    })?;

    let mut out = BTreeMap::new();
    for (source, package) in mapping {
        let source = source.as_str().ok_or_else(|| {
            Error::Schema(format!("app '{}': source names must be strings", id))
        })?;
        let package = package.as_str().ok_or_else(|| {
            Error::Schema(format!(
                "app '{}': package id for source '{}' must be a string",
                id, source
            ))
        })?;
        out.insert(source.to_string(), package.to_string());
    }

    Ok(out)
}

/// Convert the source manifest into per-source configuration specs
///
/// Only the outer shape is validated here; each adapter deserializes and
/// validates its own spec value.
pub fn source_specs_from_yaml(doc: &Value) -> Result<SourceSpecs> {
    let mapping = doc.as_mapping().ok_or_else(|| {
        Error::Schema("source manifest must be a mapping of source name to configuration".to_string())
    })?;

    let mut specs = SourceSpecs::new();
    for (key, spec) in mapping {
        let name = key
            .as_str()
            .ok_or_else(|| Error::Schema("source names must be strings".to_string()))?;
        specs.insert(name.to_string(), spec.clone());
    }

    Ok(specs)
}
