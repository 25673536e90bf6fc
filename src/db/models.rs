// src/db/models.rs

//! Data models for appdb database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for reading and rewriting records. Both tables
//! are rebuild-only: rows are cleared and repopulated wholesale, never
//! updated in place.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::{BTreeMap, HashMap};

/// Mapping from a source's package identifiers to catalog app ids,
/// derived from the catalog for one source
pub type SourceIndex = HashMap<String, String>;

/// An App is one catalog entry: an application the organization manages
#[derive(Debug, Clone, PartialEq)]
pub struct App {
    /// Identifier, unique within the catalog
    pub id: String,
    /// Display name
    pub name: String,
    pub description: Option<String>,
    /// Source name -> that source's package identifier for this app
    pub sources: BTreeMap<String, String>,
    /// Arbitrary source-specific metadata from the manifest
    pub metadata: Option<serde_json::Value>,
}

impl App {
    /// Create a new App with no source mappings
    pub fn new(id: String, name: String) -> Self {
        Self {
            id,
            name,
            description: None,
            sources: BTreeMap::new(),
            metadata: None,
        }
    }

    /// Insert this app into the catalog
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        let sources = serde_json::to_string(&self.sources)?;
        let metadata = self
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "INSERT INTO apps (id, name, description, sources, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&self.id, &self.name, &self.description, sources, metadata],
        )?;
        Ok(())
    }

    /// Find an app by its catalog identifier
    pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<Self>> {
        let mut stmt = conn
            .prepare("SELECT id, name, description, sources, metadata FROM apps WHERE id = ?1")?;

        let app = stmt.query_row([id], Self::from_row).optional()?;

        Ok(app)
    }

    /// List the whole catalog
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn
            .prepare("SELECT id, name, description, sources, metadata FROM apps ORDER BY id")?;

        let apps = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(apps)
    }

    /// Number of catalog rows
    pub fn count(conn: &Connection) -> Result<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM apps", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Delete every catalog row
    pub fn clear_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM apps", [])?;
        Ok(())
    }

    /// Build the package-id -> app-id index for one source
    ///
    /// Used by adapters to translate what the package manager reports
    /// back into catalog identifiers.
    pub fn package_index(conn: &Connection, source: &str) -> Result<SourceIndex> {
        let mut stmt = conn.prepare("SELECT id, sources FROM apps")?;

        let rows = stmt.query_map([], |row| {
            let id: String = row.get(0)?;
            let sources: String = row.get(1)?;
            Ok((id, sources))
        })?;

        let mut index = SourceIndex::new();
        for row in rows {
            let (app_id, sources) = row?;
            let sources: BTreeMap<String, String> =
                serde_json::from_str(&sources).unwrap_or_default();
            if let Some(package_id) = sources.get(source) {
                index.insert(package_id.clone(), app_id);
            }
        }

        Ok(index)
    }

    /// Convert a database row to an App
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let sources: String = row.get(3)?;
        let sources = serde_json::from_str(&sources).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })?;

        let metadata: Option<String> = row.get(4)?;
        let metadata = metadata
            .map(|m| serde_json::from_str(&m))
            .transpose()
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    4,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?;

        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            sources,
            metadata,
        })
    }
}

/// An InstalledApp is one row of the last installed-package scan:
/// an app some source reported as present on this host
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledApp {
    /// Catalog app id when the source's package maps to one,
    /// otherwise the source's raw package identifier
    pub app_id: String,
    /// Name of the source that reported it
    pub source: String,
    /// Whatever version string the source reported
    pub version: Option<String>,
}

impl InstalledApp {
    pub fn new(app_id: String, source: String, version: Option<String>) -> Self {
        Self {
            app_id,
            source,
            version,
        }
    }

    /// Append this row to the installed-apps table
    pub fn insert(&self, conn: &Connection) -> Result<()> {
        conn.execute(
            "INSERT INTO installed_apps (app_id, source, version) VALUES (?1, ?2, ?3)",
            params![&self.app_id, &self.source, &self.version],
        )?;
        Ok(())
    }

    /// List every installed-app row
    pub fn list_all(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT app_id, source, version FROM installed_apps ORDER BY source, app_id",
        )?;

        let apps = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(apps)
    }

    /// Delete every installed-app row
    pub fn clear_all(conn: &Connection) -> Result<()> {
        conn.execute("DELETE FROM installed_apps", [])?;
        Ok(())
    }

    /// Convert a database row to an InstalledApp
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            app_id: row.get(0)?,
            source: row.get(1)?,
            version: row.get(2)?,
        })
    }
}

/// Set a bookkeeping key, replacing any previous value
pub fn set_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )?;
    Ok(())
}

/// Read a bookkeeping key
pub fn get_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
    let value = conn
        .query_row("SELECT value FROM meta WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(value)
}
