// src/db/mod.rs

//! Database layer for appdb
//!
//! This module handles all SQLite operations including:
//! - Opening the database in writable, exclusive mode
//! - Schema creation and migration
//! - Transactional table rebuilds (clear-then-bulk-insert)
//!
//! Both tables are always derived fresh from an external source of truth
//! (the remote manifest, a live package-manager query); the database
//! holds no independently mutable state between runs.

pub mod models;
pub mod schema;

use crate::error::Result;
use models::App;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::debug;

/// Meta key recording when the catalog table was last rebuilt
pub const META_CATALOG_UPDATED: &str = "catalog_updated_at";

/// Meta key recording when the installed-apps table was last rebuilt
pub const META_INSTALLED_UPDATED: &str = "installed_updated_at";

/// A database handle opened for rebuilding tables
///
/// The connection holds `locking_mode = EXCLUSIVE`, and every rebuild
/// runs inside one transaction, so concurrent readers observe either the
/// old table or the fully-new one, never a partial rebuild.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if necessary) the database in writable, exclusive
    /// mode and bring the schema up to date
    pub fn open_writable(db_path: &Path) -> Result<Self> {
        debug!("Opening database at {}", db_path.display());

        // Create parent directories if they don't exist
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;

        conn.execute_batch(
            "
            PRAGMA locking_mode = EXCLUSIVE;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        schema::migrate(&conn)?;

        Ok(Self { conn })
    }

    /// Borrow the underlying connection for reads
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside a transaction, committing on success
    pub fn transaction<T>(&mut self, f: impl FnOnce(&Transaction) -> Result<T>) -> Result<T> {
        let tx = self.conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Replace the whole catalog table with `apps`
    ///
    /// Clear plus bulk insert in one transaction; also stamps the rebuild
    /// time. Returns the number of rows written.
    pub fn rebuild_catalog(&mut self, apps: &[App]) -> Result<usize> {
        self.transaction(|tx| {
            App::clear_all(tx)?;
            for app in apps {
                app.insert(tx)?;
            }
            models::set_meta(tx, META_CATALOG_UPDATED, &current_timestamp())?;
            Ok(apps.len())
        })
    }
}

/// Get current timestamp as ISO 8601 string
pub(crate) fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
