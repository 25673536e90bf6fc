// src/sources/traits.rs

//! Common trait for package-source adapters

use crate::db::models::{InstalledApp, SourceIndex};
use crate::error::Result;
use serde_yaml::Value;

/// Lazy stream of installed apps reported by one source
///
/// Finite and non-restartable; the caller appends each element to the
/// database as it is yielded rather than buffering the whole sequence.
pub type InstalledIter<'a> = Box<dyn Iterator<Item = Result<InstalledApp>> + 'a>;

/// Common interface for all package sources (apt, flatpak, etc.)
pub trait PackageSource {
    /// Name of the source, as used in the manifests and the database
    fn name(&self) -> &'static str;

    /// Whether the underlying package manager is present on this host
    fn is_available(&self) -> bool;

    /// Compare the source's on-disk configuration against the manifest
    /// spec for this source
    ///
    /// Read-only; a divergence is reported as a configuration mismatch
    /// naming the missing or differing element.
    fn check_configuration(&self, spec: &Value) -> Result<()>;

    /// Write the configuration `spec` requires, overwriting whatever is
    /// currently there
    ///
    /// Idempotent; parent locations are created as needed. Elevated
    /// privilege is the caller's precondition.
    fn generate_configuration(&self, spec: &Value) -> Result<()>;

    /// Query the package manager for installed packages
    ///
    /// `index` maps the source's package identifiers to catalog app ids;
    /// packages without a mapping are reported under their raw package
    /// identifier. Nothing is filtered out.
    fn list_installed<'a>(&'a self, index: &'a SourceIndex) -> Result<InstalledIter<'a>>;
}
