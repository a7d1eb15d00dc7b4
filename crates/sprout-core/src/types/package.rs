//! Package metadata types.
//!
//! Defines the normalized package record shared by index lookups and
//! manifest parsing.

use super::{Dependency, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Feature name -> features and dependencies it enables
pub type FeatureMap = BTreeMap<String, Vec<String>>;

/// Where a package's sources come from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Source {
    /// Downloaded from the registry
    Registry,
    /// A path dependency
    Path(PathBuf),
    /// The package being bootstrapped
    Root(PathBuf),
}

/// Identity of a resolved package: `name-version`.
///
/// Not `Ord`: `Version` ordering ignores build metadata while equality
/// does not. Key maps by hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

/// Normalized package information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: Version,
    pub dependencies: Vec<Dependency>,
    pub features: FeatureMap,
    /// SHA-256 hex of the archive, when known
    pub checksum: Option<String>,
    pub source: Source,
    /// Native library this package links, if declared
    pub links: Option<String>,
}

/// Feature table as it arrives at the parse boundary. A bare list of
/// names becomes a map of names to empty lists.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeatureTable {
    Map(FeatureMap),
    List(Vec<String>),
}

impl PackageId {
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

impl PackageRecord {
    /// Create a registry record with no dependencies or features
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            dependencies: Vec::new(),
            features: FeatureMap::new(),
            checksum: None,
            source: Source::Registry,
            links: None,
        }
    }

    pub fn id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }

    /// Check if this is a valid package name
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !name.starts_with('-')
    }

    /// Local directory holding the sources, for path and root packages
    pub fn local_dir(&self) -> Option<&PathBuf> {
        match &self.source {
            Source::Registry => None,
            Source::Path(dir) | Source::Root(dir) => Some(dir),
        }
    }
}

impl Default for FeatureTable {
    fn default() -> Self {
        FeatureTable::Map(FeatureMap::new())
    }
}

impl FeatureTable {
    pub fn into_map(self) -> FeatureMap {
        match self {
            FeatureTable::Map(map) => map,
            FeatureTable::List(names) => names
                .into_iter()
                .filter(|name| !name.is_empty())
                .map(|name| (name, Vec::new()))
                .collect(),
        }
    }
}

impl Serialize for PackageId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
