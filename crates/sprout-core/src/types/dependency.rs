//! Dependency declaration types.
//!
//! Index records and manifests both normalize into `Dependency`, so the
//! resolver only ever sees one shape.

use super::VersionReq;
use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// A single dependency declaration of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// Name the dependent uses for it (the extern name)
    pub name: String,
    /// Registry name; differs from `name` when the declaration renames it
    pub package: String,
    pub req: VersionReq,
    /// Requirement as written, for diagnostics
    pub req_text: String,
    pub kind: DependencyKind,
    pub optional: bool,
    pub features: Vec<String>,
    pub default_features: bool,
    /// Platform restriction (`x86_64-unknown-linux-gnu` or `cfg(...)`)
    pub target: Option<String>,
    /// Local source directory for path dependencies
    pub path: Option<PathBuf>,
}

/// Which compilation a dependency takes part in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Linked into the library and binaries
    #[default]
    Normal,
    /// Linked into the build script only
    Build,
    /// Tests and examples only; never built here
    Dev,
}

/// Feature list as it arrives at the parse boundary: either a list of
/// names or a mapping whose keys are the names.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FeatureList {
    List(Vec<String>),
    Map(BTreeMap<String, IgnoredAny>),
}

impl Dependency {
    /// Create a normal registry dependency
    pub fn new(name: impl Into<String>, req_text: &str) -> Result<Self, super::VersionError> {
        let name = name.into();
        Ok(Self {
            package: name.clone(),
            name,
            req: VersionReq::parse(req_text)?,
            req_text: req_text.trim().to_string(),
            kind: DependencyKind::Normal,
            optional: false,
            features: Vec::new(),
            default_features: true,
            target: None,
            path: None,
        })
    }

    /// Whether the declaration renames the package
    pub fn is_renamed(&self) -> bool {
        self.name != self.package
    }
}

impl DependencyKind {
    /// Check if this dependency is only for development
    pub fn is_dev_only(&self) -> bool {
        matches!(self, DependencyKind::Dev)
    }
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DependencyKind::Normal => "normal",
            DependencyKind::Build => "build",
            DependencyKind::Dev => "dev",
        };
        f.write_str(name)
    }
}

impl Default for FeatureList {
    fn default() -> Self {
        FeatureList::List(Vec::new())
    }
}

impl FeatureList {
    /// Normalized feature names, empty names dropped
    pub fn into_names(self) -> Vec<String> {
        let names: Vec<String> = match self {
            FeatureList::List(names) => names,
            FeatureList::Map(map) => map.into_keys().collect(),
        };
        names.into_iter().filter(|name| !name.is_empty()).collect()
    }
}
