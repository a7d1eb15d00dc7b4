//! Registry index line types

use serde::Deserialize;
use sprout_core::error::SproutError;
use sprout_core::types::{
    Dependency, DependencyKind, FeatureList, FeatureMap, FeatureTable, PackageRecord, Source,
    Version, VersionReq,
};

use crate::RegistryResult;

/// One published version of a package: a single JSON line of an index file
#[derive(Debug, Clone, Deserialize)]
pub struct IndexRecord {
    pub name: String,
    pub vers: String,
    #[serde(default)]
    pub deps: Vec<IndexDependency>,
    #[serde(default)]
    pub features: FeatureTable,
    /// Features using the newer `dep:`/`?` syntax, listed separately
    #[serde(default)]
    pub features2: Option<FeatureMap>,
    pub cksum: Option<String>,
    pub links: Option<String>,
}

/// A dependency entry inside an index record
#[derive(Debug, Clone, Deserialize)]
pub struct IndexDependency {
    /// Name the dependent uses for it
    pub name: String,
    pub req: String,
    #[serde(default)]
    pub features: Option<FeatureList>,
    #[serde(default)]
    pub optional: bool,
    #[serde(default = "default_true")]
    pub default_features: bool,
    pub target: Option<String>,
    pub kind: Option<DependencyKind>,
    /// Registry name when `name` is a rename
    pub package: Option<String>,
}

fn default_true() -> bool {
    true
}

impl IndexRecord {
    /// Parse one index line
    pub fn parse_line(line: &str) -> RegistryResult<Self> {
        serde_json::from_str(line)
            .map_err(|e| SproutError::parse("index record", line, e.to_string()))
    }

    /// Parsed `vers`
    pub fn version(&self) -> RegistryResult<Version> {
        Ok(Version::parse(&self.vers)?)
    }

    /// Normalize into the shared package record shape
    pub fn into_record(self) -> RegistryResult<PackageRecord> {
        let version = self.version()?;

        let mut features = self.features.into_map();
        if let Some(extra) = self.features2 {
            features.extend(extra);
        }

        let dependencies = self
            .deps
            .into_iter()
            .map(IndexDependency::into_dependency)
            .collect::<RegistryResult<Vec<_>>>()?;

        Ok(PackageRecord {
            name: self.name,
            version,
            dependencies,
            features,
            checksum: self.cksum,
            source: Source::Registry,
            links: self.links,
        })
    }
}

impl IndexDependency {
    fn into_dependency(self) -> RegistryResult<Dependency> {
        let req = VersionReq::parse(&self.req)?;
        Ok(Dependency {
            package: self.package.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            req,
            req_text: self.req,
            kind: self.kind.unwrap_or_default(),
            optional: self.optional,
            features: self.features.map(FeatureList::into_names).unwrap_or_default(),
            default_features: self.default_features,
            target: self.target,
            path: None,
        })
    }
}
