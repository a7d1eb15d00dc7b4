//! Nodes of a resolution

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use indexmap::IndexMap;
use sprout_config::BuildSpec;
use sprout_core::types::{DependencyKind, PackageId, PackageRecord};

/// Lifecycle of a node: created, expanded by the resolver, compiled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NodeState {
    #[default]
    Unresolved,
    Resolved,
    Built,
}

/// Key of an outgoing edge. The same name may be declared once as a
/// normal and once as a build dependency with different requirements.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EdgeKey {
    /// Name the dependent uses for the dependency
    pub name: String,
    pub kind: DependencyKind,
}

/// Edge from a dependent to one of its dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyEdge {
    pub id: PackageId,
    /// Feature closure activated on the dependency through this edge
    pub features: BTreeSet<String>,
}

/// A package taking part in the build
#[derive(Debug, Clone)]
pub struct ResolvedPackage {
    pub record: PackageRecord,
    pub build: BuildSpec,
    /// Directory holding the package's manifest and sources
    pub manifest_dir: PathBuf,
    /// Outgoing edges in declaration order
    pub dependencies: IndexMap<EdgeKey, DependencyEdge>,
    /// Ids of the packages that depend on this one
    pub referrers: BTreeSet<String>,
    /// Every feature asked of this package so far
    pub requested: BTreeSet<String>,
    /// Closure of `requested` over the feature map
    pub features: BTreeSet<String>,
    pub state: NodeState,
    /// Metadata the build step exported for direct dependents
    pub exported_env: BTreeMap<String, String>,
}

impl EdgeKey {
    pub fn new(name: impl Into<String>, kind: DependencyKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

impl DependencyEdge {
    pub fn new(id: PackageId) -> Self {
        Self {
            id,
            features: BTreeSet::new(),
        }
    }
}

impl ResolvedPackage {
    pub fn new(record: PackageRecord, build: BuildSpec, manifest_dir: PathBuf) -> Self {
        Self {
            record,
            build,
            manifest_dir,
            dependencies: IndexMap::new(),
            referrers: BTreeSet::new(),
            requested: BTreeSet::new(),
            features: BTreeSet::new(),
            state: NodeState::Unresolved,
            exported_env: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> PackageId {
        self.record.id()
    }

    /// Edge declared under `name` for `kind` compilations
    pub fn dependency(&self, name: &str, kind: DependencyKind) -> Option<&DependencyEdge> {
        self.dependencies.get(&EdgeKey::new(name, kind))
    }

    /// Edges taking part in compiling `kind` targets
    pub fn dependencies_of_kind(
        &self,
        kind: DependencyKind,
    ) -> impl Iterator<Item = (&str, &DependencyEdge)> {
        self.dependencies
            .iter()
            .filter(move |(key, _)| key.kind == kind)
            .map(|(key, edge)| (key.name.as_str(), edge))
    }

    /// Add features to the request, returning whether it grew
    pub fn request(&mut self, features: impl IntoIterator<Item = String>) -> bool {
        let before = self.requested.len();
        self.requested.extend(features);
        self.requested.len() > before
    }

    /// Key used to export build-step metadata: the `links` name if any
    pub fn links_or_name(&self) -> &str {
        self.record
            .links
            .as_deref()
            .or(self.build.links.as_deref())
            .unwrap_or(&self.record.name)
    }
}
