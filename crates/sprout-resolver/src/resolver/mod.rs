//! Breadth-first dependency resolution
//!
//! The resolver owns a FIFO worklist and a node registry keyed by
//! `PackageId`. Each popped node is expanded once per distinct feature
//! request: its declarations are filtered (dev, platform, optional),
//! looked up, fetched when new, and linked with a feature-carrying edge.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sprout_cache::{ArchiveFetcher, PackageFetcher};
use sprout_config::Manifest;
use sprout_core::error::SproutError;
use sprout_core::types::{Dependency, PackageId, Platform, Source};
use sprout_registry::{IndexConfig, RegistryIndex};
use tracing::{debug, info, warn};

use crate::features::activate;
use crate::graph::DependencyGraph;
use crate::package::{DependencyEdge, EdgeKey, NodeState, ResolvedPackage};
use crate::ResolverResult;

/// Inputs that shape a resolution besides the packages themselves
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Features requested on the root package
    pub features: Vec<String>,
    pub no_default_features: bool,
    /// Platform that target-restricted dependencies are matched against
    pub platform: Platform,
}

/// Why a declaration did not become an edge
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Dev,
    /// Restricted to a platform other than the current one
    Platform(String),
    /// Optional and not activated by any feature
    Optional,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDependency {
    pub dependent: PackageId,
    pub name: String,
    pub reason: SkipReason,
}

/// Outcome of a resolution
#[derive(Debug)]
pub struct Resolution {
    pub root: PackageId,
    /// Nodes in discovery order, root first
    pub packages: IndexMap<PackageId, ResolvedPackage>,
    pub graph: DependencyGraph,
    pub skipped: Vec<SkippedDependency>,
}

/// Resolves a root package's dependency graph against a registry index
pub struct DependencyResolver<F> {
    index: RegistryIndex,
    index_config: IndexConfig,
    fetcher: PackageFetcher<F>,
    options: ResolveOptions,
    queue: VecDeque<PackageId>,
    nodes: IndexMap<PackageId, ResolvedPackage>,
    /// Request each node had when it was last expanded
    expanded: HashMap<PackageId, BTreeSet<String>>,
    skipped: Vec<SkippedDependency>,
}

impl ResolveOptions {
    pub fn new(platform: Platform) -> Self {
        Self {
            features: Vec::new(),
            no_default_features: false,
            platform,
        }
    }

    /// Features requested on the root, `default` included unless disabled
    pub fn root_request(&self) -> BTreeSet<String> {
        let mut request: BTreeSet<String> = self
            .features
            .iter()
            .flat_map(|f| f.split(|c: char| c == ',' || c.is_whitespace()))
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        if !self.no_default_features {
            request.insert("default".to_string());
        }
        request
    }
}

impl Resolution {
    pub fn root_package(&self) -> Option<&ResolvedPackage> {
        self.packages.get(&self.root)
    }

    pub fn package(&self, id: &PackageId) -> Option<&ResolvedPackage> {
        self.packages.get(id)
    }

    pub fn package_mut(&mut self, id: &PackageId) -> Option<&mut ResolvedPackage> {
        self.packages.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

impl<F: ArchiveFetcher> DependencyResolver<F> {
    pub fn new(
        index: RegistryIndex,
        index_config: IndexConfig,
        fetcher: PackageFetcher<F>,
        options: ResolveOptions,
    ) -> Self {
        Self {
            index,
            index_config,
            fetcher,
            options,
            queue: VecDeque::new(),
            nodes: IndexMap::new(),
            expanded: HashMap::new(),
            skipped: Vec::new(),
        }
    }

    /// Resolve the package whose manifest lives in `root_dir`
    pub async fn resolve(&mut self, root_dir: &Path) -> ResolverResult<Resolution> {
        self.queue.clear();
        self.nodes.clear();
        self.expanded.clear();
        self.skipped.clear();

        let manifest = Manifest::load(root_dir).await?;
        let (record, build) = manifest.to_package(root_dir, Source::Root(root_dir.to_path_buf()))?;
        let root = record.id();
        info!("Resolving dependencies of {}", root);

        let mut node = ResolvedPackage::new(record, build, root_dir.to_path_buf());
        node.request(self.options.root_request());
        self.nodes.insert(root.clone(), node);
        self.queue.push_back(root.clone());

        while let Some(id) = self.queue.pop_front() {
            self.expand(&id).await?;
        }

        let packages = std::mem::take(&mut self.nodes);
        let graph = DependencyGraph::from_packages(&packages)?;
        graph.validate_no_cycles()?;
        info!(
            "Resolved {} packages with {} edges",
            graph.package_count(),
            graph.dependency_count()
        );

        Ok(Resolution {
            root,
            packages,
            graph,
            skipped: std::mem::take(&mut self.skipped),
        })
    }

    async fn expand(&mut self, id: &PackageId) -> ResolverResult<()> {
        let (record, requested, state) = {
            let node = self.node(id)?;
            (node.record.clone(), node.requested.clone(), node.state)
        };

        if state != NodeState::Unresolved && self.expanded.get(id) == Some(&requested) {
            debug!("{} already expanded with the same features", id);
            return Ok(());
        }

        let activation = activate(&record, &requested);
        for name in &activation.unknown {
            warn!("Package {} does not have feature '{}'; ignoring it", id, name);
        }
        debug!("Features of {}: {:?}", id, activation.features);
        self.node_mut(id)?.features = activation.features.clone();
        self.skipped.retain(|skip| &skip.dependent != id);

        for dep in &record.dependencies {
            if let Some(reason) = self.skip_reason(dep, activation.enables(&dep.name))? {
                info!("Skipping {} dependency '{}' of {}", describe(&reason), dep.name, id);
                self.skipped.push(SkippedDependency {
                    dependent: id.clone(),
                    name: dep.name.clone(),
                    reason,
                });
                continue;
            }

            let mut edge_request: BTreeSet<String> = dep.features.iter().cloned().collect();
            if dep.default_features {
                edge_request.insert("default".to_string());
            }
            if let Some(extra) = activation.dep_features.get(&dep.name) {
                edge_request.extend(extra.iter().cloned());
            }

            let child_id = self.locate(dep, id).await?;
            self.link(id, dep, &child_id, edge_request)?;
        }

        self.node_mut(id)?.state = NodeState::Resolved;
        self.expanded.insert(id.clone(), requested);
        Ok(())
    }

    fn skip_reason(&self, dep: &Dependency, activated: bool) -> ResolverResult<Option<SkipReason>> {
        if dep.kind.is_dev_only() {
            return Ok(Some(SkipReason::Dev));
        }
        if let Some(spec) = &dep.target {
            if !self.options.platform.matches(spec)? {
                return Ok(Some(SkipReason::Platform(spec.clone())));
            }
        }
        if dep.optional && !activated {
            return Ok(Some(SkipReason::Optional));
        }
        Ok(None)
    }

    /// Record the edge `parent -> child` and push the request to the child
    fn link(
        &mut self,
        parent: &PackageId,
        dep: &Dependency,
        child_id: &PackageId,
        request: BTreeSet<String>,
    ) -> ResolverResult<()> {
        let child = self.node_mut(child_id)?;
        let closure = activate(&child.record, &request).features;
        child.referrers.insert(parent.to_string());
        let grew = child.request(request);
        let requeue = grew && child.state == NodeState::Resolved;

        let node = self.node_mut(parent)?;
        let edge = node
            .dependencies
            .entry(EdgeKey::new(dep.name.clone(), dep.kind))
            .or_insert_with(|| DependencyEdge::new(child_id.clone()));
        if &edge.id != child_id {
            warn!(
                "{} declares {} dependency '{}' as both {} and {}; keeping {}",
                parent, dep.kind, dep.name, edge.id, child_id, edge.id
            );
        }
        edge.features.extend(closure);

        if requeue {
            debug!("Feature request of {} grew; expanding it again", child_id);
            self.queue.push_back(child_id.clone());
        }
        Ok(())
    }

    /// Find (creating and queueing when new) the node a declaration refers to
    async fn locate(&mut self, dep: &Dependency, dependent: &PackageId) -> ResolverResult<PackageId> {
        match &dep.path {
            Some(dir) => self.locate_path(dep, dir, dependent).await,
            None => self.locate_registry(dep, dependent).await,
        }
    }

    async fn locate_path(&mut self, dep: &Dependency, dir: &Path, dependent: &PackageId) -> ResolverResult<PackageId> {
        let manifest = Manifest::load(dir).await?;
        let (record, build) = manifest.to_package(dir, Source::Path(dir.to_path_buf()))?;
        if record.name != dep.package || !record.version.satisfies(&dep.req) {
            return Err(SproutError::NotFound {
                name: dep.package.clone(),
                req: dep.req_text.clone(),
                requested_by: dependent.to_string(),
            });
        }

        let id = record.id();
        if !self.nodes.contains_key(&id) {
            info!("Using path dependency {} at {}", id, dir.display());
            self.insert(ResolvedPackage::new(record, build, dir.to_path_buf()));
        }
        Ok(id)
    }

    async fn locate_registry(&mut self, dep: &Dependency, dependent: &PackageId) -> ResolverResult<PackageId> {
        let mut record = self
            .index
            .lookup(&dep.package, &dep.req, &dependent.to_string())
            .await?;
        let id = record.id();
        if self.nodes.contains_key(&id) {
            return Ok(id);
        }

        let url = self.index_config.download_url(&record);
        let dir: PathBuf = self.fetcher.fetch(&record, &url).await?;
        let manifest = Manifest::load(&dir).await?;
        let (_, build) = manifest.to_package(&dir, Source::Registry)?;
        if record.links.is_none() {
            record.links = build.links.clone();
        }

        self.insert(ResolvedPackage::new(record, build, dir));
        Ok(id)
    }

    fn insert(&mut self, node: ResolvedPackage) {
        let id = node.id();
        self.nodes.insert(id.clone(), node);
        self.queue.push_back(id);
    }

    fn node(&self, id: &PackageId) -> ResolverResult<&ResolvedPackage> {
        self.nodes.get(id).ok_or_else(|| missing_node(id))
    }

    fn node_mut(&mut self, id: &PackageId) -> ResolverResult<&mut ResolvedPackage> {
        self.nodes.get_mut(id).ok_or_else(|| missing_node(id))
    }
}

fn missing_node(id: &PackageId) -> SproutError {
    SproutError::NotFound {
        name: id.name.clone(),
        req: format!("={}", id.version),
        requested_by: "resolver".to_string(),
    }
}

fn describe(reason: &SkipReason) -> String {
    match reason {
        SkipReason::Dev => "dev".to_string(),
        SkipReason::Platform(spec) => format!("'{}'-only", spec),
        SkipReason::Optional => "optional".to_string(),
    }
}
