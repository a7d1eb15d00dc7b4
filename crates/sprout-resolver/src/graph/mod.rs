//! Dependency graph implementation using petgraph
//!
//! Mirrors the resolver's node registry as a directed graph (dependent ->
//! dependency) to check that the result is acyclic.

use std::collections::HashMap;

use indexmap::IndexMap;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use sprout_core::error::SproutError;
use sprout_core::types::PackageId;

use crate::package::ResolvedPackage;
use crate::ResolverResult;

/// Directed graph of resolved packages; edges carry the dependency name
#[derive(Debug, Default)]
pub struct DependencyGraph {
    graph: DiGraph<PackageId, String>,
    /// Map from PackageId to NodeIndex for fast lookups
    node_map: HashMap<PackageId, NodeIndex>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the graph for a node registry
    pub fn from_packages(packages: &IndexMap<PackageId, ResolvedPackage>) -> ResolverResult<Self> {
        let mut graph = Self::new();
        for id in packages.keys() {
            graph.add_package(id.clone());
        }
        for (id, package) in packages {
            for (key, edge) in &package.dependencies {
                graph.add_dependency(id, &edge.id, &key.name)?;
            }
        }
        Ok(graph)
    }

    /// Add a package node, returning the existing index if present
    pub fn add_package(&mut self, id: PackageId) -> NodeIndex {
        if let Some(index) = self.node_map.get(&id) {
            return *index;
        }
        let index = self.graph.add_node(id.clone());
        self.node_map.insert(id, index);
        index
    }

    /// Add dependency edge between two packages
    pub fn add_dependency(&mut self, from: &PackageId, to: &PackageId, name: &str) -> ResolverResult<()> {
        let missing = |id: &PackageId| SproutError::NotFound {
            name: id.name.clone(),
            req: format!("={}", id.version),
            requested_by: from.to_string(),
        };
        let from_index = *self.node_map.get(from).ok_or_else(|| missing(from))?;
        let to_index = *self.node_map.get(to).ok_or_else(|| missing(to))?;
        self.graph.add_edge(from_index, to_index, name.to_string());
        Ok(())
    }

    /// Get number of packages in the graph
    pub fn package_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Get number of dependencies in the graph
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Detect cycles, returning one cycle's members in walk order
    pub fn detect_cycles(&self) -> Result<(), Vec<PackageId>> {
        match toposort(&self.graph, None) {
            Ok(_) => Ok(()),
            Err(_) => Err(self.extract_cycle_path()),
        }
    }

    /// Find a strongly connected component with a cycle and walk it
    fn extract_cycle_path(&self) -> Vec<PackageId> {
        let Some(component) = tarjan_scc(&self.graph).into_iter().find(|scc| {
            scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0])
        }) else {
            return Vec::new();
        };

        let mut path: Vec<NodeIndex> = Vec::new();
        let mut current = component[0];
        loop {
            if let Some(start) = path.iter().position(|n| *n == current) {
                return path[start..]
                    .iter()
                    .filter_map(|n| self.graph.node_weight(*n).cloned())
                    .collect();
            }
            path.push(current);
            match self
                .graph
                .edges(current)
                .map(|edge| edge.target())
                .find(|target| component.contains(target))
            {
                Some(next) => current = next,
                None => return Vec::new(),
            }
        }
    }

    /// Format cycle as "a -> b -> c -> a"
    pub fn format_cycle(cycle: &[PackageId]) -> String {
        let mut names: Vec<String> = cycle.iter().map(|id| id.to_string()).collect();
        if let Some(first) = names.first().cloned() {
            names.push(first);
        }
        names.join(" -> ")
    }

    /// Check for cycles and return `CircularDependency` if found
    pub fn validate_no_cycles(&self) -> ResolverResult<()> {
        self.detect_cycles().map_err(|cycle| SproutError::CircularDependency {
            cycle: Self::format_cycle(&cycle),
        })
    }
}
