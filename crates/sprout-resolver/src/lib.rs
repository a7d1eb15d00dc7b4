//! Dependency resolution engine for sprout
//!
//! This crate walks the dependency declarations of a root package
//! breadth-first, picks the highest matching registry version for each,
//! propagates features along the edges and checks that the resulting graph
//! is acyclic.

pub mod features;
pub mod graph;
pub mod package;
pub mod resolver;

// Re-export main types
pub use features::{activate, Activation};
pub use graph::DependencyGraph;
pub use package::{DependencyEdge, EdgeKey, NodeState, ResolvedPackage};
pub use resolver::{DependencyResolver, Resolution, ResolveOptions, SkipReason, SkippedDependency};

use sprout_core::error::SproutError;

/// Result type for resolver operations
pub type ResolverResult<T> = Result<T, SproutError>;
