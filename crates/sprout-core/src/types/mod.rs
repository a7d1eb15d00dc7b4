//! Core data types for sprout.
//!
//! This module provides the fundamental types used throughout the workspace:
//! - Version types for semantic versioning
//! - Package records and dependency declarations
//! - Target platform evaluation

pub mod dependency;
pub mod package;
pub mod platform;
pub mod version;

// Re-export all public types
pub use dependency::{Dependency, DependencyKind, FeatureList};
pub use package::{FeatureMap, FeatureTable, PackageId, PackageRecord, Source};
pub use platform::Platform;
pub use version::{
    Component, Op, PartialVersion, Prerelease, Version, VersionError, VersionRange, VersionReq,
};
