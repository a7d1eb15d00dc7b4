//! # sprout-core
//!
//! Core types and utilities shared across all sprout crates.
//!
//! This crate provides:
//! - `Version`, `VersionRange` and `VersionReq` with from-scratch semver semantics
//! - `PackageRecord` and `Dependency` types in one normalized shape
//! - `Platform` for evaluating target-restricted dependencies
//! - `SproutError` for unified error handling
//! - Checksum and naming helpers
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, PackageRecord, etc.)
//! - `error`: Error types and result aliases
//! - `utils`: Utility functions and helpers

pub mod error;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{SproutError, SproutResult};
pub use types::{
    Dependency, DependencyKind, FeatureList, FeatureMap, Op, PackageId, PackageRecord, Platform,
    Source, Version, VersionRange, VersionReq,
};
