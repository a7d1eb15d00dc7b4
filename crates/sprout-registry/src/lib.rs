//! Registry index access for sprout
//!
//! This crate reads the on-disk registry index: it shards package names to
//! index files, parses their JSON lines into `PackageRecord`s, picks the
//! highest matching version and expands the index's download URL template.
//! Obtaining the index checkout itself goes through the `SourceControl`
//! black box.

pub mod config;
pub mod index;
pub mod record;
pub mod vcs;

// Re-export main types
pub use config::{IndexConfig, DEFAULT_DOWNLOAD_TEMPLATE};
pub use index::RegistryIndex;
pub use record::{IndexDependency, IndexRecord};
pub use vcs::{GitCli, SourceControl};

use sprout_core::error::SproutError;

/// Result type for registry operations
pub type RegistryResult<T> = Result<T, SproutError>;
