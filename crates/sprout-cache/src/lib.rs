//! Package fetching for sprout
//!
//! This crate downloads package archives, checks them against the index
//! checksum and unpacks them into the registry directory. A package that is
//! already unpacked is never downloaded again.

pub mod fetch;
pub mod tarball;

// Re-export main types
pub use fetch::{ArchiveFetcher, HttpFetcher, PackageFetcher};
pub use tarball::{extract_tarball, unpack_archive};

use sprout_core::error::SproutError;

/// Result type for cache operations
pub type CacheResult<T> = Result<T, SproutError>;
