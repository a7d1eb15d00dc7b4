//! Utility functions and helpers.
//!
//! Common functionality used across multiple sprout crates.

pub mod hash;
pub mod naming;
pub mod path;

// Re-export commonly used utilities
pub use hash::{sha256_hex, verify_checksum};
pub use naming::{crate_name, envify};
pub use path::{is_safe_path, normalize_path, safe_join};
