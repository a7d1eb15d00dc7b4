//! Configuration parsing for sprout
//!
//! This crate handles the package manifests sprout reads while walking the
//! dependency graph and the layered settings that drive a bootstrap run.

pub mod manifest;
pub mod settings;

// Re-export main types
pub use manifest::{BuildSpec, BuildTarget, DependencySpec, Manifest, TargetKind};
pub use settings::{
    BootstrapSettings, ChecksumPolicy, ConfigSource, OverrideTable, OverrideValue, Profile,
    SettingsFile, SettingsLoader,
};

use sprout_core::error::SproutError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, SproutError>;
