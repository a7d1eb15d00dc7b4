//! Build driver for sprout
//!
//! This crate compiles a resolved package graph in post-order by invoking
//! the compiler directly. Build scripts are compiled and run first; their
//! `cargo:` output is parsed into link flags, cfgs and metadata that feed
//! the rest of the package and its direct dependents.

pub mod orchestrator;
pub mod protocol;
pub mod toolchain;

// Re-export main types
pub use orchestrator::{BuildContext, BuildOrchestrator, BuildReport, BuiltPackage};
pub use protocol::BuildScriptOutput;
pub use toolchain::{Invocation, ProcessOutput, ProcessToolchain, Toolchain};

use sprout_core::error::SproutError;

/// Result type for build operations
pub type BuildResult<T> = Result<T, SproutError>;
