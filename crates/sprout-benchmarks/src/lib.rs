//! sprout benchmarking suite
//!
//! Benchmarks for version matching, feature activation, graph ordering and
//! build-script output parsing.

pub mod common;

pub use common::*;
