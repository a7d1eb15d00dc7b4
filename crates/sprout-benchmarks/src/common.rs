//! Common utilities for benchmarks

use criterion::Criterion;
use sprout_core::types::{Dependency, PackageRecord, Version};

pub fn criterion_config() -> Criterion {
    Criterion::default()
        .warm_up_time(std::time::Duration::from_secs(3))
        .measurement_time(std::time::Duration::from_secs(10))
        .sample_size(100)
}

/// `count` versions spread over a few majors, with some prereleases
pub fn create_version_list(count: usize) -> Vec<Version> {
    (0..count)
        .map(|i| {
            let text = if i % 7 == 0 {
                format!("{}.{}.{}-beta.{}", i % 5, i % 13, i % 31, i % 3)
            } else {
                format!("{}.{}.{}", i % 5, i % 13, i % 31)
            };
            Version::parse(&text).unwrap_or_else(|_| Version::new(0, 0, 0))
        })
        .collect()
}

/// A package whose feature map chains `f0 -> f1 -> ... -> f<n-1>` and
/// turns on one optional dependency every fourth feature
pub fn create_feature_chain(count: usize) -> PackageRecord {
    let mut record = PackageRecord::new("chain", Version::new(1, 0, 0));
    for i in 0..count {
        let mut enables = Vec::new();
        if i + 1 < count {
            enables.push(format!("f{}", i + 1));
        }
        if i % 4 == 0 {
            let dep = format!("opt{}", i);
            if let Ok(mut dependency) = Dependency::new(dep.as_str(), "^1") {
                dependency.optional = true;
                record.dependencies.push(dependency);
            }
            enables.push(format!("dep:{}", dep));
            enables.push(format!("{}?/std", dep));
        }
        record.features.insert(format!("f{}", i), enables);
    }
    record.features.insert("default".to_string(), vec!["f0".to_string()]);
    record
}
