//! Feature activation over a package's feature map

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use sprout_core::types::PackageRecord;

/// Result of activating a set of requested features on one package
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Activation {
    /// Active feature names, including implicit optional-dependency features
    pub features: BTreeSet<String>,
    /// Optional dependencies switched on, by dependency name
    pub optional_deps: BTreeSet<String>,
    /// Features requested on dependencies through `dep/feat`
    pub dep_features: BTreeMap<String, BTreeSet<String>>,
    /// Requested names the package does not declare
    pub unknown: Vec<String>,
}

impl Activation {
    /// Whether the optional dependency `name` is switched on
    pub fn enables(&self, name: &str) -> bool {
        self.optional_deps.contains(name)
    }
}

/// Compute the closure of `requested` over the feature map of `record`.
///
/// `dep:x` and a bare name of an optional dependency enable that dependency.
/// `x/f` enables `x` and requests `f` on it; `x?/f` requests `f` only when
/// `x` ends up enabled some other way. Names implied by the feature map
/// are kept even if undeclared; undeclared names requested from outside
/// are reported in `unknown` and dropped.
pub fn activate(record: &PackageRecord, requested: &BTreeSet<String>) -> Activation {
    let dependency_names: BTreeSet<&str> = record.dependencies.iter().map(|d| d.name.as_str()).collect();
    let optional_names: BTreeSet<&str> = record
        .dependencies
        .iter()
        .filter(|d| d.optional)
        .map(|d| d.name.as_str())
        .collect();

    let mut activation = Activation::default();
    let mut weak: Vec<(String, String)> = Vec::new();

    // (name, requested from outside)
    let mut pending: VecDeque<(String, bool)> = requested.iter().map(|f| (f.clone(), true)).collect();

    while let Some((item, external)) = pending.pop_front() {
        if let Some(dep) = item.strip_prefix("dep:") {
            if optional_names.contains(dep) || dependency_names.contains(dep) {
                activation.optional_deps.insert(dep.to_string());
            } else {
                activation.unknown.push(item.clone());
            }
            continue;
        }

        if let Some((dep, feature)) = item.split_once('/') {
            if let Some(dep) = dep.strip_suffix('?') {
                weak.push((dep.to_string(), feature.to_string()));
                continue;
            }
            if !dependency_names.contains(dep) {
                activation.unknown.push(item.clone());
                continue;
            }
            activation.optional_deps.insert(dep.to_string());
            activation
                .dep_features
                .entry(dep.to_string())
                .or_default()
                .insert(feature.to_string());
            if record.features.contains_key(dep) {
                pending.push_back((dep.to_string(), false));
            }
            continue;
        }

        if activation.features.contains(&item) {
            continue;
        }

        if let Some(enables) = record.features.get(&item) {
            pending.extend(enables.iter().map(|f| (f.clone(), false)));
            activation.features.insert(item);
        } else if optional_names.contains(item.as_str()) {
            activation.optional_deps.insert(item.clone());
            activation.features.insert(item);
        } else if item == "default" {
            // Packages without a default feature simply have nothing on
        } else if !external {
            activation.features.insert(item);
        } else {
            activation.unknown.push(item);
        }
    }

    for (dep, feature) in weak {
        let active = activation.optional_deps.contains(&dep)
            || (dependency_names.contains(dep.as_str()) && !optional_names.contains(dep.as_str()));
        if active {
            activation.dep_features.entry(dep).or_default().insert(feature);
        }
    }

    activation
}
