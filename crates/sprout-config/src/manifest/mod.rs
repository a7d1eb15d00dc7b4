//! Package manifest parsing.
//!
//! Reads a package's TOML manifest and normalizes it into the same
//! `PackageRecord` shape index records use, plus the `BuildSpec` that tells
//! the build driver what to compile.

use crate::ConfigResult;
use indexmap::IndexMap;
use serde::Deserialize;
use sprout_core::error::SproutError;
use sprout_core::types::{
    Dependency, DependencyKind, FeatureList, FeatureTable, PackageRecord, Source, Version,
    VersionReq,
};
use sprout_core::utils::crate_name;
use std::path::{Path, PathBuf};

/// File name of a package manifest
pub const MANIFEST_NAME: &str = "Cargo.toml";

/// A parsed package manifest
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    pub package: Option<PackageSection>,

    /// Legacy name of `[package]`
    pub project: Option<PackageSection>,

    pub lib: Option<OneOrMany<LibSection>>,

    pub bin: Option<OneOrMany<BinSection>>,

    #[serde(default)]
    pub dependencies: IndexMap<String, DependencySpec>,

    #[serde(default, rename = "build-dependencies", alias = "build_dependencies")]
    pub build_dependencies: IndexMap<String, DependencySpec>,

    #[serde(default, rename = "dev-dependencies", alias = "dev_dependencies")]
    pub dev_dependencies: IndexMap<String, DependencySpec>,

    /// Platform-specific dependency tables keyed by triple or `cfg(...)`
    #[serde(default)]
    pub target: IndexMap<String, TargetSection>,

    #[serde(default)]
    pub features: FeatureTable,
}

/// `[package]` section
#[derive(Debug, Clone, Deserialize)]
pub struct PackageSection {
    pub name: String,

    /// Kept as text so a bad version reports the manifest path
    pub version: String,

    pub build: Option<BuildSetting>,

    pub links: Option<String>,

    pub edition: Option<String>,
}

/// `build = false` or `build = "path/to/build.rs"`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum BuildSetting {
    Enabled(bool),
    Path(String),
}

/// A table that old manifests also wrote as an array of tables
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct LibSection {
    pub name: Option<String>,
    pub path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinSection {
    pub name: String,
    pub path: Option<String>,
}

/// `[target.<spec>]` section
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetSection {
    #[serde(default)]
    pub dependencies: IndexMap<String, DependencySpec>,

    #[serde(default, rename = "build-dependencies", alias = "build_dependencies")]
    pub build_dependencies: IndexMap<String, DependencySpec>,
}

/// Dependency specification (simple string or detailed table)
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DependencySpec {
    /// Simple version requirement string
    Simple(String),

    /// Detailed dependency specification
    Detailed {
        version: Option<String>,

        path: Option<String>,

        git: Option<String>,

        #[serde(default)]
        features: FeatureList,

        #[serde(default)]
        optional: bool,

        #[serde(default = "default_features_true", rename = "default-features", alias = "default_features")]
        default_features: bool,

        /// Registry name when the key renames the dependency
        package: Option<String>,
    },
}

/// What a compiler invocation produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    Lib,
    Bin,
    BuildScript,
}

/// One compilation unit of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    pub kind: TargetKind,
    pub name: String,
    /// Identifier passed as `--crate-name`
    pub crate_name: String,
    /// Absolute path of the entry source file
    pub path: PathBuf,
}

/// Everything the build driver needs beyond the package record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSpec {
    /// Build step first, then the library, then binaries
    pub targets: Vec<BuildTarget>,
    pub links: Option<String>,
    pub edition: Option<String>,
}

/// Default value for default-features (true)
fn default_features_true() -> bool {
    true
}

impl DependencySpec {
    /// Requirement text; path dependencies without a version accept any
    pub fn version_text(&self) -> &str {
        match self {
            DependencySpec::Simple(version) => version,
            DependencySpec::Detailed {
                version: Some(version),
                ..
            } => version,
            DependencySpec::Detailed { version: None, .. } => "*",
        }
    }

    fn to_dependency(
        &self,
        name: &str,
        kind: DependencyKind,
        target: Option<&str>,
        dir: &Path,
    ) -> Result<Dependency, String> {
        let req_text = self.version_text().trim().to_string();
        let req = VersionReq::parse(&req_text)
            .map_err(|e| format!("dependency '{}' has an invalid requirement: {}", name, e))?;

        let mut dep = Dependency {
            name: name.to_string(),
            package: name.to_string(),
            req,
            req_text,
            kind,
            optional: false,
            features: Vec::new(),
            default_features: true,
            target: target.map(str::to_string),
            path: None,
        };

        if let DependencySpec::Detailed {
            path,
            git,
            features,
            optional,
            default_features,
            package,
            ..
        } = self
        {
            // dev-dependencies are never fetched
            if git.is_some() && !kind.is_dev_only() {
                return Err(format!("dependency '{}' uses git, which is not supported", name));
            }
            dep.path = path.as_ref().map(|p| dir.join(p));
            dep.features = features.clone().into_names();
            dep.optional = *optional;
            dep.default_features = *default_features;
            if let Some(package) = package {
                dep.package = package.clone();
            }
        }

        Ok(dep)
    }
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

impl Manifest {
    /// Parse manifest text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| toml_error(content, &e))
    }

    /// Read and parse the manifest in `dir`
    pub async fn load(dir: &Path) -> ConfigResult<Self> {
        let path = dir.join(MANIFEST_NAME);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| SproutError::io(format!("Failed to read {}", path.display()), e))?;

        Self::parse(&content).map_err(|e| match e {
            SproutError::TomlParse {
                message,
                line,
                column,
            } => SproutError::TomlParse {
                message: format!("in {}: {}", path.display(), message),
                line,
                column,
            },
            other => other,
        })
    }

    /// The `[package]` section, falling back to legacy `[project]`
    pub fn package_section(&self) -> Option<&PackageSection> {
        self.package.as_ref().or(self.project.as_ref())
    }

    /// Normalize into a package record and build description
    pub fn to_package(&self, dir: &Path, source: Source) -> ConfigResult<(PackageRecord, BuildSpec)> {
        let manifest_path = dir.join(MANIFEST_NAME);
        let invalid = |reason: String| SproutError::Manifest {
            path: manifest_path.display().to_string(),
            reason,
        };

        let package = self
            .package_section()
            .ok_or_else(|| invalid("missing [package] section".to_string()))?;

        if !PackageRecord::is_valid_name(&package.name) {
            return Err(invalid(format!("invalid package name '{}'", package.name)));
        }

        let version = Version::parse(&package.version)
            .map_err(|e| invalid(format!("invalid version: {}", e)))?;

        let dependencies = self.dependencies(dir).map_err(invalid)?;
        let targets = self.targets(package, dir).map_err(invalid)?;

        let record = PackageRecord {
            name: package.name.clone(),
            version,
            dependencies,
            features: self.features.clone().into_map(),
            checksum: None,
            source,
            links: package.links.clone(),
        };

        let spec = BuildSpec {
            targets,
            links: package.links.clone(),
            edition: package.edition.clone(),
        };

        Ok((record, spec))
    }

    /// All declarations in manifest order: normal, build, platform tables, dev
    fn dependencies(&self, dir: &Path) -> Result<Vec<Dependency>, String> {
        let mut tables: Vec<(&IndexMap<String, DependencySpec>, DependencyKind, Option<&str>)> = vec![
            (&self.dependencies, DependencyKind::Normal, None),
            (&self.build_dependencies, DependencyKind::Build, None),
        ];
        for (spec, section) in &self.target {
            tables.push((&section.dependencies, DependencyKind::Normal, Some(spec.as_str())));
            tables.push((&section.build_dependencies, DependencyKind::Build, Some(spec.as_str())));
        }
        tables.push((&self.dev_dependencies, DependencyKind::Dev, None));

        let mut dependencies = Vec::new();
        for (table, kind, target) in tables {
            for (name, spec) in table {
                dependencies.push(spec.to_dependency(name, kind, target, dir)?);
            }
        }
        Ok(dependencies)
    }

    fn targets(&self, package: &PackageSection, dir: &Path) -> Result<Vec<BuildTarget>, String> {
        let package_crate = crate_name(&package.name);
        let mut targets = Vec::new();

        let build_path = match &package.build {
            Some(BuildSetting::Enabled(false)) => None,
            Some(BuildSetting::Path(path)) => Some(path.clone()),
            _ => dir.join("build.rs").is_file().then(|| "build.rs".to_string()),
        };
        if let Some(path) = build_path {
            targets.push(BuildTarget {
                kind: TargetKind::BuildScript,
                name: "build-script-build".to_string(),
                crate_name: format!("build_script_{}", package_crate),
                path: locate(dir, &path)?,
            });
        }

        let libs = match self.lib.clone() {
            Some(libs) => libs.into_vec(),
            None if dir.join("src/lib.rs").is_file() => vec![LibSection {
                name: None,
                path: None,
            }],
            None => Vec::new(),
        };
        for lib in libs {
            let name = lib.name.unwrap_or_else(|| package.name.clone());
            let path = lib.path.unwrap_or_else(|| "src/lib.rs".to_string());
            targets.push(BuildTarget {
                kind: TargetKind::Lib,
                crate_name: crate_name(&name),
                name,
                path: locate(dir, &path)?,
            });
        }

        let bins = match self.bin.clone() {
            Some(bins) => bins.into_vec(),
            None if dir.join("src/main.rs").is_file() => vec![BinSection {
                name: package.name.clone(),
                path: None,
            }],
            None => Vec::new(),
        };
        for bin in bins {
            let path = match bin.path {
                Some(path) => path,
                None if bin.name == package.name => "src/main.rs".to_string(),
                None => format!("src/bin/{}.rs", bin.name),
            };
            targets.push(BuildTarget {
                kind: TargetKind::Bin,
                crate_name: crate_name(&bin.name),
                name: bin.name,
                path: locate(dir, &path)?,
            });
        }

        if !targets.iter().any(|t| t.kind != TargetKind::BuildScript) {
            return Err("no library or binary target found".to_string());
        }

        Ok(targets)
    }
}

impl BuildSpec {
    pub fn build_script(&self) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.kind == TargetKind::BuildScript)
    }

    pub fn lib(&self) -> Option<&BuildTarget> {
        self.targets.iter().find(|t| t.kind == TargetKind::Lib)
    }
}

/// Resolve a target path, also trying it under `src/` as old manifests
/// wrote paths relative to it
fn locate(dir: &Path, path: &str) -> Result<PathBuf, String> {
    let direct = dir.join(path);
    if direct.is_file() {
        return Ok(direct);
    }
    let under_src = dir.join("src").join(path);
    if under_src.is_file() {
        return Ok(under_src);
    }
    Err(format!("could not find target source '{}'", path))
}

fn toml_error(content: &str, err: &toml::de::Error) -> SproutError {
    let (line, column) = err
        .span()
        .map(|span| line_col(content, span.start))
        .unwrap_or((0, 0));
    SproutError::TomlParse {
        message: err.message().to_string(),
        line,
        column,
    }
}

fn line_col(content: &str, offset: usize) -> (usize, usize) {
    let before = content.get(..offset).unwrap_or(content);
    let line = before.matches('\n').count() + 1;
    let column = match before.rfind('\n') {
        Some(newline) => before.len() - newline,
        None => before.len() + 1,
    };
    (line, column)
}
