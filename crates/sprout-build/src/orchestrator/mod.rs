//! Post-order build driver
//!
//! Every dependency of a package is built before the package itself, in
//! declaration order. Each package is compiled once per run; the memo is
//! written only after all of its targets succeeded.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use sprout_config::{BootstrapSettings, BuildTarget, OverrideTable, Profile, TargetKind};
use sprout_core::error::SproutError;
use sprout_core::types::{DependencyKind, PackageId};
use sprout_core::utils::{crate_name, envify};
use sprout_resolver::{NodeState, Resolution, ResolvedPackage};
use tracing::{debug, info, warn};

use crate::protocol::BuildScriptOutput;
use crate::toolchain::{Invocation, Toolchain};
use crate::BuildResult;

/// Run-wide build parameters
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub target_dir: PathBuf,
    pub host: String,
    pub target: String,
    pub jobs: usize,
    pub profile: Profile,
    pub rustc: String,
    /// Replacement build-script outputs for `target`, keyed by `links`
    pub overrides: BTreeMap<String, OverrideTable>,
}

/// What building one package produced
#[derive(Debug, Clone)]
pub struct BuiltPackage {
    pub id: PackageId,
    /// `--crate-name` and rlib of the library target
    pub lib: Option<(String, PathBuf)>,
    pub binaries: Vec<PathBuf>,
    pub script_output: Option<BuildScriptOutput>,
    /// Native search paths of this package and everything below it
    pub search_paths: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    /// Packages in the order they finished
    pub built: Vec<PackageId>,
    /// Executables of the root package
    pub binaries: Vec<PathBuf>,
}

/// Compiles a `Resolution` through a `Toolchain`
pub struct BuildOrchestrator<T> {
    toolchain: T,
    context: BuildContext,
    built: IndexMap<PackageId, BuiltPackage>,
    stack: Vec<PackageId>,
}

impl BuildContext {
    /// Native build with default settings
    pub fn new(target_dir: impl Into<PathBuf>, host: impl Into<String>) -> Self {
        let host = host.into();
        Self {
            target_dir: target_dir.into(),
            target: host.clone(),
            host,
            jobs: 1,
            profile: Profile::Debug,
            rustc: "rustc".to_string(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn from_settings(settings: &BootstrapSettings, host: impl Into<String>) -> Self {
        let host = host.into();
        let target = settings.target.clone().unwrap_or_else(|| host.clone());
        Self {
            target_dir: settings.target_dir.clone().into_std_path_buf(),
            overrides: settings.target_overrides.get(&target).cloned().unwrap_or_default(),
            host,
            target,
            jobs: settings.jobs,
            profile: settings.profile,
            rustc: settings.rustc.clone(),
        }
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.target_dir.join(self.profile.name())
    }

    /// Shared output directory of every compiler invocation
    pub fn deps_dir(&self) -> PathBuf {
        self.profile_dir().join("deps")
    }

    /// `OUT_DIR` of one package
    pub fn out_dir(&self, id: &PackageId) -> PathBuf {
        self.profile_dir().join("build").join(id.to_string()).join("out")
    }

    pub fn is_cross(&self) -> bool {
        self.target != self.host
    }

    fn exe_suffix(&self) -> &'static str {
        if self.target.contains("windows") {
            ".exe"
        } else {
            ""
        }
    }
}

impl<T: Toolchain> BuildOrchestrator<T> {
    pub fn new(toolchain: T, context: BuildContext) -> Self {
        Self {
            toolchain,
            context,
            built: IndexMap::new(),
            stack: Vec::new(),
        }
    }

    pub fn built(&self, id: &PackageId) -> Option<&BuiltPackage> {
        self.built.get(id)
    }

    /// Build the root of `resolution` and everything it depends on
    pub fn build(&mut self, resolution: &mut Resolution) -> BuildResult<BuildReport> {
        let deps_dir = self.context.deps_dir();
        std::fs::create_dir_all(&deps_dir)
            .map_err(|e| SproutError::io(format!("Failed to create {}", deps_dir.display()), e))?;

        let root = resolution.root.clone();
        self.build_package(resolution, &root)?;

        let binaries = self
            .built
            .get(&root)
            .map(|built| built.binaries.clone())
            .unwrap_or_default();
        info!("Finished building {} packages", self.built.len());

        Ok(BuildReport {
            built: self.built.keys().cloned().collect(),
            binaries,
        })
    }

    fn build_package(&mut self, resolution: &mut Resolution, id: &PackageId) -> BuildResult<()> {
        if self.built.contains_key(id) {
            return Ok(());
        }
        if let Some(start) = self.stack.iter().position(|entry| entry == id) {
            let mut cycle: Vec<String> = self.stack[start..].iter().map(ToString::to_string).collect();
            cycle.push(id.to_string());
            return Err(SproutError::CircularDependency {
                cycle: cycle.join(" -> "),
            });
        }

        let package = resolution.package(id).cloned().ok_or_else(|| SproutError::NotFound {
            name: id.name.clone(),
            req: format!("={}", id.version),
            requested_by: "build".to_string(),
        })?;

        self.stack.push(id.clone());
        for edge in package.dependencies.values() {
            self.build_package(resolution, &edge.id)?;
        }
        let built = self.compile(&package, resolution)?;
        self.stack.pop();

        if let Some(node) = resolution.package_mut(id) {
            node.state = NodeState::Built;
            if let Some(output) = &built.script_output {
                node.exported_env = output.metadata.iter().cloned().collect();
            }
        }
        self.built.insert(id.clone(), built);
        Ok(())
    }

    fn compile(&self, package: &ResolvedPackage, resolution: &Resolution) -> BuildResult<BuiltPackage> {
        let id = package.id();
        let features: Vec<&str> = package.features.iter().map(String::as_str).collect();
        info!("Compiling {} (features: [{}])", id, features.join(", "));

        let out_dir = self.context.out_dir(&id);
        std::fs::create_dir_all(&out_dir)
            .map_err(|e| SproutError::io(format!("Failed to create {}", out_dir.display()), e))?;

        let mut env = self.base_env(package, &out_dir);
        let mut search_paths: Vec<String> = Vec::new();
        for edge in package.dependencies.values() {
            if let Some(dep) = resolution.package(&edge.id) {
                let prefix = envify(dep.links_or_name());
                for (key, value) in &dep.exported_env {
                    env.insert(format!("DEP_{}_{}", prefix, envify(key)), value.clone());
                }
            }
            if let Some(built) = self.built.get(&edge.id) {
                extend_unique(&mut search_paths, &built.search_paths);
            }
        }

        let script_output = self.run_build_step(package, &env, &search_paths)?;
        let native_links = match &script_output {
            Some(output) => {
                for warning in &output.warnings {
                    warn!("{}: {}", id, warning);
                }
                env.extend(output.env.iter().cloned());
                env.extend(output.feature_env());
                extend_unique(&mut search_paths, &output.library_paths);
                output.link_args()
            },
            None => match package.build.links.as_deref().or(package.record.links.as_deref()) {
                Some(links) => vec!["-l".to_string(), links.to_string()],
                None => Vec::new(),
            },
        };

        let deps_dir = self.context.deps_dir();
        let suffix = package.record.version.file_suffix();
        let mut lib: Option<(String, PathBuf)> = None;
        let mut binaries = Vec::new();

        for target in &package.build.targets {
            if target.kind == TargetKind::BuildScript {
                continue;
            }

            let mut externs = self.externs(package, DependencyKind::Normal)?;
            if target.kind == TargetKind::Bin {
                externs.extend(lib.clone());
            }

            let mut args = self.common_args(package, target, &externs);
            if self.context.is_cross() {
                args.push("--target".to_string());
                args.push(self.context.target.clone());
            }
            args.extend(native_links.iter().cloned());
            if let Some(output) = &script_output {
                args.extend(output.cfg_args());
            }
            args.extend(search_args(&search_paths));

            self.run_compiler(package, target, args, &env)?;

            match target.kind {
                TargetKind::Lib => {
                    let rlib = deps_dir.join(format!("lib{}-{}.rlib", target.crate_name, suffix));
                    lib = Some((target.crate_name.clone(), rlib));
                },
                TargetKind::Bin => {
                    binaries.push(deps_dir.join(format!(
                        "{}-{}{}",
                        target.crate_name,
                        suffix,
                        self.context.exe_suffix()
                    )));
                },
                TargetKind::BuildScript => {},
            }
        }

        Ok(BuiltPackage {
            id,
            lib,
            binaries,
            script_output,
            search_paths,
        })
    }

    /// Compile and run the build script, or take its configured override
    fn run_build_step(
        &self,
        package: &ResolvedPackage,
        env: &BTreeMap<String, String>,
        search_paths: &[String],
    ) -> BuildResult<Option<BuildScriptOutput>> {
        let id = package.id();
        let links = package.build.links.as_deref().or(package.record.links.as_deref());
        if let Some(table) = links.and_then(|links| self.context.overrides.get(links)) {
            info!("Using configured build script output for {}", id);
            return BuildScriptOutput::from_override(table, &id.to_string()).map(Some);
        }

        let Some(script) = package.build.build_script() else {
            return Ok(None);
        };

        let externs = self.externs(package, DependencyKind::Build)?;
        let mut args = self.common_args(package, script, &externs);
        args.extend(search_args(search_paths));
        self.run_compiler(package, script, args, env)?;

        let exe = self.context.deps_dir().join(format!(
            "{}-{}{}",
            script.crate_name,
            package.record.version.file_suffix(),
            std::env::consts::EXE_SUFFIX
        ));
        let invocation = Invocation::new(exe).envs(env).cwd(&package.manifest_dir);
        info!("Running build script of {}", id);
        debug!("Running `{}`", invocation);

        let output = self.toolchain.execute(&invocation)?;
        if !output.success {
            return Err(SproutError::BuildFailure {
                package: id.to_string(),
                target: format!("{} (run)", script.name),
                status: output.status,
                stderr: output.stderr,
            });
        }

        BuildScriptOutput::parse(&output.stdout, &id.to_string()).map(Some)
    }

    fn run_compiler(
        &self,
        package: &ResolvedPackage,
        target: &BuildTarget,
        args: Vec<String>,
        env: &BTreeMap<String, String>,
    ) -> BuildResult<()> {
        let invocation = Invocation::new(&self.context.rustc)
            .args(args)
            .envs(env)
            .cwd(&package.manifest_dir);
        debug!("Running `{}`", invocation);

        let output = self.toolchain.execute(&invocation)?;
        if output.success {
            return Ok(());
        }
        Err(SproutError::BuildFailure {
            package: package.id().to_string(),
            target: target.name.clone(),
            status: output.status,
            stderr: output.stderr,
        })
    }

    /// Arguments shared by every target of a package
    fn common_args(
        &self,
        package: &ResolvedPackage,
        target: &BuildTarget,
        externs: &[(String, PathBuf)],
    ) -> Vec<String> {
        let deps_dir = self.context.deps_dir();
        let crate_type = match target.kind {
            TargetKind::Lib => "lib",
            TargetKind::Bin | TargetKind::BuildScript => "bin",
        };

        let mut args = vec![
            target.path.display().to_string(),
            "--crate-name".to_string(),
            target.crate_name.clone(),
            "--crate-type".to_string(),
            crate_type.to_string(),
        ];
        if let Some(edition) = &package.build.edition {
            args.push("--edition".to_string());
            args.push(edition.clone());
        }
        for feature in &package.features {
            args.push("--cfg".to_string());
            args.push(format!("feature=\"{}\"", feature));
        }
        args.push("-C".to_string());
        args.push(format!("extra-filename=-{}", package.record.version.file_suffix()));
        args.push("--out-dir".to_string());
        args.push(deps_dir.display().to_string());
        args.push("-L".to_string());
        args.push(format!("dependency={}", deps_dir.display()));
        for (name, rlib) in externs {
            args.push("--extern".to_string());
            args.push(format!("{}={}", name, rlib.display()));
        }

        args.push("-C".to_string());
        args.push(format!("opt-level={}", self.context.profile.opt_level()));
        if self.context.profile.debuginfo() {
            args.push("-g".to_string());
        }
        args
    }

    /// Libraries of built direct dependencies that reach `kind` targets
    fn externs(&self, package: &ResolvedPackage, kind: DependencyKind) -> BuildResult<Vec<(String, PathBuf)>> {
        let mut externs = Vec::new();
        for (name, edge) in package.dependencies_of_kind(kind) {
            let built = self.built.get(&edge.id).ok_or_else(|| SproutError::NotFound {
                name: edge.id.name.clone(),
                req: format!("={}", edge.id.version),
                requested_by: package.id().to_string(),
            })?;
            let Some((lib_crate, rlib)) = &built.lib else {
                continue;
            };
            let extern_name = if name != edge.id.name {
                crate_name(name)
            } else {
                lib_crate.clone()
            };
            externs.push((extern_name, rlib.clone()));
        }
        Ok(externs)
    }

    fn base_env(&self, package: &ResolvedPackage, out_dir: &Path) -> BTreeMap<String, String> {
        let version = &package.record.version;
        let profile = self.context.profile;
        let mut env = BTreeMap::new();
        let mut set = |key: &str, value: String| {
            env.insert(key.to_string(), value);
        };

        set("OUT_DIR", out_dir.display().to_string());
        set("TARGET", self.context.target.clone());
        set("HOST", self.context.host.clone());
        set("NUM_JOBS", self.context.jobs.to_string());
        set("CARGO_MANIFEST_DIR", package.manifest_dir.display().to_string());
        set("OPT_LEVEL", profile.opt_level().to_string());
        set("DEBUG", profile.debuginfo().to_string());
        set("PROFILE", profile.name().to_string());
        set("RUSTC", self.context.rustc.clone());
        set("CARGO_PKG_NAME", package.record.name.clone());
        set("CARGO_PKG_VERSION", version.to_string());
        set("CARGO_PKG_VERSION_MAJOR", version.major.to_string());
        set("CARGO_PKG_VERSION_MINOR", version.minor.to_string());
        set("CARGO_PKG_VERSION_PATCH", version.patch.to_string());
        set("CARGO_PKG_VERSION_PRE", version.pre.to_string());
        if let Some(links) = package.build.links.as_deref().or(package.record.links.as_deref()) {
            set("CARGO_MANIFEST_LINKS", links.to_string());
        }
        for feature in &package.features {
            set(&format!("CARGO_FEATURE_{}", envify(feature)), "1".to_string());
        }
        env
    }
}

fn search_args(paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .flat_map(|path| ["-L".to_string(), path.clone()])
        .collect()
}

fn extend_unique(into: &mut Vec<String>, items: &[String]) {
    for item in items {
        if !into.contains(item) {
            into.push(item.clone());
        }
    }
}
