//! Unit tests for CLI commands.

use super::*;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use indexmap::IndexMap;
use sprout_build::{BuildContext, BuildResult, Invocation, ProcessOutput};
use sprout_config::{BuildSpec, BuildTarget, TargetKind};
use sprout_core::types::{DependencyKind, PackageId, PackageRecord, Version};
use sprout_resolver::{DependencyEdge, DependencyGraph, EdgeKey, ResolvedPackage};
use tempfile::TempDir;

use super::build::build_blocking;
use super::resolve::render_tree;
use super::semver::describe_bounds;

const HOST: &str = "x86_64-unknown-linux-gnu";

/// Answers `rustc -vV` and `rustc --print cfg` for an x86_64 linux host
struct LinuxToolchain;

impl Toolchain for LinuxToolchain {
    fn execute(&self, invocation: &Invocation) -> BuildResult<ProcessOutput> {
        let stdout = if invocation.args.iter().any(|arg| arg == "cfg") {
            "panic=\"unwind\"\ntarget_arch=\"x86_64\"\ntarget_env=\"gnu\"\ntarget_family=\"unix\"\n\
             target_feature=\"sse2\"\ntarget_has_atomic=\"64\"\ntarget_os=\"linux\"\n\
             target_pointer_width=\"64\"\nunix\n"
                .to_string()
        } else {
            format!("rustc 1.75.0\nhost: {}\n", HOST)
        };
        Ok(ProcessOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout,
            stderr: String::new(),
        })
    }
}

/// Succeeds at everything and records the thread each process ran on
#[derive(Clone, Default)]
struct ThreadRecordingToolchain {
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl Toolchain for ThreadRecordingToolchain {
    fn execute(&self, _invocation: &Invocation) -> BuildResult<ProcessOutput> {
        self.threads.lock().unwrap().push(std::thread::current().id());
        Ok(ProcessOutput {
            success: true,
            status: "exit status: 0".to_string(),
            stdout: String::new(),
            stderr: String::new(),
        })
    }
}

fn create_test_context(dir: &Path) -> CommandContext {
    CommandContext {
        cwd: dir.to_path_buf(),
        output: OutputHandler::new(),
    }
}

fn node(name: &str, version: &str) -> ResolvedPackage {
    ResolvedPackage::new(
        PackageRecord::new(name, Version::parse(version).unwrap()),
        BuildSpec::default(),
        PathBuf::from("/src").join(name),
    )
}

fn depend(parent: &mut ResolvedPackage, name: &str, child: &ResolvedPackage, kind: DependencyKind) {
    parent
        .dependencies
        .insert(EdgeKey::new(name, kind), DependencyEdge::new(child.id()));
}

fn resolution(packages: Vec<ResolvedPackage>) -> Resolution {
    let root: PackageId = packages[0].id();
    let packages: IndexMap<PackageId, ResolvedPackage> =
        packages.into_iter().map(|pkg| (pkg.id(), pkg)).collect();
    Resolution {
        root,
        graph: DependencyGraph::from_packages(&packages).unwrap(),
        packages,
        skipped: Vec::new(),
    }
}

#[test]
fn test_render_tree_marks_repeated_packages() {
    let mut app = node("app", "0.1.0");
    let mut bb = node("bb", "1.0.0");
    let mut cc = node("cc", "1.0.0");
    let dd = node("dd", "1.2.0");
    depend(&mut bb, "dd", &dd, DependencyKind::Normal);
    depend(&mut cc, "dd", &dd, DependencyKind::Normal);
    depend(&mut app, "bb", &bb, DependencyKind::Normal);
    depend(&mut app, "cc", &cc, DependencyKind::Normal);

    let tree = render_tree(&resolution(vec![app, bb, cc, dd]));
    let expected = "\
app v0.1.0
├── bb v1.0.0
│   └── dd v1.2.0
└── cc v1.0.0
    └── dd v1.2.0 (*)
";
    assert_eq!(tree, expected);
}

#[test]
fn test_render_tree_labels_renames_and_build_deps() {
    let mut app = node("app", "0.1.0");
    let cc = node("cc", "1.0.4");
    let log = node("log", "0.4.20");
    depend(&mut app, "cc", &cc, DependencyKind::Build);
    depend(&mut app, "logging", &log, DependencyKind::Normal);

    let tree = render_tree(&resolution(vec![app, cc, log]));
    assert!(tree.contains("├── cc v1.0.4 [build]\n"));
    assert!(tree.contains("└── log v0.4.20 as logging\n"));
}

#[test]
fn test_render_tree_same_name_normal_and_build() {
    let mut app = node("app", "0.1.0");
    let cc1 = node("cc", "1.0.0");
    let cc2 = node("cc", "2.0.0");
    depend(&mut app, "cc", &cc1, DependencyKind::Normal);
    depend(&mut app, "cc", &cc2, DependencyKind::Build);

    let tree = render_tree(&resolution(vec![app, cc1, cc2]));
    assert_eq!(tree, "app v0.1.0\n├── cc v1.0.0\n└── cc v2.0.0 [build]\n");
}

#[test]
fn test_describe_bounds() {
    let req = sprout_core::types::VersionReq::parse("^0.2.5, ~1.4, >=3").unwrap();
    let described: Vec<String> = req.ranges.iter().map(describe_bounds).collect();
    assert_eq!(described[0], "^0.2.5: >=0.2.5, <0.3.0");
    assert_eq!(described[1], "~1.4: >=1.4.0, <1.5.0");
    assert!(described[2].ends_with("compared directly"));
}

#[test]
fn test_bootstrap_args_overrides() {
    let args = BootstrapArgs {
        index_dir: Some(PathBuf::from("/tmp/index")),
        features: vec!["std".to_string(), "derive".to_string()],
        release: true,
        jobs: Some(4),
        strict_checksums: true,
        no_clone: true,
        ..Default::default()
    };

    let overrides = args.overrides();
    assert_eq!(overrides["index-dir"], "/tmp/index");
    assert_eq!(overrides["features"], "std,derive");
    assert_eq!(overrides["release"], "true");
    assert_eq!(overrides["jobs"], "4");
    assert_eq!(overrides["checksum-policy"], "enforce");
    assert_eq!(overrides["clone"], "false");
    assert!(!overrides.contains_key("target"));
    assert!(BootstrapArgs::default().overrides().is_empty());
}

#[test]
fn test_root_dir_from_manifest_path() {
    let cwd = Path::new("/work");
    assert_eq!(BootstrapArgs::default().root_dir(cwd), PathBuf::from("/work"));

    let args = BootstrapArgs {
        manifest_path: Some(PathBuf::from("pkg/Cargo.toml")),
        ..Default::default()
    };
    assert_eq!(args.root_dir(cwd), PathBuf::from("/work/pkg"));

    let args = BootstrapArgs {
        manifest_path: Some(PathBuf::from("/elsewhere/pkg")),
        ..Default::default()
    };
    assert_eq!(args.root_dir(cwd), PathBuf::from("/elsewhere/pkg"));
}

fn write_package(dir: &Path, manifest: &str) {
    fs::create_dir_all(dir.join("src")).unwrap();
    fs::write(dir.join("Cargo.toml"), manifest).unwrap();
    fs::write(dir.join("src/lib.rs"), "").unwrap();
}

#[tokio::test]
async fn test_prepare_resolves_path_dependencies_offline() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    fs::create_dir_all(root.join("index")).unwrap();
    fs::write(root.join("index/config.json"), r#"{"dl": "https://example.invalid/{crate}"}"#).unwrap();
    fs::write(root.join("sprout.toml"), format!("[build]\nhost = \"{}\"\n", HOST)).unwrap();

    write_package(
        &root.join("app"),
        r#"
[package]
name = "app"
version = "0.1.0"

[target.'cfg(target_has_atomic = "64")'.dependencies]
util = { path = "../util" }

[target.'cfg(windows)'.dependencies]
winutil = { path = "../winutil" }
"#,
    );
    write_package(
        &root.join("util"),
        r#"
[package]
name = "util"
version = "0.3.1"
"#,
    );

    let ctx = create_test_context(root);
    let args = BootstrapArgs {
        manifest_path: Some(PathBuf::from("app/Cargo.toml")),
        index_dir: Some(root.join("index")),
        target_dir: Some(root.join("target")),
        no_clone: true,
        ..Default::default()
    };

    let settings = load_settings(&args, &ctx).await.unwrap();
    assert_eq!(settings.host.as_deref(), Some(HOST));

    let prepared = prepare(&args, settings, &LinuxToolchain, &ctx).await.unwrap();
    assert_eq!(prepared.host, HOST);
    assert_eq!(prepared.resolution.len(), 2);
    assert_eq!(prepared.resolution.skipped.len(), 1);
    assert_eq!(prepared.resolution.skipped[0].name, "winutil");
    assert_eq!(render_tree(&prepared.resolution), "app v0.1.0\n└── util v0.3.1\n");
}

#[tokio::test]
async fn test_prepare_without_index_and_cloning_disabled() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::write(root.join("sprout.toml"), format!("[build]\nhost = \"{}\"\n", HOST)).unwrap();
    write_package(
        &root.join("app"),
        "[package]\nname = \"app\"\nversion = \"0.1.0\"\n",
    );

    let ctx = create_test_context(root);
    let args = BootstrapArgs {
        manifest_path: Some(PathBuf::from("app")),
        index_dir: Some(root.join("missing-index")),
        no_clone: true,
        ..Default::default()
    };

    let settings = load_settings(&args, &ctx).await.unwrap();
    let err = prepare(&args, settings, &LinuxToolchain, &ctx).await.err().unwrap();
    assert!(matches!(err, SproutError::ConfigValidation { ref field, .. } if field == "index-dir"));
}

#[tokio::test]
async fn test_semver_rejects_malformed_range() {
    let dir = TempDir::new().unwrap();
    let ctx = create_test_context(dir.path());

    assert!(semver::execute("^1.2", &["1.4.0".to_string()], &ctx).await.is_ok());
    assert!(semver::execute("not a range", &[], &ctx).await.is_err());
    assert!(semver::execute("^1.2", &["not-a-version".to_string()], &ctx).await.is_err());
}

#[tokio::test(flavor = "current_thread")]
async fn test_build_runs_off_the_runtime_thread() {
    let dir = TempDir::new().unwrap();
    let mut app = node("app", "0.1.0");
    app.build.targets.push(BuildTarget {
        kind: TargetKind::Lib,
        name: "app".to_string(),
        crate_name: "app".to_string(),
        path: PathBuf::from("/src/app/src/lib.rs"),
    });
    let resolution = resolution(vec![app]);

    let toolchain = ThreadRecordingToolchain::default();
    let context = BuildContext::new(dir.path(), HOST);
    let (report, resolution) = build_blocking(toolchain.clone(), context, resolution)
        .await
        .unwrap();

    assert_eq!(report.built.len(), 1);
    assert_eq!(resolution.len(), 1);
    let threads = toolchain.threads.lock().unwrap();
    assert_eq!(threads.len(), 1);
    assert_ne!(threads[0], std::thread::current().id());
}
