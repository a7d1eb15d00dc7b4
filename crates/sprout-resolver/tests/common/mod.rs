//! On-disk registry fixtures for resolver tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use sprout_cache::{ArchiveFetcher, CacheResult, PackageFetcher};
use sprout_config::ChecksumPolicy;
use sprout_core::error::SproutError;
use sprout_core::types::Platform;
use sprout_core::utils::sha256_hex;
use sprout_registry::{IndexConfig, RegistryIndex};
use sprout_resolver::{DependencyResolver, ResolveOptions};
use tempfile::TempDir;

pub const HOST: &str = "x86_64-unknown-linux-gnu";

/// `rustc --print cfg` for x86_64 linux
pub const HOST_CFG: &str = r#"debug_assertions
panic="unwind"
target_abi=""
target_arch="x86_64"
target_endian="little"
target_env="gnu"
target_family="unix"
target_feature="fxsr"
target_feature="sse"
target_feature="sse2"
target_has_atomic="16"
target_has_atomic="32"
target_has_atomic="64"
target_has_atomic="8"
target_has_atomic="ptr"
target_os="linux"
target_pointer_width="64"
target_vendor="unknown"
unix
"#;

/// `rustc --print cfg` for x86_64 windows msvc
pub const WINDOWS_CFG: &str = r#"debug_assertions
panic="unwind"
target_arch="x86_64"
target_endian="little"
target_env="msvc"
target_family="windows"
target_feature="sse2"
target_has_atomic="64"
target_os="windows"
target_pointer_width="64"
target_vendor="pc"
windows
"#;

pub fn host_platform() -> Platform {
    Platform::new(HOST, HOST_CFG).unwrap()
}

pub fn windows_platform() -> Platform {
    Platform::new("x86_64-pc-windows-msvc", WINDOWS_CFG).unwrap()
}

/// Serves archives from memory and records every URL it is asked for
#[derive(Clone, Default)]
pub struct MemoryFetcher {
    archives: HashMap<String, Vec<u8>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ArchiveFetcher for MemoryFetcher {
    async fn fetch(&self, url: &str) -> CacheResult<Vec<u8>> {
        self.calls.lock().unwrap().push(url.to_string());
        self.archives.get(url).cloned().ok_or_else(|| SproutError::Network {
            message: format!("{} returned HTTP 404 Not Found", url),
            source: None,
        })
    }
}

pub struct Fixture {
    pub dir: TempDir,
    fetcher: MemoryFetcher,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("index")).unwrap();
        Self {
            dir,
            fetcher: MemoryFetcher::default(),
        }
    }

    pub fn index_dir(&self) -> PathBuf {
        self.dir.path().join("index")
    }

    pub fn registry_dir(&self) -> PathBuf {
        self.dir.path().join("registry")
    }

    /// Publish a version whose index checksum matches its archive
    pub fn publish(&mut self, name: &str, vers: &str, deps: Vec<Value>, features: Value) {
        let archive = package_archive(name, vers, "");
        let cksum = sha256_hex(&archive);
        self.publish_archive(name, vers, deps, features, archive, &cksum);
    }

    pub fn publish_archive(
        &mut self,
        name: &str,
        vers: &str,
        deps: Vec<Value>,
        features: Value,
        archive: Vec<u8>,
        cksum: &str,
    ) {
        let line = json!({
            "name": name,
            "vers": vers,
            "deps": deps,
            "features": features,
            "cksum": cksum,
        });
        let path = self.index_dir().join(RegistryIndex::index_path(name));
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = fs::OpenOptions::new().create(true).append(true).open(path).unwrap();
        writeln!(file, "{}", line).unwrap();

        self.fetcher.archives.insert(url(name, vers), archive);
    }

    /// Write the root package and return its directory
    pub fn root(&self, manifest: &str) -> PathBuf {
        self.local_package("app", manifest)
    }

    pub fn local_package(&self, dir_name: &str, manifest: &str) -> PathBuf {
        let dir = self.dir.path().join(dir_name);
        fs::create_dir_all(dir.join("src")).unwrap();
        fs::write(dir.join("Cargo.toml"), manifest).unwrap();
        fs::write(dir.join("src/lib.rs"), "").unwrap();
        dir
    }

    pub fn resolver(&self, policy: ChecksumPolicy) -> DependencyResolver<MemoryFetcher> {
        self.resolver_with(ResolveOptions::new(host_platform()), policy)
    }

    pub fn resolver_with(&self, options: ResolveOptions, policy: ChecksumPolicy) -> DependencyResolver<MemoryFetcher> {
        let config = IndexConfig {
            dl: "mem://{crate}-{version}".to_string(),
            api: None,
        };
        DependencyResolver::new(
            RegistryIndex::new(self.index_dir()),
            config,
            PackageFetcher::new(self.fetcher.clone(), self.registry_dir(), policy),
            options,
        )
    }

    /// URLs downloaded so far, in order
    pub fn downloads(&self) -> Vec<String> {
        self.fetcher.calls.lock().unwrap().clone()
    }
}

pub fn url(name: &str, vers: &str) -> String {
    format!("mem://{}-{}", name, vers)
}

/// Index dependency entry with default settings
pub fn dep(name: &str, req: &str) -> Value {
    json!({
        "name": name,
        "req": req,
        "features": [],
        "optional": false,
        "default_features": true,
        "target": null,
        "kind": "normal",
    })
}

/// Apply overrides on top of `dep(name, req)`
pub fn dep_with(name: &str, req: &str, extra: Value) -> Value {
    let mut base = dep(name, req);
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    base
}

/// Gzip'd tarball of a minimal library package
pub fn package_archive(name: &str, vers: &str, manifest_extra: &str) -> Vec<u8> {
    let manifest = format!(
        "[package]\nname = \"{}\"\nversion = \"{}\"\n{}",
        name, vers, manifest_extra
    );
    tarball(&[
        (format!("{}-{}/Cargo.toml", name, vers), manifest),
        (format!("{}-{}/src/lib.rs", name, vers), String::new()),
    ])
}

pub fn tarball(files: &[(String, String)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (path, content) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, path, content.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}
