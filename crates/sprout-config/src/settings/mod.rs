//! Bootstrap settings: layering, fallback logic, and environment overrides
//!
//! Priority, lowest first: built-in defaults, the global
//! `~/.sprout/config.toml`, the nearest project `sprout.toml`, `SPROUT_*`
//! environment variables, command-line flags.

use crate::ConfigResult;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use sprout_core::error::SproutError;
use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;
use tracing::debug;

/// Registry index cloned when no index directory exists yet
pub const DEFAULT_INDEX_URL: &str = "https://github.com/rust-lang/crates.io-index.git";

/// Project settings file name
pub const PROJECT_SETTINGS: &str = "sprout.toml";

const ENV_PREFIX: &str = "SPROUT_";

/// What to do when an archive does not match its index checksum
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChecksumPolicy {
    /// Log a warning and use the archive anyway
    #[default]
    Warn,
    /// Abort the run
    Enforce,
}

/// Compilation profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    Debug,
    Release,
}

/// A value in a `[target.<triple>.<links>]` override table
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OverrideValue {
    One(String),
    Many(Vec<String>),
}

/// Replacement build-script output for one native library
pub type OverrideTable = BTreeMap<String, OverrideValue>;

/// Shape of both the global and the project settings file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub index: IndexSection,

    #[serde(default)]
    pub build: BuildSection,

    /// `[target.<triple>.<links>]`
    #[serde(default)]
    pub target: BTreeMap<String, BTreeMap<String, OverrideTable>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IndexSection {
    pub dir: Option<Utf8PathBuf>,
    pub url: Option<String>,
    pub clone: Option<bool>,
    pub registry_dir: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildSection {
    pub target_dir: Option<Utf8PathBuf>,
    pub target: Option<String>,
    pub host: Option<String>,
    pub jobs: Option<usize>,
    pub profile: Option<Profile>,
    pub rustc: Option<String>,
    pub checksum_policy: Option<ChecksumPolicy>,
    pub features: Option<Vec<String>>,
    pub no_default_features: Option<bool>,
    pub clean_on_failure: Option<bool>,
}

/// Fully merged settings for one run
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSettings {
    /// Registry index checkout; `<target_dir>/index` when unset
    pub index_dir: Option<Utf8PathBuf>,
    pub index_url: String,
    /// Where archives are unpacked; `<target_dir>/registry` when unset
    pub registry_dir: Option<Utf8PathBuf>,
    pub target_dir: Utf8PathBuf,
    /// Target triple; the host when unset
    pub target: Option<String>,
    /// Host triple; read from `rustc -vV` when unset
    pub host: Option<String>,
    pub jobs: usize,
    pub profile: Profile,
    pub checksum_policy: ChecksumPolicy,
    pub rustc: String,
    pub features: Vec<String>,
    pub no_default_features: bool,
    pub allow_clone: bool,
    pub clean_on_failure: bool,
    pub target_overrides: BTreeMap<String, BTreeMap<String, OverrideTable>>,
}

/// Where a settings layer came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    Defaults,
    Global(Utf8PathBuf),
    Project(Utf8PathBuf),
    Environment(String),
    CommandLine,
}

/// Loads and layers settings for a working directory
pub struct SettingsLoader {
    cwd: Utf8PathBuf,
    global_path: Option<Utf8PathBuf>,
}

impl FromStr for ChecksumPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "warn" => Ok(ChecksumPolicy::Warn),
            "enforce" => Ok(ChecksumPolicy::Enforce),
            other => Err(format!("expected 'warn' or 'enforce', got '{}'", other)),
        }
    }
}

impl Profile {
    pub fn name(self) -> &'static str {
        match self {
            Profile::Debug => "debug",
            Profile::Release => "release",
        }
    }

    pub fn opt_level(self) -> u8 {
        match self {
            Profile::Debug => 0,
            Profile::Release => 3,
        }
    }

    pub fn debuginfo(self) -> bool {
        matches!(self, Profile::Debug)
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" | "dev" => Ok(Profile::Debug),
            "release" => Ok(Profile::Release),
            other => Err(format!("expected 'debug' or 'release', got '{}'", other)),
        }
    }
}

impl OverrideValue {
    pub fn values(&self) -> Vec<&str> {
        match self {
            OverrideValue::One(value) => vec![value.as_str()],
            OverrideValue::Many(values) => values.iter().map(String::as_str).collect(),
        }
    }
}

impl SettingsFile {
    /// Parse settings file text
    pub fn parse(content: &str) -> ConfigResult<Self> {
        toml::from_str(content).map_err(|e| SproutError::TomlParse {
            message: e.message().to_string(),
            line: 0,
            column: 0,
        })
    }
}

impl Default for BootstrapSettings {
    fn default() -> Self {
        Self {
            index_dir: None,
            index_url: DEFAULT_INDEX_URL.to_string(),
            registry_dir: None,
            target_dir: Utf8PathBuf::from("target"),
            target: None,
            host: None,
            jobs: num_cpus::get(),
            profile: Profile::Debug,
            checksum_policy: ChecksumPolicy::Warn,
            rustc: "rustc".to_string(),
            features: Vec::new(),
            no_default_features: false,
            allow_clone: true,
            clean_on_failure: false,
            target_overrides: BTreeMap::new(),
        }
    }
}

impl BootstrapSettings {
    pub fn index_dir(&self) -> Utf8PathBuf {
        self.index_dir
            .clone()
            .unwrap_or_else(|| self.target_dir.join("index"))
    }

    pub fn registry_dir(&self) -> Utf8PathBuf {
        self.registry_dir
            .clone()
            .unwrap_or_else(|| self.target_dir.join("registry"))
    }

    /// Override table for a native library on a target
    pub fn override_for(&self, triple: &str, links: &str) -> Option<&OverrideTable> {
        self.target_overrides.get(triple)?.get(links)
    }

    /// Overlay every value a settings file sets
    pub fn apply_file(&mut self, file: SettingsFile) {
        let SettingsFile {
            index,
            build,
            target,
        } = file;

        if let Some(dir) = index.dir {
            self.index_dir = Some(dir);
        }
        if let Some(url) = index.url {
            self.index_url = url;
        }
        if let Some(clone) = index.clone {
            self.allow_clone = clone;
        }
        if let Some(dir) = index.registry_dir {
            self.registry_dir = Some(dir);
        }

        if let Some(dir) = build.target_dir {
            self.target_dir = dir;
        }
        if build.target.is_some() {
            self.target = build.target;
        }
        if build.host.is_some() {
            self.host = build.host;
        }
        if let Some(jobs) = build.jobs {
            self.jobs = jobs;
        }
        if let Some(profile) = build.profile {
            self.profile = profile;
        }
        if let Some(rustc) = build.rustc {
            self.rustc = rustc;
        }
        if let Some(policy) = build.checksum_policy {
            self.checksum_policy = policy;
        }
        if let Some(features) = build.features {
            self.features = features;
        }
        if let Some(flag) = build.no_default_features {
            self.no_default_features = flag;
        }
        if let Some(flag) = build.clean_on_failure {
            self.clean_on_failure = flag;
        }

        // Later files replace whole per-library tables
        for (triple, tables) in target {
            self.target_overrides.entry(triple).or_default().extend(tables);
        }
    }

    /// Apply `key -> value` overrides from the environment or the command
    /// line. Keys are kebab-case (`target-dir`); unknown keys are ignored.
    pub fn apply_overrides(&mut self, overrides: &HashMap<String, String>) -> ConfigResult<()> {
        // Sorted so errors are reported deterministically
        let mut keys: Vec<&String> = overrides.keys().collect();
        keys.sort();

        for key in keys {
            let value = &overrides[key];
            match key.as_str() {
                "index-dir" => self.index_dir = Some(Utf8PathBuf::from(value)),
                "index-url" => self.index_url = value.clone(),
                "registry-dir" => self.registry_dir = Some(Utf8PathBuf::from(value)),
                "target-dir" => self.target_dir = Utf8PathBuf::from(value),
                "target" => self.target = Some(value.clone()),
                "host" => self.host = Some(value.clone()),
                "rustc" => self.rustc = value.clone(),
                "jobs" => {
                    self.jobs = value.parse().map_err(|e| invalid(key, format!("{}", e)))?;
                },
                "profile" => self.profile = value.parse().map_err(|e| invalid(key, e))?,
                "release" => {
                    if parse_bool(key, value)? {
                        self.profile = Profile::Release;
                    }
                },
                "checksum-policy" => {
                    self.checksum_policy = value.parse().map_err(|e| invalid(key, e))?;
                },
                "features" => {
                    self.features = value
                        .split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|f| !f.is_empty())
                        .map(str::to_string)
                        .collect();
                },
                "no-default-features" => self.no_default_features = parse_bool(key, value)?,
                "clone" => self.allow_clone = parse_bool(key, value)?,
                "clean-on-failure" => self.clean_on_failure = parse_bool(key, value)?,
                other => debug!("Ignoring unknown setting '{}'", other),
            }
        }

        Ok(())
    }

    /// Make relative paths absolute against `base`
    pub fn anchor(&mut self, base: &Utf8Path) {
        let anchor = |path: &mut Utf8PathBuf| {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        };
        anchor(&mut self.target_dir);
        if let Some(dir) = self.index_dir.as_mut() {
            anchor(dir);
        }
        if let Some(dir) = self.registry_dir.as_mut() {
            anchor(dir);
        }
    }

    /// Validate the merged settings
    pub fn validate(&self) -> ConfigResult<()> {
        if self.jobs == 0 {
            return Err(invalid("jobs", "must be at least 1".to_string()));
        }
        if self.rustc.trim().is_empty() {
            return Err(invalid("rustc", "must not be empty".to_string()));
        }
        if self.index_url.trim().is_empty() {
            return Err(invalid("index-url", "must not be empty".to_string()));
        }
        Ok(())
    }
}

impl SettingsLoader {
    /// Create a loader rooted at `cwd`, using `~/.sprout/config.toml` as the
    /// global file when a home directory exists
    pub fn new(cwd: Utf8PathBuf) -> Self {
        let global_path = dirs::home_dir()
            .and_then(|home| Utf8PathBuf::try_from(home).ok())
            .map(|home| home.join(".sprout").join("config.toml"));
        Self { cwd, global_path }
    }

    /// Use a different global settings file
    pub fn with_global_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Find a file by walking up from the working directory
    pub fn resolve_config_path(&self, filename: &str) -> Option<Utf8PathBuf> {
        let mut current = Some(self.cwd.as_path());
        while let Some(dir) = current {
            let candidate = dir.join(filename);
            if candidate.is_file() {
                return Some(candidate);
            }
            current = dir.parent();
        }
        None
    }

    /// Read and parse one settings file
    pub async fn load_file(path: &Utf8Path) -> ConfigResult<SettingsFile> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| SproutError::io(format!("Failed to read {}", path), e))?;

        SettingsFile::parse(&content).map_err(|e| match e {
            SproutError::TomlParse {
                message,
                line,
                column,
            } => SproutError::TomlParse {
                message: format!("in {}: {}", path, message),
                line,
                column,
            },
            other => other,
        })
    }

    /// Merge every layer into the final settings
    pub async fn load(
        &self,
        env_overrides: &HashMap<String, String>,
        cli_overrides: &HashMap<String, String>,
    ) -> ConfigResult<(BootstrapSettings, Vec<ConfigSource>)> {
        let mut settings = BootstrapSettings::default();
        let mut sources = vec![ConfigSource::Defaults];

        if let Some(global) = self.global_path.as_ref().filter(|p| p.is_file()) {
            settings.apply_file(Self::load_file(global).await?);
            sources.push(ConfigSource::Global(global.clone()));
        }

        if let Some(project) = self.resolve_config_path(PROJECT_SETTINGS) {
            settings.apply_file(Self::load_file(&project).await?);
            sources.push(ConfigSource::Project(project));
        }

        settings.apply_overrides(env_overrides)?;
        let mut env_keys: Vec<&String> = env_overrides.keys().collect();
        env_keys.sort();
        sources.extend(env_keys.into_iter().map(|k| ConfigSource::Environment(k.clone())));

        if !cli_overrides.is_empty() {
            settings.apply_overrides(cli_overrides)?;
            sources.push(ConfigSource::CommandLine);
        }

        settings.anchor(&self.cwd);
        settings.validate()?;

        debug!(?sources, "Loaded settings");
        Ok((settings, sources))
    }

    /// Collect `SPROUT_*` environment variables as kebab-case keys
    pub fn collect_env_overrides() -> HashMap<String, String> {
        Self::env_overrides_from(std::env::vars())
    }

    fn env_overrides_from(vars: impl Iterator<Item = (String, String)>) -> HashMap<String, String> {
        vars.filter_map(|(key, value)| {
            let name = key.strip_prefix(ENV_PREFIX)?;
            Some((name.to_ascii_lowercase().replace('_', "-"), value))
        })
        .collect()
    }
}

fn invalid(field: &str, reason: String) -> SproutError {
    SproutError::ConfigValidation {
        field: field.to_string(),
        reason,
    }
}

fn parse_bool(field: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(invalid(field, format!("expected a boolean, got '{}'", other))),
    }
}
