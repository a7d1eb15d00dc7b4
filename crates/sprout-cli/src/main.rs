//! # sprout
//!
//! Bootstraps a Rust package on a machine that has a compiler but no
//! package manager yet: resolves its dependency graph against a registry
//! index, downloads the sources and drives `rustc` directly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use sprout_core::error::SproutError;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod output;

use commands::CommandContext;
use output::errors::ErrorFormatter;

/// Bootstrap a Rust package from source without cargo
#[derive(Parser)]
#[command(name = "sprout", version, about = "Bootstrap a Rust package without cargo")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve and compile a package and all of its dependencies
    Build {
        #[command(flatten)]
        args: BootstrapArgs,
    },
    /// Resolve the dependency graph and print it as a tree
    Resolve {
        #[command(flatten)]
        args: BootstrapArgs,
    },
    /// Show the bounds of a version requirement and test versions against it
    Semver {
        range: String,
        versions: Vec<String>,
    },
    /// Show version information
    Version,
}

/// Options shared by commands that resolve a package
#[derive(Args, Debug, Clone, Default)]
pub struct BootstrapArgs {
    /// Package directory or path to its Cargo.toml
    #[arg(long, value_name = "PATH")]
    pub manifest_path: Option<PathBuf>,

    /// Registry index checkout to use
    #[arg(long = "index", value_name = "DIR")]
    pub index_dir: Option<PathBuf>,

    /// Index repository cloned when the checkout is missing
    #[arg(long, value_name = "URL")]
    pub index_url: Option<String>,

    /// Fail instead of cloning a missing index
    #[arg(long)]
    pub no_clone: bool,

    /// Directory for downloads and build output
    #[arg(long, value_name = "DIR")]
    pub target_dir: Option<PathBuf>,

    /// Target triple to build for
    #[arg(long, value_name = "TRIPLE")]
    pub target: Option<String>,

    /// Features of the root package to activate
    #[arg(long, value_delimiter = ',')]
    pub features: Vec<String>,

    /// Do not activate the root package's `default` feature
    #[arg(long)]
    pub no_default_features: bool,

    /// Build with optimizations
    #[arg(long)]
    pub release: bool,

    /// Value of NUM_JOBS passed to build scripts
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Abort when an archive does not match its index checksum
    #[arg(long)]
    pub strict_checksums: bool,

    /// Remove the target directory if the run fails
    #[arg(long)]
    pub clean_on_failure: bool,
}

impl BootstrapArgs {
    /// Settings overrides for the flags that were given
    pub fn overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        let mut set = |key: &str, value: String| {
            overrides.insert(key.to_string(), value);
        };

        if let Some(dir) = &self.index_dir {
            set("index-dir", dir.display().to_string());
        }
        if let Some(url) = &self.index_url {
            set("index-url", url.clone());
        }
        if self.no_clone {
            set("clone", "false".to_string());
        }
        if let Some(dir) = &self.target_dir {
            set("target-dir", dir.display().to_string());
        }
        if let Some(target) = &self.target {
            set("target", target.clone());
        }
        if !self.features.is_empty() {
            set("features", self.features.join(","));
        }
        if self.no_default_features {
            set("no-default-features", "true".to_string());
        }
        if self.release {
            set("release", "true".to_string());
        }
        if let Some(jobs) = self.jobs {
            set("jobs", jobs.to_string());
        }
        if self.strict_checksums {
            set("checksum-policy", "enforce".to_string());
        }
        if self.clean_on_failure {
            set("clean-on-failure", "true".to_string());
        }
        overrides
    }

    /// Directory holding the root manifest
    pub fn root_dir(&self, cwd: &Path) -> PathBuf {
        let Some(path) = &self.manifest_path else {
            return cwd.to_path_buf();
        };
        let path = cwd.join(path);
        match path.file_name() {
            Some(name) if name == "Cargo.toml" => path.parent().map(Path::to_path_buf).unwrap_or(path),
            _ => path,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose);
    setup_panic_handler();

    info!("Starting sprout v{}", env!("CARGO_PKG_VERSION"));

    match run_cli(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let formatter = ErrorFormatter::new();
            match err.downcast_ref::<SproutError>() {
                Some(sprout_err) => eprint!("{}", formatter.format_error(sprout_err)),
                None => eprintln!("{}", formatter.format_simple(&format!("{:#}", err))),
            }
            ExitCode::FAILURE
        },
    }
}

fn run_cli(cli: Cli) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new().context("Failed to create async runtime")?;

    rt.block_on(async {
        let ctx = CommandContext::new().await?;
        commands::dispatch_command(cli.command, &ctx).await
    })?;
    Ok(())
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let default = [
        "sprout",
        "sprout_core",
        "sprout_config",
        "sprout_registry",
        "sprout_cache",
        "sprout_resolver",
        "sprout_build",
    ]
    .iter()
    .map(|target| format!("{}={}", target, level))
    .collect::<Vec<_>>()
    .join(",");

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        error!("sprout encountered an unexpected error: {}", panic_info);
        eprintln!("sprout crashed! This is a bug.");
        eprintln!("Error: {}", panic_info);
    }));
}
