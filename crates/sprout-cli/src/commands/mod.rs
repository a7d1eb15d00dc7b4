//! Command implementations and dispatch logic.
//!
//! `build` and `resolve` share the same front half: load settings, open the
//! index and resolve the root package. That part lives in `prepare`.

use std::path::PathBuf;

use camino::Utf8PathBuf;
use sprout_build::Toolchain;
use sprout_cache::{HttpFetcher, PackageFetcher};
use sprout_config::{BootstrapSettings, SettingsLoader};
use sprout_core::error::{SproutError, SproutResult};
use sprout_registry::{GitCli, IndexConfig, RegistryIndex, SourceControl};
use sprout_resolver::{DependencyResolver, Resolution, ResolveOptions};
use tracing::{debug, info};

pub mod build;
pub mod resolve;
pub mod semver;

#[cfg(test)]
mod tests;

use crate::output::OutputHandler;
use crate::{BootstrapArgs, Commands};

/// Shared context for all commands
pub struct CommandContext {
    pub cwd: PathBuf,
    pub output: OutputHandler,
}

/// Settings and resolved graph a command operates on
pub struct Prepared {
    pub settings: BootstrapSettings,
    pub host: String,
    pub resolution: Resolution,
}

impl CommandContext {
    pub async fn new() -> SproutResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| SproutError::io("Failed to get current directory".to_string(), e))?;

        Ok(Self {
            cwd,
            output: OutputHandler::new(),
        })
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> SproutResult<()> {
    match command {
        Commands::Build { args } => {
            info!("Building package (release: {})", args.release);
            build::execute(args, ctx).await
        },
        Commands::Resolve { args } => {
            info!("Resolving dependency graph");
            resolve::execute(args, ctx).await
        },
        Commands::Semver { range, versions } => {
            info!("Checking requirement: {}", range);
            semver::execute(&range, &versions, ctx).await
        },
        Commands::Version => {
            println!("sprout {}", env!("CARGO_PKG_VERSION"));
            println!("Built: {}", env!("BUILD_DATE"));
            println!("Rust: {}", env!("RUSTC_VERSION"));
            Ok(())
        },
    }
}

/// Layer settings from files, `SPROUT_*` variables and command-line flags
pub async fn load_settings(args: &BootstrapArgs, ctx: &CommandContext) -> SproutResult<BootstrapSettings> {
    let cwd = Utf8PathBuf::from_path_buf(ctx.cwd.clone()).map_err(|path| SproutError::ConfigValidation {
        field: "cwd".to_string(),
        reason: format!("{} is not valid UTF-8", path.display()),
    })?;

    let (settings, sources) = SettingsLoader::new(cwd)
        .load(&SettingsLoader::collect_env_overrides(), &args.overrides())
        .await?;
    debug!(?sources, "Settings layers");
    Ok(settings)
}

/// Resolve the root package described by `args` under `settings`.
/// `toolchain` answers the host triple and target cfg queries.
pub async fn prepare<T: Toolchain>(
    args: &BootstrapArgs,
    settings: BootstrapSettings,
    toolchain: &T,
    ctx: &CommandContext,
) -> SproutResult<Prepared> {
    let host = match &settings.host {
        Some(host) => host.clone(),
        None => toolchain.host_triple(&settings.rustc)?,
    };
    let target = settings.target.clone().unwrap_or_else(|| host.clone());
    let platform = toolchain.target_platform(&settings.rustc, &target)?;
    debug!(%host, %target, "Platform");

    let index_dir = settings.index_dir().into_std_path_buf();
    let index_root = GitCli::new(settings.allow_clone)
        .open_or_clone(&settings.index_url, &index_dir)
        .await?;
    let index_config = IndexConfig::load(&index_root).await?;

    let fetcher = PackageFetcher::new(
        HttpFetcher::new()?,
        settings.registry_dir().into_std_path_buf(),
        settings.checksum_policy,
    );
    let options = ResolveOptions {
        features: settings.features.clone(),
        no_default_features: settings.no_default_features,
        platform,
    };

    let root_dir = args.root_dir(&ctx.cwd);
    ctx.output.step("🔍", &format!("Resolving {}", root_dir.display()));
    let mut resolver = DependencyResolver::new(RegistryIndex::new(index_root), index_config, fetcher, options);
    let resolution = resolver.resolve(&root_dir).await?;

    Ok(Prepared {
        settings,
        host,
        resolution,
    })
}
