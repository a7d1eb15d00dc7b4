//! Build command: resolve, then compile every package bottom-up.

use sprout_build::{BuildContext, BuildOrchestrator, BuildReport, ProcessToolchain, Toolchain};
use sprout_config::BootstrapSettings;
use sprout_core::error::{SproutError, SproutResult};
use sprout_resolver::Resolution;
use tracing::{info, warn};

use super::CommandContext;
use crate::BootstrapArgs;

pub async fn execute(args: BootstrapArgs, ctx: &CommandContext) -> SproutResult<()> {
    let settings = super::load_settings(&args, ctx).await?;
    let clean_on_failure = settings.clean_on_failure;
    let target_dir = settings.target_dir.clone();

    let result = run(args, settings, ctx).await;
    if result.is_err() && clean_on_failure {
        info!("Removing {} after failure", target_dir);
        if let Err(e) = tokio::fs::remove_dir_all(&target_dir).await {
            warn!("Failed to remove {}: {}", target_dir, e);
        }
    }
    result
}

async fn run(args: BootstrapArgs, settings: BootstrapSettings, ctx: &CommandContext) -> SproutResult<()> {
    let toolchain = ProcessToolchain::new();
    let prepared = super::prepare(&args, settings, &toolchain, ctx).await?;
    let resolution = prepared.resolution;

    let context = BuildContext::from_settings(&prepared.settings, prepared.host);
    ctx.output.step(
        "🔨",
        &format!(
            "Compiling {} packages for {} ({})",
            resolution.len(),
            context.target,
            context.profile.name()
        ),
    );

    let (report, resolution) = build_blocking(toolchain, context, resolution).await?;

    if report.binaries.is_empty() {
        ctx.output.warn("The root package has no binary targets");
    }
    for binary in &report.binaries {
        ctx.output.info(&format!("  {}", binary.display()));
    }

    let root = resolution
        .root_package()
        .map(|pkg| pkg.id().to_string())
        .ok_or_else(|| SproutError::ConfigValidation {
            field: "manifest-path".to_string(),
            reason: "resolution has no root package".to_string(),
        })?;
    ctx.output.success(&format!("Built {} ({} packages)", root, report.built.len()));
    Ok(())
}

/// Run the orchestrator on the blocking pool. Compilation waits on child
/// processes and must not hold a runtime thread.
pub(crate) async fn build_blocking<T>(
    toolchain: T,
    context: BuildContext,
    mut resolution: Resolution,
) -> SproutResult<(BuildReport, Resolution)>
where
    T: Toolchain + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut orchestrator = BuildOrchestrator::new(toolchain, context);
        orchestrator.build(&mut resolution).map(|report| (report, resolution))
    })
    .await
    .map_err(|e| {
        SproutError::io(
            "Build task failed".to_string(),
            std::io::Error::new(std::io::ErrorKind::Other, e),
        )
    })?
}
