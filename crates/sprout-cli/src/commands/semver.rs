//! Semver command: show the bounds of a requirement and check versions
//! against it.

use sprout_core::error::SproutResult;
use sprout_core::types::{Version, VersionRange, VersionReq};

use super::CommandContext;

pub async fn execute(range: &str, versions: &[String], ctx: &CommandContext) -> SproutResult<()> {
    let req = VersionReq::parse(range)?;
    ctx.output.step("📐", &ctx.output.colors().bold(&req.to_string()));
    for part in &req.ranges {
        ctx.output.info(&format!("  {}", describe_bounds(part)));
    }

    for text in versions {
        let version = Version::parse(text)?;
        if req.matches(&version) {
            ctx.output.success(&format!("{} matches", version));
        } else {
            ctx.output.error(&format!("{} does not match", version));
        }
    }
    Ok(())
}

/// Half-open interval a range covers, or the comparison itself
pub fn describe_bounds(range: &VersionRange) -> String {
    match (range.lower(), range.upper()) {
        (Some(lower), Some(upper)) => format!("{}: >={}, <{}", range, lower, upper),
        (Some(lower), None) => format!("{}: >={}", range, lower),
        _ => format!("{}: compared directly", range),
    }
}
