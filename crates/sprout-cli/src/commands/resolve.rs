//! Resolve command: print the dependency graph as a tree.

use std::collections::HashSet;

use sprout_build::ProcessToolchain;
use sprout_core::error::SproutResult;
use sprout_core::types::DependencyKind;
use sprout_resolver::{Resolution, ResolvedPackage, SkipReason};

use super::CommandContext;
use crate::BootstrapArgs;

pub async fn execute(args: BootstrapArgs, ctx: &CommandContext) -> SproutResult<()> {
    let settings = super::load_settings(&args, ctx).await?;
    let prepared = super::prepare(&args, settings, &ProcessToolchain::new(), ctx).await?;
    let resolution = &prepared.resolution;

    print!("{}", render_tree(resolution));

    if let Some(root) = resolution.root_package() {
        if !root.features.is_empty() {
            let features: Vec<&str> = root.features.iter().map(String::as_str).collect();
            ctx.output.info(&format!("features: {}", features.join(", ")));
        }
    }
    for skipped in &resolution.skipped {
        ctx.output.info(&format!(
            "skipped {} of {}: {}",
            skipped.name,
            skipped.dependent,
            describe_skip(&skipped.reason)
        ));
    }

    ctx.output.success(&format!("Resolved {} packages", resolution.len()));
    Ok(())
}

/// Render the graph rooted at the resolution root. A package reached a
/// second time is marked `(*)` and not expanded again.
pub fn render_tree(resolution: &Resolution) -> String {
    let mut out = String::new();
    let Some(root) = resolution.root_package() else {
        return out;
    };

    out.push_str(&format!("{} v{}\n", root.record.name, root.record.version));
    let mut seen = HashSet::from([resolution.root.clone()]);
    render_children(resolution, root, "", &mut seen, &mut out);
    out
}

fn render_children(
    resolution: &Resolution,
    node: &ResolvedPackage,
    prefix: &str,
    seen: &mut HashSet<sprout_core::types::PackageId>,
    out: &mut String,
) {
    let count = node.dependencies.len();
    for (index, (key, edge)) in node.dependencies.iter().enumerate() {
        let Some(child) = resolution.package(&edge.id) else {
            continue;
        };
        let last = index + 1 == count;

        let mut label = format!("{} v{}", child.record.name, child.record.version);
        if key.name != child.record.name {
            label.push_str(&format!(" as {}", key.name));
        }
        if key.kind == DependencyKind::Build {
            label.push_str(" [build]");
        }
        let repeated = !seen.insert(edge.id.clone());
        if repeated {
            label.push_str(" (*)");
        }

        let branch = if last { "└── " } else { "├── " };
        out.push_str(&format!("{}{}{}\n", prefix, branch, label));

        if !repeated {
            let next = format!("{}{}", prefix, if last { "    " } else { "│   " });
            render_children(resolution, child, &next, seen, out);
        }
    }
}

fn describe_skip(reason: &SkipReason) -> String {
    match reason {
        SkipReason::Dev => "dev-only".to_string(),
        SkipReason::Platform(target) => format!("only for {}", target),
        SkipReason::Optional => "optional and not activated".to_string(),
    }
}
