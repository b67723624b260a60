//! cli::commands::plan
//!
//! Preview the operations apply would run.

use std::path::Path;

use anyhow::Result;

use crate::core::manifest;
use crate::engine::{compute_plan, Context, Plan, StateCache};
use crate::provider::ProviderSet;

/// Run the plan command.
pub fn run(manifest_path: &Path, ctx: &Context) -> Result<i32> {
    let out = ctx.verbosity;
    let manifest = manifest::load(manifest_path)?;
    out.debug(format!("loaded manifest for project '{}'", manifest.project));

    let runtime = tokio::runtime::Runtime::new()?;
    let plan = runtime.block_on(async {
        let providers = ProviderSet::for_manifest(&manifest)?;
        let cache = StateCache::fetch(&providers).await?;
        Ok::<Plan, anyhow::Error>(compute_plan(&manifest, &cache)?)
    })?;

    if plan.is_empty() {
        out.print(format!(
            "Nothing to do: '{}' is already converged.",
            manifest.project
        ));
        return Ok(0);
    }

    out.print(format!(
        "Plan for '{}': {} operation(s)\n",
        manifest.project,
        plan.len()
    ));
    for op in &plan.operations {
        out.print(format!("  {:<40} {}", op.id.as_str(), op.kind.describe()));
        if !op.depends_on.is_empty() {
            let deps: Vec<&str> = op.depends_on.iter().map(|d| d.as_str()).collect();
            out.debug(format!("{} depends on {}", op.id, deps.join(", ")));
        }
    }
    Ok(0)
}
