//! cli::commands::apply
//!
//! Converge providers on the manifest.

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;

use crate::core::manifest;
use crate::engine::{compute_plan, CancelFlag, Context, Executor, RetryPolicy, StateCache};
use crate::provider::ProviderSet;
use crate::report::store::RunStore;
use crate::report::{Reporter, RunResult};
use crate::ui::output;
use crate::ui::Verbosity;

/// Run the apply command.
///
/// Holds the run lock for the whole run so two applies never race against
/// the same state directory.
pub fn run(manifest_path: &Path, timeout: Option<u64>, ctx: &Context) -> Result<i32> {
    let out = ctx.verbosity;
    let manifest = manifest::load(manifest_path)?;

    let store = RunStore::open_default()?;
    let _lock = store.lock()?;

    let timeout_secs = timeout.or(manifest.settings.timeout_secs);
    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(execute(&manifest, timeout_secs, out))?;

    store.save(&result)?;
    Reporter::summary(&result, out);
    Ok(result.status.exit_code())
}

async fn execute(
    manifest: &manifest::Manifest,
    timeout_secs: Option<u64>,
    out: Verbosity,
) -> Result<RunResult> {
    let providers = ProviderSet::for_manifest(manifest)?;
    let cache = StateCache::fetch(&providers).await?;
    let plan = compute_plan(manifest, &cache)?;

    if plan.is_empty() {
        out.print(format!(
            "Nothing to do: '{}' is already converged.",
            manifest.project
        ));
    } else {
        out.print(format!(
            "Applying {} operation(s) for '{}'",
            plan.len(),
            manifest.project
        ));
    }

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                output::error("interrupted: letting in-flight operations finish");
                cancel.cancel();
            }
        });
    }
    if let Some(secs) = timeout_secs {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(secs)).await;
            output::error(format!("run timeout after {}s: cancelling", secs));
            cancel.cancel();
        });
    }

    let (events, progress) = mpsc::unbounded_channel();
    let reporter = tokio::spawn(Reporter::new(out).run(progress));

    let executor = Executor::new(
        providers,
        RetryPolicy::from_settings(&manifest.settings),
        manifest.settings.provider_concurrency,
    );
    let result = executor
        .execute(&manifest.project, &plan, events, cancel)
        .await?;

    // All senders are gone once execute returns, so the reporter drains
    // the channel and exits.
    let _ = reporter.await;
    Ok(result)
}
