//! cli::commands::status
//!
//! Show the result of the most recent run.

use anyhow::Result;

use crate::engine::Context;
use crate::report::store::RunStore;
use crate::report::{OpOutcome, RunStatus};

/// Run the status command.
///
/// Reads the persisted last run without taking the run lock, so it works
/// while an apply is in progress. Exits 0 only if the last run succeeded;
/// 1 for anything else, including no recorded run.
pub fn run(ctx: &Context) -> Result<i32> {
    let out = ctx.verbosity;
    let store = RunStore::open_default()?;
    let result = store.load_last()?;

    let status = match result.status {
        RunStatus::Succeeded => "succeeded",
        RunStatus::PartialFailure => "partial failure",
        RunStatus::Cancelled => "cancelled",
    };
    out.print(format!(
        "Run {} ({}): {}",
        result.run_id, result.project, status
    ));
    out.print(format!(
        "  started  {}\n  finished {}",
        result.started_at, result.finished_at
    ));

    for op in &result.operations {
        let line = match &op.outcome {
            OpOutcome::Succeeded => {
                format!("  ok      {} ({} attempt(s))", op.id, op.attempts)
            }
            OpOutcome::Failed { error } => format!("  failed  {}: {}", op.id, error),
            OpOutcome::FailedDependency { dependency } => {
                format!("  failed  {} (dependency {} failed)", op.id, dependency)
            }
            OpOutcome::Cancelled => format!("  cancel  {}", op.id),
        };
        out.print(line);
    }

    Ok(match result.status {
        RunStatus::Succeeded => 0,
        _ => 1,
    })
}
