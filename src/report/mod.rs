//! report
//!
//! Progress events and the run result.
//!
//! # Design
//!
//! Reporting is purely observational: the executor emits a
//! [`ProgressEvent`] for every operation state transition, the
//! [`Reporter`] prints them as they arrive, and the final [`RunResult`]
//! aggregates per-operation outcomes. Nothing here feeds back into
//! orchestration decisions.
//!
//! The run result is also the audit record: `apply` persists it through
//! [`store::RunStore`] and `status` reads it back.

pub mod store;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::core::types::{OpId, RunId, UtcTimestamp};
use crate::provider::ProviderKind;
use crate::ui::Verbosity;

/// An operation state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum OpTransition {
    /// The operation entered Running.
    Started { attempt: u32 },
    /// A transient failure; the operation will run again.
    Retrying {
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    /// Terminal success.
    Succeeded,
    /// Terminal failure from the provider.
    Failed { error: String },
    /// Terminal failure because a dependency failed.
    FailedDependency { dependency: OpId },
    /// Never started due to run cancellation.
    Cancelled,
}

/// A structured progress event: operation, transition, timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Which operation transitioned.
    pub op: OpId,
    /// The transition.
    pub transition: OpTransition,
    /// When it happened.
    pub at: UtcTimestamp,
}

impl ProgressEvent {
    /// Build an event stamped with the current time.
    pub fn now(op: OpId, transition: OpTransition) -> Self {
        Self {
            op,
            transition,
            at: UtcTimestamp::now(),
        }
    }
}

/// Terminal outcome of one operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OpOutcome {
    /// Applied (or verified already applied).
    Succeeded,
    /// The provider rejected it permanently, or retries ran out.
    Failed { error: String },
    /// A dependency failed, so this never ran.
    FailedDependency { dependency: OpId },
    /// Cancelled before it started.
    Cancelled,
}

impl OpOutcome {
    /// True for either failure variant.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OpOutcome::Failed { .. } | OpOutcome::FailedDependency { .. }
        )
    }
}

/// Per-operation record in the run result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationReport {
    /// Operation id.
    pub id: OpId,
    /// Provider that owned it.
    pub provider: ProviderKind,
    /// Human description of what it does.
    pub summary: String,
    /// Terminal outcome.
    pub outcome: OpOutcome,
    /// Attempts consumed (0 if it never started).
    pub attempts: u32,
}

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every operation succeeded (or there was nothing to do).
    Succeeded,
    /// Some operations failed; independent branches may have succeeded.
    PartialFailure,
    /// The run was cancelled with no failures.
    Cancelled,
}

impl RunStatus {
    /// CLI exit code for `apply`: 0 converged, 2 needs attention.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Succeeded => 0,
            RunStatus::PartialFailure | RunStatus::Cancelled => 2,
        }
    }
}

/// The audit record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run id.
    pub run_id: RunId,
    /// Project name from the manifest.
    pub project: String,
    /// Run start.
    pub started_at: UtcTimestamp,
    /// Run end.
    pub finished_at: UtcTimestamp,
    /// Overall status.
    pub status: RunStatus,
    /// Per-operation outcomes, in plan order.
    pub operations: Vec<OperationReport>,
}

impl RunResult {
    /// Derive the overall status from per-operation outcomes.
    pub fn derive_status(operations: &[OperationReport]) -> RunStatus {
        if operations.iter().any(|op| op.outcome.is_failure()) {
            RunStatus::PartialFailure
        } else if operations
            .iter()
            .any(|op| matches!(op.outcome, OpOutcome::Cancelled))
        {
            RunStatus::Cancelled
        } else {
            RunStatus::Succeeded
        }
    }

    /// Counts by terminal state: (succeeded, failed, cancelled).
    pub fn counts(&self) -> (usize, usize, usize) {
        let mut succeeded = 0;
        let mut failed = 0;
        let mut cancelled = 0;
        for op in &self.operations {
            match &op.outcome {
                OpOutcome::Succeeded => succeeded += 1,
                OpOutcome::Failed { .. } | OpOutcome::FailedDependency { .. } => failed += 1,
                OpOutcome::Cancelled => cancelled += 1,
            }
        }
        (succeeded, failed, cancelled)
    }

    /// Operations that ended in a failure state.
    pub fn failed_operations(&self) -> impl Iterator<Item = &OperationReport> {
        self.operations.iter().filter(|op| op.outcome.is_failure())
    }
}

/// Streams progress events to the terminal.
///
/// Runs as its own task so executor workers never block on output.
#[derive(Debug, Clone, Copy)]
pub struct Reporter {
    verbosity: Verbosity,
}

impl Reporter {
    /// Create a reporter with the given verbosity.
    pub fn new(verbosity: Verbosity) -> Self {
        Self { verbosity }
    }

    /// Consume events until the channel closes.
    pub async fn run(self, mut events: UnboundedReceiver<ProgressEvent>) {
        while let Some(event) = events.recv().await {
            self.emit(&event);
        }
    }

    fn emit(&self, event: &ProgressEvent) {
        let out = self.verbosity;
        match &event.transition {
            OpTransition::Started { attempt } => {
                if *attempt == 1 {
                    out.debug(format!("{} started", event.op));
                } else {
                    out.debug(format!("{} started (attempt {})", event.op, attempt));
                }
            }
            OpTransition::Retrying {
                attempt,
                delay_ms,
                error,
            } => {
                out.warn(format!(
                    "{}: {} (attempt {}, retrying in {}ms)",
                    event.op, error, attempt, delay_ms
                ));
            }
            OpTransition::Succeeded => {
                out.print(format!("  ok      {}", event.op));
            }
            OpTransition::Failed { error } => {
                out.print(format!("  failed  {}: {}", event.op, error));
            }
            OpTransition::FailedDependency { dependency } => {
                out.print(format!(
                    "  failed  {} (dependency {} failed)",
                    event.op, dependency
                ));
            }
            OpTransition::Cancelled => {
                out.print(format!("  cancel  {}", event.op));
            }
        }
    }

    /// Print the final run summary.
    pub fn summary(result: &RunResult, out: Verbosity) {
        let (succeeded, failed, cancelled) = result.counts();
        out.print(format!(
            "\nRun {}: {} succeeded, {} failed, {} cancelled",
            result.run_id, succeeded, failed, cancelled
        ));
        for op in result.failed_operations() {
            match &op.outcome {
                OpOutcome::Failed { error } => {
                    out.print(format!("  {} failed: {}", op.id, error));
                }
                OpOutcome::FailedDependency { dependency } => {
                    out.print(format!(
                        "  {} failed: dependency {} failed",
                        op.id, dependency
                    ));
                }
                _ => {}
            }
        }
    }
}
