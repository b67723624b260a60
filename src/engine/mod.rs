//! engine
//!
//! Orchestrates the run lifecycle: Observe -> Plan -> Execute -> Report.
//!
//! # Architecture
//!
//! The engine is the central coordinator for `plan` and `apply`:
//!
//! 1. **Observe**: fetch each provider's remote state once into a
//!    read-only cache
//! 2. **Plan**: pure diff of desired manifest against the cache, producing
//!    a dependency-ordered DAG of idempotent operations
//! 3. **Execute**: run the DAG concurrently through the single executor,
//!    with bounded retry and per-provider concurrency caps
//! 4. **Report**: stream progress events and produce the run result
//!
//! # Invariants
//!
//! - The planner performs no I/O and mutates nothing
//! - Only the executor invokes mutating provider verbs
//! - The observed-state cache is never refreshed mid-run
//! - A Failed terminal state is never reported as success

pub mod exec;
pub mod observe;
pub mod plan;
pub mod retry;

// Re-exports for convenience
pub use exec::{CancelFlag, Executor};
pub use observe::{ObserveError, StateCache};
pub use plan::{compute_plan, OpKind, Operation, Plan, PlanError};
pub use retry::RetryPolicy;

use crate::ui::Verbosity;

/// Execution context threaded from CLI flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    /// Output level resolved from `--quiet` / `--debug`.
    pub verbosity: Verbosity,
}

impl Context {
    /// Build the context from the global CLI flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        Self {
            verbosity: Verbosity::from_flags(quiet, debug),
        }
    }
}
