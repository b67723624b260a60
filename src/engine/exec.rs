//! engine::exec
//!
//! The concurrent plan executor.
//!
//! # Architecture
//!
//! The executor is the only component that invokes mutating provider
//! verbs. It walks the plan's dependency graph:
//!
//! - operations become ready when every dependency has Succeeded
//! - ready operations from independent branches run concurrently on
//!   tokio tasks
//! - a per-provider semaphore caps simultaneous in-flight calls so
//!   external rate limits are respected
//! - transient failures retry with bounded exponential backoff
//! - a permanent failure (or retry exhaustion) marks the operation
//!   Failed and cascades FailedDependency to everything downstream,
//!   while independent branches continue
//!
//! # Operation state machine
//!
//! ```text
//! Pending -> Running -> { Succeeded, Retrying, Failed }
//! Retrying -> Running            (next attempt)
//! Pending -> FailedDependency    (upstream failed)
//! Pending -> Cancelled           (run cancelled before start)
//! ```
//!
//! Terminal states are Succeeded, Failed, FailedDependency, Cancelled.
//!
//! # Cancellation
//!
//! Cancellation is cooperative: in-flight operations finish their attempt
//! loop (most provider mutations are not cleanly reversible, so aborting
//! mid-call buys nothing), no new operations start, and never-started
//! operations end Cancelled, not Failed. Nothing already applied is
//! rolled back.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::plan::{OpKind, Operation, Plan};
use super::retry::RetryPolicy;
use crate::core::types::{OpId, RunId, UtcTimestamp};
use crate::provider::{CertStatus, Provider, ProviderError, ProviderKind, ProviderSet};
use crate::report::{
    OpOutcome, OpTransition, OperationReport, ProgressEvent, RunResult,
};

/// Cooperative run-wide cancellation flag.
///
/// Cloned into Ctrl-C and timeout watchers; the executor polls it before
/// starting any operation.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    /// Create an unset flag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }
}

/// Fatal executor errors.
///
/// These abort the run before (or without) touching providers; they are
/// distinct from per-operation failures, which land in the run result.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The plan routed an operation to a provider the set was not built with.
    #[error("operation {op} routed to unavailable provider {kind}")]
    ProviderUnavailable { op: OpId, kind: ProviderKind },

    /// A worker task died. This is a bug.
    #[error("worker task failed: {0}")]
    Worker(String),
}

/// Classified per-attempt failure inside a worker.
#[derive(Debug, Clone)]
struct OpError {
    message: String,
    transient: bool,
}

impl From<ProviderError> for OpError {
    fn from(err: ProviderError) -> Self {
        Self {
            transient: err.is_transient(),
            message: err.to_string(),
        }
    }
}

/// What a worker task hands back to the scheduler.
struct TaskResult {
    id: OpId,
    attempts: u32,
    error: Option<String>,
}

/// The single component allowed to mutate provider state.
pub struct Executor {
    providers: ProviderSet,
    retry: RetryPolicy,
    provider_concurrency: usize,
}

impl Executor {
    /// Create an executor.
    pub fn new(providers: ProviderSet, retry: RetryPolicy, provider_concurrency: usize) -> Self {
        Self {
            providers,
            retry,
            provider_concurrency: provider_concurrency.max(1),
        }
    }

    /// Execute a plan, streaming progress events, and produce the run result.
    ///
    /// Per-operation failures are recorded in the result, never masked as
    /// success; only pre-execution wiring problems return `Err`.
    pub async fn execute(
        &self,
        project: &str,
        plan: &Plan,
        events: UnboundedSender<ProgressEvent>,
        cancel: CancelFlag,
    ) -> Result<RunResult, ExecuteError> {
        let started_at = UtcTimestamp::now();
        let run_id = RunId::generate();

        // Wiring check before anything runs: every operation must have a
        // provider, otherwise the run aborts with nothing applied.
        for op in &plan.operations {
            if self.providers.get(op.provider).is_none() {
                return Err(ExecuteError::ProviderUnavailable {
                    op: op.id.clone(),
                    kind: op.provider,
                });
            }
        }

        let graph = plan.graph();
        let order: Vec<OpId> = plan.operations.iter().map(|op| op.id.clone()).collect();
        let ops: HashMap<OpId, Operation> = plan
            .operations
            .iter()
            .map(|op| (op.id.clone(), op.clone()))
            .collect();

        let mut semaphores: HashMap<ProviderKind, Arc<Semaphore>> = HashMap::new();
        for op in &plan.operations {
            semaphores
                .entry(op.provider)
                .or_insert_with(|| Arc::new(Semaphore::new(self.provider_concurrency)));
        }

        let mut waiting: HashMap<OpId, usize> = order
            .iter()
            .map(|id| (id.clone(), graph.dependencies(id).len()))
            .collect();
        let mut outcomes: HashMap<OpId, (OpOutcome, u32)> = HashMap::new();
        let mut ready: VecDeque<OpId> = order
            .iter()
            .filter(|id| waiting[*id] == 0)
            .cloned()
            .collect();

        let mut join_set: JoinSet<TaskResult> = JoinSet::new();
        let mut in_flight = 0usize;

        loop {
            while !cancel.is_cancelled() {
                let Some(id) = ready.pop_front() else { break };
                let op = ops[&id].clone();
                let provider = Arc::clone(
                    self.providers
                        .get(op.provider)
                        .expect("providers checked above"),
                );
                let semaphore = Arc::clone(&semaphores[&op.provider]);
                let retry = self.retry;
                let events = events.clone();
                join_set.spawn(run_operation(op, provider, semaphore, retry, events));
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            let task = join_set
                .join_next()
                .await
                .expect("in-flight tasks outstanding")
                .map_err(|e| ExecuteError::Worker(e.to_string()))?;
            in_flight -= 1;

            match task.error {
                None => {
                    outcomes.insert(task.id.clone(), (OpOutcome::Succeeded, task.attempts));
                    for dependent in graph.direct_dependents(&task.id) {
                        let count = waiting.get_mut(dependent).expect("known node");
                        *count -= 1;
                        if *count == 0 && !outcomes.contains_key(dependent) {
                            ready.push_back(dependent.clone());
                        }
                    }
                }
                Some(error) => {
                    outcomes.insert(
                        task.id.clone(),
                        (OpOutcome::Failed { error }, task.attempts),
                    );
                    // Halt everything downstream; independent branches
                    // keep going.
                    for dependent in graph.transitive_dependents(&task.id) {
                        if !outcomes.contains_key(&dependent) {
                            outcomes.insert(
                                dependent.clone(),
                                (
                                    OpOutcome::FailedDependency {
                                        dependency: task.id.clone(),
                                    },
                                    0,
                                ),
                            );
                            let _ = events.send(ProgressEvent::now(
                                dependent.clone(),
                                OpTransition::FailedDependency {
                                    dependency: task.id.clone(),
                                },
                            ));
                        }
                    }
                }
            }
        }

        // Whatever never reached a terminal state was stopped by
        // cancellation, explicitly Cancelled and never Failed.
        for id in &order {
            if !outcomes.contains_key(id) {
                outcomes.insert(id.clone(), (OpOutcome::Cancelled, 0));
                let _ = events.send(ProgressEvent::now(id.clone(), OpTransition::Cancelled));
            }
        }

        let operations: Vec<OperationReport> = order
            .iter()
            .map(|id| {
                let op = &ops[id];
                let (outcome, attempts) = outcomes[id].clone();
                OperationReport {
                    id: id.clone(),
                    provider: op.provider,
                    summary: op.kind.describe(),
                    outcome,
                    attempts,
                }
            })
            .collect();

        let status = RunResult::derive_status(&operations);
        Ok(RunResult {
            run_id,
            project: project.to_string(),
            started_at,
            finished_at: UtcTimestamp::now(),
            status,
            operations,
        })
    }
}

/// One operation's attempt loop, run on its own task.
async fn run_operation(
    op: Operation,
    provider: Arc<dyn Provider>,
    semaphore: Arc<Semaphore>,
    retry: RetryPolicy,
    events: UnboundedSender<ProgressEvent>,
) -> TaskResult {
    let _permit = semaphore
        .acquire_owned()
        .await
        .expect("semaphore is never closed");

    let mut attempt: u32 = 1;
    loop {
        let _ = events.send(ProgressEvent::now(
            op.id.clone(),
            OpTransition::Started { attempt },
        ));
        match apply_operation(provider.as_ref(), &op).await {
            Ok(()) => {
                let _ = events.send(ProgressEvent::now(op.id.clone(), OpTransition::Succeeded));
                return TaskResult {
                    id: op.id,
                    attempts: attempt,
                    error: None,
                };
            }
            Err(err) if err.transient && retry.allows_retry(attempt) => {
                let delay = retry.delay_for(attempt);
                let _ = events.send(ProgressEvent::now(
                    op.id.clone(),
                    OpTransition::Retrying {
                        attempt,
                        delay_ms: delay.as_millis() as u64,
                        error: err.message.clone(),
                    },
                ));
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                let _ = events.send(ProgressEvent::now(
                    op.id.clone(),
                    OpTransition::Failed {
                        error: err.message.clone(),
                    },
                ));
                return TaskResult {
                    id: op.id,
                    attempts: attempt,
                    error: Some(err.message),
                };
            }
        }
    }
}

/// Dispatch one operation to its provider verb.
async fn apply_operation(provider: &dyn Provider, op: &Operation) -> Result<(), OpError> {
    match &op.kind {
        OpKind::UpsertRecord {
            name,
            record_type,
            value,
        } => {
            provider.upsert_record(name, *record_type, value).await?;
        }
        OpKind::DeleteRecord { name, record_type } => {
            provider.delete_record(name, *record_type).await?;
        }
        OpKind::DeployContainer {
            service,
            image,
            scaling,
        } => {
            provider
                .deploy_container(service, image, scaling, &op.fingerprint)
                .await?;
        }
        OpKind::BindDomain { hostname, service } => {
            provider.bind_domain(hostname, service).await?;
        }
        OpKind::UnbindDomain { hostname } => {
            provider.unbind_domain(hostname).await?;
        }
        OpKind::IssueCertificate { hostnames } => {
            match provider.issue_certificate(hostnames).await? {
                // Pending counts as applied: issuance is asynchronous and
                // the next run re-checks propagation.
                CertStatus::Active | CertStatus::Pending => {}
                CertStatus::Failed { reason } => {
                    return Err(OpError {
                        message: format!("certificate issuance failed: {}", reason),
                        transient: false,
                    });
                }
            }
        }
        OpKind::RouteHost { hostname, backend } => {
            provider.route_host(hostname, backend).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_flag_is_sticky_and_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
