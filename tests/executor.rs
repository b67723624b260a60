//! End-to-end executor tests over mock providers: concurrency, retry,
//! failure cascade, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use berth::core::manifest;
use berth::core::types::OpId;
use berth::engine::{compute_plan, CancelFlag, Executor, RetryPolicy, StateCache};
use berth::provider::mock::{FailOn, MockProvider};
use berth::provider::{Provider, ProviderError, ProviderKind, ProviderSet};
use berth::report::{OpOutcome, ProgressEvent, RunStatus};

const TWO_BRANCHES: &str = r#"
    [project]
    name = "acme"

    [[service]]
    name = "api"
    provider = "containers"
    image = "registry.example.com/acme/api:1.4.2"
    max_instances = 10

    [[service]]
    name = "frontend"
    provider = "pages"
    site = "frontend"

    [[binding]]
    hostname = "api.example.com"
    service = "api"
    record = "CNAME"
    certificate = true

    [[binding]]
    hostname = "app.example.com"
    service = "frontend"
    record = "CNAME"
    certificate = true
"#;

fn fast_retry(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(4),
    }
}

struct Mocks {
    dns: MockProvider,
    pages: MockProvider,
    containers: MockProvider,
}

fn mocks() -> (Mocks, ProviderSet) {
    let dns = MockProvider::new(ProviderKind::Dns);
    let pages = MockProvider::new(ProviderKind::Pages);
    let containers = MockProvider::new(ProviderKind::Containers);
    let set = ProviderSet::from_providers([
        (ProviderKind::Dns, Arc::new(dns.clone()) as Arc<dyn Provider>),
        (
            ProviderKind::Pages,
            Arc::new(pages.clone()) as Arc<dyn Provider>,
        ),
        (
            ProviderKind::Containers,
            Arc::new(containers.clone()) as Arc<dyn Provider>,
        ),
    ]);
    (
        Mocks {
            dns,
            pages,
            containers,
        },
        set,
    )
}

fn outcome<'a>(result: &'a berth::report::RunResult, id: &str) -> &'a OpOutcome {
    &result
        .operations
        .iter()
        .find(|op| op.id == OpId::new(id))
        .unwrap_or_else(|| panic!("no operation {}", id))
        .outcome
}

async fn run(
    set: ProviderSet,
    retry: RetryPolicy,
    cancel: CancelFlag,
) -> (berth::report::RunResult, Vec<ProgressEvent>) {
    let manifest = manifest::parse(TWO_BRANCHES).unwrap();
    let cache = StateCache::fetch(&set).await.unwrap();
    let plan = compute_plan(&manifest, &cache).unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let executor = Executor::new(set, retry, 4);
    let result = executor
        .execute(&manifest.project, &plan, tx, cancel)
        .await
        .unwrap();

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    (result, events)
}

#[tokio::test]
async fn full_run_converges_and_is_idempotent() {
    let (m, set) = mocks();
    let (result, _) = run(set.clone(), fast_retry(0), CancelFlag::new()).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(result.operations.len(), 7);
    assert!(result
        .operations
        .iter()
        .all(|op| op.outcome == OpOutcome::Succeeded));

    // The mocks now hold the applied state, so a second run plans nothing.
    let manifest = manifest::parse(TWO_BRANCHES).unwrap();
    let cache = StateCache::fetch(&set).await.unwrap();
    let plan = compute_plan(&manifest, &cache).unwrap();
    assert!(plan.is_empty(), "second plan not empty: {:?}", plan.operations);

    // DNS records point at each branch's endpoint.
    let records = m.dns.state().records;
    assert!(records
        .iter()
        .any(|r| r.name.as_str() == "api.example.com" && r.value == "run.mock.invalid"));
    assert!(records
        .iter()
        .any(|r| r.name.as_str() == "app.example.com" && r.value == "pages.mock.invalid"));
}

#[tokio::test]
async fn permanent_failure_cascades_while_other_branch_completes() {
    let (m, set) = mocks();
    m.containers.fail_with(
        FailOn::DeployContainer(None),
        ProviderError::QuotaExceeded("service quota exhausted".into()),
    );

    let (result, _) = run(set, fast_retry(3), CancelFlag::new()).await;

    assert_eq!(result.status, RunStatus::PartialFailure);
    assert_eq!(result.status.exit_code(), 2);

    assert!(matches!(
        outcome(&result, "deploy/api"),
        OpOutcome::Failed { .. }
    ));
    // Everything downstream of the deploy is halted, attributed to it.
    assert!(matches!(
        outcome(&result, "bind/api.example.com"),
        OpOutcome::FailedDependency { dependency } if dependency == &OpId::new("deploy/api")
    ));
    assert!(matches!(
        outcome(&result, "cert/api.example.com"),
        OpOutcome::FailedDependency { .. }
    ));
    // The record upsert is an independent root and still runs.
    assert_eq!(outcome(&result, "record/api.example.com/CNAME"), &OpOutcome::Succeeded);

    // The frontend branch is untouched by the api failure.
    assert_eq!(outcome(&result, "bind/app.example.com"), &OpOutcome::Succeeded);
    assert_eq!(outcome(&result, "cert/app.example.com"), &OpOutcome::Succeeded);

    // A permanent error is never retried.
    let deploys = m
        .containers
        .operations()
        .iter()
        .filter(|op| matches!(op, berth::provider::mock::MockOperation::DeployContainer { .. }))
        .count();
    assert_eq!(deploys, 1);
}

#[tokio::test]
async fn transient_failures_retry_within_budget() {
    let (m, set) = mocks();
    m.containers.fail_times(
        FailOn::DeployContainer(None),
        ProviderError::RateLimited,
        2,
    );

    let (result, events) = run(set, fast_retry(3), CancelFlag::new()).await;

    assert_eq!(result.status, RunStatus::Succeeded);
    let deploy = result
        .operations
        .iter()
        .find(|op| op.id == OpId::new("deploy/api"))
        .unwrap();
    assert_eq!(deploy.attempts, 3);

    // Two retry transitions were reported with backoff delays.
    let retries: Vec<_> = events
        .iter()
        .filter(|e| {
            e.op == OpId::new("deploy/api")
                && matches!(
                    e.transition,
                    berth::report::OpTransition::Retrying { .. }
                )
        })
        .collect();
    assert_eq!(retries.len(), 2);
}

#[tokio::test]
async fn retry_exhaustion_becomes_permanent_failure() {
    let (m, set) = mocks();
    m.containers.fail_with(FailOn::DeployContainer(None), ProviderError::RateLimited);

    let (result, _) = run(set, fast_retry(2), CancelFlag::new()).await;

    assert_eq!(result.status, RunStatus::PartialFailure);
    let deploy = result
        .operations
        .iter()
        .find(|op| op.id == OpId::new("deploy/api"))
        .unwrap();
    // Initial attempt plus two retries, then the budget is spent.
    assert_eq!(deploy.attempts, 3);
    assert!(matches!(deploy.outcome, OpOutcome::Failed { .. }));
    assert!(matches!(
        outcome(&result, "bind/api.example.com"),
        OpOutcome::FailedDependency { .. }
    ));
}

#[tokio::test]
async fn cancellation_finishes_in_flight_and_cancels_the_rest() {
    let dns = MockProvider::new(ProviderKind::Dns);
    let pages = MockProvider::new(ProviderKind::Pages).with_delay(Duration::from_millis(100));
    let containers =
        MockProvider::new(ProviderKind::Containers).with_delay(Duration::from_millis(100));
    let set = ProviderSet::from_providers([
        (ProviderKind::Dns, Arc::new(dns) as Arc<dyn Provider>),
        (ProviderKind::Pages, Arc::new(pages) as Arc<dyn Provider>),
        (
            ProviderKind::Containers,
            Arc::new(containers) as Arc<dyn Provider>,
        ),
    ]);

    let manifest = manifest::parse(TWO_BRANCHES).unwrap();
    let cache = StateCache::fetch(&set).await.unwrap();
    let plan = compute_plan(&manifest, &cache).unwrap();

    // Arm the canceller only once execution starts; observation above is
    // also slowed by the mock delays.
    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            cancel.cancel();
        });
    }

    let (tx, _rx) = mpsc::unbounded_channel();
    let executor = Executor::new(set, fast_retry(0), 4);
    let result = executor
        .execute(&manifest.project, &plan, tx, cancel)
        .await
        .unwrap();

    // No failures happened, so the run is Cancelled, not PartialFailure.
    assert_eq!(result.status, RunStatus::Cancelled);
    assert_eq!(result.status.exit_code(), 2);

    // In-flight roots ran to completion.
    assert_eq!(outcome(&result, "deploy/api"), &OpOutcome::Succeeded);
    // Dependents that became ready after cancellation never started.
    assert_eq!(outcome(&result, "bind/api.example.com"), &OpOutcome::Cancelled);
    assert_eq!(outcome(&result, "cert/api.example.com"), &OpOutcome::Cancelled);
}

#[tokio::test]
async fn loadbalancer_routed_binding_converges() {
    let manifest_text = r#"
        [project]
        name = "acme"

        [[service]]
        name = "api"
        provider = "containers"
        image = "registry.example.com/acme/api:1.4.2"
        max_instances = 10

        [[binding]]
        hostname = "api.example.com"
        service = "api"
        record = "A"
        via = "loadbalancer"
        certificate = true
    "#;
    let manifest = manifest::parse(manifest_text).unwrap();

    let dns = MockProvider::new(ProviderKind::Dns);
    let containers = MockProvider::new(ProviderKind::Containers);
    let lb = MockProvider::new(ProviderKind::LoadBalancer);
    let set = ProviderSet::from_providers([
        (ProviderKind::Dns, Arc::new(dns.clone()) as Arc<dyn Provider>),
        (
            ProviderKind::Containers,
            Arc::new(containers.clone()) as Arc<dyn Provider>,
        ),
        (
            ProviderKind::LoadBalancer,
            Arc::new(lb.clone()) as Arc<dyn Provider>,
        ),
    ]);

    let cache = StateCache::fetch(&set).await.unwrap();
    let plan = compute_plan(&manifest, &cache).unwrap();

    // The host rule lands on the load balancer, downstream of the deploy,
    // with the certificate hanging off the route.
    let route = plan.get(&OpId::new("route/api.example.com")).unwrap();
    assert_eq!(route.provider, ProviderKind::LoadBalancer);
    assert_eq!(route.depends_on, vec![OpId::new("deploy/api")]);
    let cert = plan.get(&OpId::new("cert/api.example.com")).unwrap();
    assert_eq!(cert.depends_on, vec![OpId::new("route/api.example.com")]);

    let (tx, _rx) = mpsc::unbounded_channel();
    let executor = Executor::new(set.clone(), fast_retry(0), 4);
    let result = executor
        .execute(&manifest.project, &plan, tx, CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert_eq!(outcome(&result, "route/api.example.com"), &OpOutcome::Succeeded);

    // The A record points at the load balancer's public address.
    assert!(dns
        .state()
        .records
        .iter()
        .any(|r| r.name.as_str() == "api.example.com" && r.value == "203.0.113.10"));
    assert!(lb
        .operations()
        .iter()
        .any(|op| matches!(op, berth::provider::mock::MockOperation::RouteHost { .. })));

    // Re-observing yields a converged, empty plan.
    let cache = StateCache::fetch(&set).await.unwrap();
    let plan = compute_plan(&manifest, &cache).unwrap();
    assert!(plan.is_empty(), "second plan not empty: {:?}", plan.operations);
}

#[tokio::test]
async fn empty_plan_yields_a_successful_run() {
    let set = ProviderSet::from_providers(Vec::<(ProviderKind, Arc<dyn Provider>)>::new());
    let plan = berth::engine::Plan::default();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let executor = Executor::new(set, fast_retry(0), 4);
    let result = executor
        .execute("acme", &plan, tx, CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert!(result.operations.is_empty());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn concurrency_cap_bounds_simultaneous_provider_calls() {
    // Three independent DNS upserts against a provider capped at one
    // in-flight call must take at least three delay periods.
    let manifest_text = r#"
        [project]
        name = "acme"

        [settings]
        provider_concurrency = 1

        [[service]]
        name = "frontend"
        provider = "pages"
        site = "frontend"

        [[binding]]
        hostname = "a.example.com"
        service = "frontend"

        [[binding]]
        hostname = "b.example.com"
        service = "frontend"

        [[binding]]
        hostname = "c.example.com"
        service = "frontend"
    "#;
    let manifest = manifest::parse(manifest_text).unwrap();

    let delay = Duration::from_millis(40);
    let dns = MockProvider::new(ProviderKind::Dns).with_delay(delay);
    let pages = MockProvider::new(ProviderKind::Pages);
    let set = ProviderSet::from_providers([
        (ProviderKind::Dns, Arc::new(dns) as Arc<dyn Provider>),
        (ProviderKind::Pages, Arc::new(pages) as Arc<dyn Provider>),
    ]);

    let cache = StateCache::fetch(&set).await.unwrap();
    let plan = compute_plan(&manifest, &cache).unwrap();
    let records = plan
        .operations
        .iter()
        .filter(|op| op.provider == ProviderKind::Dns)
        .count();
    assert_eq!(records, 3);

    let (tx, _rx) = mpsc::unbounded_channel();
    let executor = Executor::new(set, fast_retry(0), manifest.settings.provider_concurrency);
    let start = std::time::Instant::now();
    let result = executor
        .execute(&manifest.project, &plan, tx, CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(result.status, RunStatus::Succeeded);
    assert!(start.elapsed() >= delay * 3, "records ran concurrently");
}
