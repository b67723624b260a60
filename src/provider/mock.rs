//! provider::mock
//!
//! Mock provider implementation for deterministic testing.
//!
//! # Design
//!
//! The mock provider keeps its remote state in memory behind an
//! `Arc<Mutex<...>>`, so clones share state and tests can observe what a
//! run applied. Failure injection (`FailOn`) exercises the retry and
//! cascade paths; an optional per-call delay exercises concurrency and
//! cancellation.
//!
//! Verbs mutate the in-memory state the way a real provider would, so
//! re-observing after an apply yields a converged state and an empty plan.
//!
//! # Example
//!
//! ```
//! use berth::provider::mock::MockProvider;
//! use berth::provider::{Provider, ProviderKind};
//! use berth::core::manifest::{RecordType, ScalingBounds};
//! use berth::core::types::{Fingerprint, Hostname, ImageRef, ServiceName};
//!
//! # tokio_test::block_on(async {
//! let provider = MockProvider::new(ProviderKind::Containers);
//! let service = ServiceName::new("api").unwrap();
//! let image = ImageRef::new("r.example.com/api:1").unwrap();
//! let fp = Fingerprint::compute(["api"]);
//!
//! let service_ref = provider
//!     .deploy_container(&service, &image, &ScalingBounds::default(), &fp)
//!     .await
//!     .unwrap();
//! assert_eq!(service_ref.name, service);
//!
//! // The deploy is visible in observed state.
//! let state = provider.observe().await.unwrap();
//! assert_eq!(state.services.len(), 1);
//! # });
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::traits::{
    BindingRef, CertStatus, ObservedCertificate, ObservedService, ObservedState, Provider,
    ProviderError, ProviderKind, RecordRef, ServiceRef,
};
use crate::core::manifest::{RecordType, ScalingBounds};
use crate::core::types::{Fingerprint, Hostname, ImageRef, ServiceName};

/// Which verb a configured failure applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailOn {
    /// Fail `observe`.
    Observe,
    /// Fail `upsert_record`.
    UpsertRecord,
    /// Fail `delete_record`.
    DeleteRecord,
    /// Fail `deploy_container`; optionally only for one service.
    DeployContainer(Option<ServiceName>),
    /// Fail `bind_domain`.
    BindDomain,
    /// Fail `unbind_domain`.
    UnbindDomain,
    /// Fail `issue_certificate`.
    IssueCertificate,
    /// Fail `route_host`.
    RouteHost,
}

/// A configured failure: which verb, what error, how many times.
#[derive(Debug, Clone)]
struct Failure {
    on: FailOn,
    error: ProviderError,
    /// Remaining failures; `None` means fail forever.
    remaining: Option<u32>,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    Observe,
    UpsertRecord {
        name: Hostname,
        record_type: RecordType,
        value: String,
    },
    DeleteRecord {
        name: Hostname,
        record_type: RecordType,
    },
    DeployContainer {
        service: ServiceName,
        image: ImageRef,
        fingerprint: Fingerprint,
    },
    BindDomain {
        hostname: Hostname,
        service: ServiceName,
    },
    UnbindDomain {
        hostname: Hostname,
    },
    IssueCertificate {
        hostnames: Vec<Hostname>,
    },
    RouteHost {
        hostname: Hostname,
        backend: ServiceName,
    },
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockInner {
    state: ObservedState,
    failures: VecDeque<Failure>,
    operations: Vec<MockOperation>,
    next_id: u64,
}

impl MockInner {
    fn assign_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    /// Pop a matching failure, honoring its remaining count.
    fn take_failure(&mut self, matches: impl Fn(&FailOn) -> bool) -> Option<ProviderError> {
        let idx = self.failures.iter().position(|f| matches(&f.on))?;
        let failure = &mut self.failures[idx];
        let error = failure.error.clone();
        match &mut failure.remaining {
            Some(n) => {
                *n -= 1;
                if *n == 0 {
                    self.failures.remove(idx);
                }
            }
            None => {}
        }
        Some(error)
    }
}

/// Mock provider for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct MockProvider {
    kind: ProviderKind,
    delay: Option<Duration>,
    inner: Arc<Mutex<MockInner>>,
}

impl MockProvider {
    /// Create a mock of the given kind with empty state.
    pub fn new(kind: ProviderKind) -> Self {
        let endpoint = match kind {
            ProviderKind::Dns => None,
            ProviderKind::Pages => Some("pages.mock.invalid".to_string()),
            ProviderKind::Containers => Some("run.mock.invalid".to_string()),
            ProviderKind::LoadBalancer => Some("203.0.113.10".to_string()),
        };
        let inner = MockInner {
            state: ObservedState {
                endpoint,
                ..ObservedState::default()
            },
            ..MockInner::default()
        };
        Self {
            kind,
            delay: None,
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Add a per-call delay (for concurrency and cancellation tests).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Configure a verb to fail forever with the given error.
    pub fn fail_with(&self, on: FailOn, error: ProviderError) {
        self.inner.lock().unwrap().failures.push_back(Failure {
            on,
            error,
            remaining: None,
        });
    }

    /// Configure a verb to fail `times` times, then behave normally.
    pub fn fail_times(&self, on: FailOn, error: ProviderError, times: u32) {
        self.inner.lock().unwrap().failures.push_back(Failure {
            on,
            error,
            remaining: Some(times),
        });
    }

    /// Seed an existing DNS record.
    pub fn seed_record(&self, name: Hostname, record_type: RecordType, value: &str) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.assign_id("rec");
        inner.state.records.push(RecordRef {
            id,
            name,
            record_type,
            value: value.to_string(),
        });
    }

    /// Seed an existing deployed service.
    pub fn seed_service(&self, name: ServiceName, image: ImageRef, fingerprint: Fingerprint) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.assign_id("svc");
        inner.state.services.push(ObservedService {
            id,
            name,
            image: Some(image),
            fingerprint: Some(fingerprint),
        });
    }

    /// Seed an existing domain binding.
    pub fn seed_binding(&self, hostname: Hostname, service: ServiceName) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.assign_id("bind");
        inner.state.bindings.push(BindingRef {
            id,
            hostname,
            service,
        });
    }

    /// Seed a certificate.
    pub fn seed_certificate(&self, hostname: Hostname, status: CertStatus) {
        let mut inner = self.inner.lock().unwrap();
        inner
            .state
            .certificates
            .push(ObservedCertificate { hostname, status });
    }

    /// Recorded operations, in call order.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Snapshot of current state (without going through `observe`).
    pub fn state(&self) -> ObservedState {
        self.inner.lock().unwrap().state.clone()
    }

    async fn simulate_latency(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    async fn observe(&self) -> Result<ObservedState, ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::Observe);
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::Observe)) {
            return Err(err);
        }
        Ok(inner.state.clone())
    }

    async fn upsert_record(
        &self,
        name: &Hostname,
        record_type: RecordType,
        value: &str,
    ) -> Result<RecordRef, ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::UpsertRecord {
            name: name.clone(),
            record_type,
            value: value.to_string(),
        });
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::UpsertRecord)) {
            return Err(err);
        }
        if let Some(existing) = inner
            .state
            .records
            .iter_mut()
            .find(|r| &r.name == name && r.record_type == record_type)
        {
            existing.value = value.to_string();
            return Ok(existing.clone());
        }
        let id = inner.assign_id("rec");
        let record = RecordRef {
            id,
            name: name.clone(),
            record_type,
            value: value.to_string(),
        };
        inner.state.records.push(record.clone());
        Ok(record)
    }

    async fn delete_record(
        &self,
        name: &Hostname,
        record_type: RecordType,
    ) -> Result<(), ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeleteRecord {
            name: name.clone(),
            record_type,
        });
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::DeleteRecord)) {
            return Err(err);
        }
        inner
            .state
            .records
            .retain(|r| !(&r.name == name && r.record_type == record_type));
        Ok(())
    }

    async fn deploy_container(
        &self,
        service: &ServiceName,
        image: &ImageRef,
        _scaling: &ScalingBounds,
        fingerprint: &Fingerprint,
    ) -> Result<ServiceRef, ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::DeployContainer {
            service: service.clone(),
            image: image.clone(),
            fingerprint: fingerprint.clone(),
        });
        if let Some(err) = inner.take_failure(|on| match on {
            FailOn::DeployContainer(None) => true,
            FailOn::DeployContainer(Some(target)) => target == service,
            _ => false,
        }) {
            return Err(err);
        }
        if let Some(existing) = inner
            .state
            .services
            .iter_mut()
            .find(|s| &s.name == service)
        {
            existing.image = Some(image.clone());
            existing.fingerprint = Some(fingerprint.clone());
            let id = existing.id.clone();
            return Ok(ServiceRef {
                id,
                name: service.clone(),
                url: None,
            });
        }
        let id = inner.assign_id("svc");
        inner.state.services.push(ObservedService {
            id: id.clone(),
            name: service.clone(),
            image: Some(image.clone()),
            fingerprint: Some(fingerprint.clone()),
        });
        Ok(ServiceRef {
            id,
            name: service.clone(),
            url: None,
        })
    }

    async fn bind_domain(
        &self,
        hostname: &Hostname,
        service: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::BindDomain {
            hostname: hostname.clone(),
            service: service.clone(),
        });
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::BindDomain)) {
            return Err(err);
        }
        if let Some(existing) = inner
            .state
            .bindings
            .iter_mut()
            .find(|b| &b.hostname == hostname)
        {
            existing.service = service.clone();
            return Ok(existing.clone());
        }
        let id = inner.assign_id("bind");
        let binding = BindingRef {
            id,
            hostname: hostname.clone(),
            service: service.clone(),
        };
        inner.state.bindings.push(binding.clone());
        Ok(binding)
    }

    async fn unbind_domain(&self, hostname: &Hostname) -> Result<(), ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::UnbindDomain {
            hostname: hostname.clone(),
        });
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::UnbindDomain)) {
            return Err(err);
        }
        inner.state.bindings.retain(|b| &b.hostname != hostname);
        Ok(())
    }

    async fn issue_certificate(
        &self,
        hostnames: &[Hostname],
    ) -> Result<CertStatus, ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::IssueCertificate {
            hostnames: hostnames.to_vec(),
        });
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::IssueCertificate)) {
            return Err(err);
        }
        // Mock issuance completes immediately.
        for hostname in hostnames {
            if let Some(cert) = inner
                .state
                .certificates
                .iter_mut()
                .find(|c| &c.hostname == hostname)
            {
                cert.status = CertStatus::Active;
            } else {
                inner.state.certificates.push(ObservedCertificate {
                    hostname: hostname.clone(),
                    status: CertStatus::Active,
                });
            }
        }
        Ok(CertStatus::Active)
    }

    async fn route_host(
        &self,
        hostname: &Hostname,
        backend: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        self.simulate_latency().await;
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(MockOperation::RouteHost {
            hostname: hostname.clone(),
            backend: backend.clone(),
        });
        if let Some(err) = inner.take_failure(|on| matches!(on, FailOn::RouteHost)) {
            return Err(err);
        }
        if let Some(existing) = inner
            .state
            .bindings
            .iter_mut()
            .find(|b| &b.hostname == hostname)
        {
            existing.service = backend.clone();
            return Ok(existing.clone());
        }
        let id = inner.assign_id("route");
        let binding = BindingRef {
            id,
            hostname: hostname.clone(),
            service: backend.clone(),
        };
        inner.state.bindings.push(binding.clone());
        Ok(binding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(s: &str) -> Hostname {
        Hostname::new(s).unwrap()
    }

    fn svc(s: &str) -> ServiceName {
        ServiceName::new(s).unwrap()
    }

    #[tokio::test]
    async fn upsert_record_is_idempotent() {
        let provider = MockProvider::new(ProviderKind::Dns);
        let name = host("api.example.com");

        let first = provider
            .upsert_record(&name, RecordType::Cname, "run.mock.invalid")
            .await
            .unwrap();
        let second = provider
            .upsert_record(&name, RecordType::Cname, "run.mock.invalid")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(provider.state().records.len(), 1);
    }

    #[tokio::test]
    async fn fail_times_recovers_after_budget() {
        let provider = MockProvider::new(ProviderKind::Dns);
        provider.fail_times(FailOn::UpsertRecord, ProviderError::RateLimited, 2);
        let name = host("api.example.com");

        for _ in 0..2 {
            let err = provider
                .upsert_record(&name, RecordType::Cname, "x")
                .await
                .unwrap_err();
            assert!(err.is_transient());
        }
        assert!(provider
            .upsert_record(&name, RecordType::Cname, "x")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn deploy_failure_can_target_one_service() {
        let provider = MockProvider::new(ProviderKind::Containers);
        provider.fail_with(
            FailOn::DeployContainer(Some(svc("api"))),
            ProviderError::QuotaExceeded("services".into()),
        );
        let image = ImageRef::new("r.example.com/x:1").unwrap();
        let fp = Fingerprint::compute(["x"]);

        let err = provider
            .deploy_container(&svc("api"), &image, &ScalingBounds::default(), &fp)
            .await
            .unwrap_err();
        assert!(!err.is_transient());

        assert!(provider
            .deploy_container(&svc("worker"), &image, &ScalingBounds::default(), &fp)
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn operations_are_recorded_in_order() {
        let provider = MockProvider::new(ProviderKind::Pages);
        let hostname = host("app.example.com");
        provider.bind_domain(&hostname, &svc("frontend")).await.unwrap();
        provider.issue_certificate(&[hostname.clone()]).await.unwrap();

        let ops = provider.operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], MockOperation::BindDomain { hostname: h, .. } if h == &hostname));
        assert!(matches!(&ops[1], MockOperation::IssueCertificate { .. }));
    }
}
