//! provider::factory
//!
//! Provider selection and creation.
//!
//! # Design
//!
//! This module is the single place that knows how provider adapters are
//! constructed. The engine asks for a [`ProviderSet`] scoped to a
//! manifest; only the kinds the manifest actually uses are built, so an
//! all-frontend project never needs container platform credentials.
//!
//! # Credentials
//!
//! Credentials come exclusively from the environment, never the manifest:
//!
//! - `BERTH_DNS_API_URL` / `BERTH_DNS_TOKEN`
//! - `BERTH_PAGES_API_URL` / `BERTH_PAGES_TOKEN`
//! - `BERTH_CONTAINERS_API_URL` / `BERTH_CONTAINERS_TOKEN`
//! - `BERTH_LOADBALANCER_API_URL` / `BERTH_LOADBALANCER_TOKEN`
//!
//! # Test hook
//!
//! `BERTH_MOCK_PROVIDERS=1` substitutes deterministic in-memory providers
//! for every kind, and `BERTH_MOCK_FAIL_DEPLOY=<service>` makes the mock
//! platform reject that service's deploy with a permanent error. This is
//! how the CLI integration tests drive full runs without a network.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::containers::ContainersProvider;
use super::dns::DnsProvider;
use super::loadbalancer::LoadBalancerProvider;
use super::mock::{FailOn, MockProvider};
use super::pages::PagesProvider;
use super::traits::{Provider, ProviderError, ProviderKind};
use crate::core::manifest::{Manifest, RouteVia, ServiceTarget};
use crate::core::types::ServiceName;

/// Errors from provider construction.
#[derive(Debug, Error)]
pub enum FactoryError {
    /// A required credential variable is not set.
    #[error("missing credentials for {kind} provider: set {var}")]
    MissingEnv {
        kind: ProviderKind,
        var: String,
    },

    /// The adapter itself failed to construct.
    #[error("failed to create {kind} provider: {source}")]
    Provider {
        kind: ProviderKind,
        #[source]
        source: ProviderError,
    },
}

/// The set of provider adapters one run talks to.
#[derive(Clone)]
pub struct ProviderSet {
    providers: HashMap<ProviderKind, Arc<dyn Provider>>,
}

impl ProviderSet {
    /// Build the providers a manifest needs, from environment credentials.
    ///
    /// DNS is always required (every binding publishes a record); the
    /// other kinds are built only when the manifest references them.
    pub fn for_manifest(manifest: &Manifest) -> Result<Self, FactoryError> {
        let mut kinds = vec![ProviderKind::Dns];
        if manifest
            .services
            .iter()
            .any(|s| s.target == ServiceTarget::Pages)
        {
            kinds.push(ProviderKind::Pages);
        }
        if manifest
            .services
            .iter()
            .any(|s| s.target == ServiceTarget::Containers)
        {
            kinds.push(ProviderKind::Containers);
        }
        if manifest
            .bindings
            .iter()
            .any(|b| b.via == RouteVia::LoadBalancer)
        {
            kinds.push(ProviderKind::LoadBalancer);
        }

        if mock_providers_enabled() {
            return Ok(Self::mocked(&kinds));
        }

        let mut providers: HashMap<ProviderKind, Arc<dyn Provider>> = HashMap::new();
        for kind in kinds {
            providers.insert(kind, create_provider(kind)?);
        }
        Ok(Self { providers })
    }

    /// Build a set from explicit adapters (used by tests and the engine's
    /// unit tests; production code goes through [`ProviderSet::for_manifest`]).
    pub fn from_providers(
        providers: impl IntoIterator<Item = (ProviderKind, Arc<dyn Provider>)>,
    ) -> Self {
        Self {
            providers: providers.into_iter().collect(),
        }
    }

    fn mocked(kinds: &[ProviderKind]) -> Self {
        let mut providers: HashMap<ProviderKind, Arc<dyn Provider>> = HashMap::new();
        for &kind in kinds {
            let mock = MockProvider::new(kind);
            if kind == ProviderKind::Containers {
                if let Some(service) = mock_fail_deploy_target() {
                    mock.fail_with(
                        FailOn::DeployContainer(Some(service)),
                        ProviderError::QuotaExceeded("service quota exhausted".into()),
                    );
                }
            }
            providers.insert(kind, Arc::new(mock));
        }
        Self { providers }
    }

    /// Get the adapter for a kind.
    pub fn get(&self, kind: ProviderKind) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&kind)
    }

    /// The kinds this set was built with, in a stable order.
    pub fn kinds(&self) -> Vec<ProviderKind> {
        ProviderKind::all()
            .iter()
            .copied()
            .filter(|k| self.providers.contains_key(k))
            .collect()
    }
}

fn mock_providers_enabled() -> bool {
    std::env::var("BERTH_MOCK_PROVIDERS").is_ok_and(|v| v == "1" || v == "true")
}

fn mock_fail_deploy_target() -> Option<ServiceName> {
    std::env::var("BERTH_MOCK_FAIL_DEPLOY")
        .ok()
        .and_then(|v| ServiceName::new(v).ok())
}

/// Environment variable names for a provider kind.
fn env_vars(kind: ProviderKind) -> (String, String) {
    let prefix = kind.name().to_ascii_uppercase();
    (
        format!("BERTH_{}_API_URL", prefix),
        format!("BERTH_{}_TOKEN", prefix),
    )
}

fn create_provider(kind: ProviderKind) -> Result<Arc<dyn Provider>, FactoryError> {
    let (url_var, token_var) = env_vars(kind);
    let base_url = std::env::var(&url_var).map_err(|_| FactoryError::MissingEnv {
        kind,
        var: url_var.clone(),
    })?;
    let token = std::env::var(&token_var).map_err(|_| FactoryError::MissingEnv {
        kind,
        var: token_var.clone(),
    })?;

    let wrap = |source| FactoryError::Provider { kind, source };
    let provider: Arc<dyn Provider> = match kind {
        ProviderKind::Dns => Arc::new(DnsProvider::new(&base_url, &token).map_err(wrap)?),
        ProviderKind::Pages => Arc::new(PagesProvider::new(&base_url, &token).map_err(wrap)?),
        ProviderKind::Containers => {
            Arc::new(ContainersProvider::new(&base_url, &token).map_err(wrap)?)
        }
        ProviderKind::LoadBalancer => {
            Arc::new(LoadBalancerProvider::new(&base_url, &token).map_err(wrap)?)
        }
    };
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_var_names_follow_kind() {
        let (url, token) = env_vars(ProviderKind::LoadBalancer);
        assert_eq!(url, "BERTH_LOADBALANCER_API_URL");
        assert_eq!(token, "BERTH_LOADBALANCER_TOKEN");
    }

    #[test]
    fn kinds_are_reported_in_stable_order() {
        let set = ProviderSet::from_providers([
            (
                ProviderKind::Containers,
                Arc::new(MockProvider::new(ProviderKind::Containers)) as Arc<dyn Provider>,
            ),
            (
                ProviderKind::Dns,
                Arc::new(MockProvider::new(ProviderKind::Dns)) as Arc<dyn Provider>,
            ),
        ]);
        assert_eq!(
            set.kinds(),
            vec![ProviderKind::Dns, ProviderKind::Containers]
        );
    }
}
