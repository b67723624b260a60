//! provider::traits
//!
//! Provider trait definition for interacting with remote control planes.
//!
//! # Design
//!
//! The `Provider` trait is async because every verb involves network I/O.
//! All methods return `Result` to handle API errors gracefully.
//!
//! Each verb is idempotent: re-invoking with identical parameters against
//! already-matching remote state is a no-op returning the existing
//! reference. A provider kind that does not support a verb returns
//! [`ProviderError::NotSupported`]; the planner never routes a verb to a
//! kind that cannot serve it, so hitting that error indicates a planner bug.
//!
//! # Error classification
//!
//! Failures classify as transient (safe to retry: rate limits, timeouts,
//! network, 5xx) or permanent (requires manifest correction: bad
//! parameters, quota, auth). [`ProviderError::is_transient`] drives the
//! executor's retry policy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::manifest::{RecordType, ScalingBounds};
use crate::core::types::{Fingerprint, Hostname, ImageRef, ServiceName};

/// Errors from provider operations.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// The provider did not answer in time.
    #[error("request timed out: {0}")]
    Timeout(String),

    /// Network or connection error.
    #[error("network error: {0}")]
    Network(String),

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The request parameters were rejected.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// An account quota is exhausted.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The verb is not supported by this provider kind.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl ProviderError {
    /// Whether retrying the same call may succeed.
    ///
    /// Rate limits, timeouts, network failures, and server errors are
    /// transient. Everything else requires manifest or account correction.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited
            | ProviderError::Timeout(_)
            | ProviderError::Network(_) => true,
            ProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// The provider kinds the orchestrator talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// DNS registrar: record CRUD keyed by (hostname, type).
    Dns,
    /// Static-site / frontend host: domain binding and certificate status.
    Pages,
    /// Container-serving platform: deploys, scaling, domain mapping.
    Containers,
    /// Load balancer: host-rule upsert and managed certificates.
    #[serde(rename = "loadbalancer")]
    LoadBalancer,
}

impl ProviderKind {
    /// All provider kinds.
    pub fn all() -> &'static [ProviderKind] {
        &[
            ProviderKind::Dns,
            ProviderKind::Pages,
            ProviderKind::Containers,
            ProviderKind::LoadBalancer,
        ]
    }

    /// The kind name as used in output and environment variables.
    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Dns => "dns",
            ProviderKind::Pages => "pages",
            ProviderKind::Containers => "containers",
            ProviderKind::LoadBalancer => "loadbalancer",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Reference to a DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordRef {
    /// Provider-assigned record id.
    pub id: String,
    /// Record name (hostname).
    pub name: Hostname,
    /// Record type.
    pub record_type: RecordType,
    /// Record value (target address or alias).
    pub value: String,
}

/// Reference to a deployed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRef {
    /// Provider-assigned service id.
    pub id: String,
    /// Service name.
    pub name: ServiceName,
    /// Serving URL, if the platform exposes one.
    pub url: Option<String>,
}

/// Reference to a domain binding or host rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindingRef {
    /// Provider-assigned binding id.
    pub id: String,
    /// Bound hostname.
    pub hostname: Hostname,
    /// Name of the backing service.
    pub service: ServiceName,
}

/// Managed certificate status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CertStatus {
    /// Issuance requested; propagation in progress.
    Pending,
    /// Certificate issued and serving.
    Active,
    /// Issuance failed.
    Failed {
        /// Provider-reported reason.
        reason: String,
    },
}

/// A service as observed on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedService {
    /// Provider-assigned id.
    pub id: String,
    /// Service name.
    pub name: ServiceName,
    /// Currently served image, if reported.
    pub image: Option<ImageRef>,
    /// Fingerprint of the last applied deploy, if stamped.
    pub fingerprint: Option<Fingerprint>,
}

/// A certificate as observed on a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedCertificate {
    /// Covered hostname.
    pub hostname: Hostname,
    /// Current status.
    pub status: CertStatus,
}

/// Everything one provider reports about its current state.
///
/// Fetched once per run and read-only thereafter. Unknown sections stay
/// empty for provider kinds that do not have them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedState {
    /// The canonical endpoint DNS records should point at (load balancer
    /// address, platform CNAME target). `None` for the DNS provider itself.
    pub endpoint: Option<String>,
    /// DNS records (DNS provider only).
    #[serde(default)]
    pub records: Vec<RecordRef>,
    /// Deployed services (containers provider only).
    #[serde(default)]
    pub services: Vec<ObservedService>,
    /// Domain bindings / host rules.
    #[serde(default)]
    pub bindings: Vec<BindingRef>,
    /// Certificates.
    #[serde(default)]
    pub certificates: Vec<ObservedCertificate>,
}

impl ObservedState {
    /// Look up a record by name and type.
    pub fn record(&self, name: &Hostname, record_type: RecordType) -> Option<&RecordRef> {
        self.records
            .iter()
            .find(|r| &r.name == name && r.record_type == record_type)
    }

    /// Look up a deployed service by name.
    pub fn service(&self, name: &ServiceName) -> Option<&ObservedService> {
        self.services.iter().find(|s| &s.name == name)
    }

    /// Look up a binding by hostname.
    pub fn binding(&self, hostname: &Hostname) -> Option<&BindingRef> {
        self.bindings.iter().find(|b| &b.hostname == hostname)
    }

    /// Look up a certificate by hostname.
    pub fn certificate(&self, hostname: &Hostname) -> Option<&ObservedCertificate> {
        self.certificates.iter().find(|c| &c.hostname == hostname)
    }
}

/// Uniform capability interface over one external control plane.
///
/// Implementations hide provider-specific APIs behind this verb set; the
/// reconciliation engine never sees anything else.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Which kind of provider this is.
    fn kind(&self) -> ProviderKind;

    /// Fetch the provider's current state. Called once per run.
    async fn observe(&self) -> Result<ObservedState, ProviderError>;

    /// Create or update a DNS record.
    async fn upsert_record(
        &self,
        name: &Hostname,
        record_type: RecordType,
        value: &str,
    ) -> Result<RecordRef, ProviderError> {
        let _ = (name, record_type, value);
        Err(ProviderError::NotSupported(format!(
            "upsert_record on {}",
            self.kind()
        )))
    }

    /// Delete a DNS record.
    async fn delete_record(
        &self,
        name: &Hostname,
        record_type: RecordType,
    ) -> Result<(), ProviderError> {
        let _ = (name, record_type);
        Err(ProviderError::NotSupported(format!(
            "delete_record on {}",
            self.kind()
        )))
    }

    /// Deploy a container image with the given scaling bounds.
    ///
    /// The fingerprint is stamped on the remote service so a later observe
    /// can skip an already-applied deploy.
    async fn deploy_container(
        &self,
        service: &ServiceName,
        image: &ImageRef,
        scaling: &ScalingBounds,
        fingerprint: &Fingerprint,
    ) -> Result<ServiceRef, ProviderError> {
        let _ = (service, image, scaling, fingerprint);
        Err(ProviderError::NotSupported(format!(
            "deploy_container on {}",
            self.kind()
        )))
    }

    /// Bind a hostname to a service on this platform.
    async fn bind_domain(
        &self,
        hostname: &Hostname,
        service: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        let _ = (hostname, service);
        Err(ProviderError::NotSupported(format!(
            "bind_domain on {}",
            self.kind()
        )))
    }

    /// Remove a hostname binding.
    async fn unbind_domain(&self, hostname: &Hostname) -> Result<(), ProviderError> {
        let _ = hostname;
        Err(ProviderError::NotSupported(format!(
            "unbind_domain on {}",
            self.kind()
        )))
    }

    /// Request managed certificates for the given hostnames.
    ///
    /// Issuance is asynchronous on every real provider; `Pending` is a
    /// successful outcome.
    async fn issue_certificate(
        &self,
        hostnames: &[Hostname],
    ) -> Result<CertStatus, ProviderError> {
        let _ = hostnames;
        Err(ProviderError::NotSupported(format!(
            "issue_certificate on {}",
            self.kind()
        )))
    }

    /// Upsert a load-balancer host rule routing a hostname to a backend.
    async fn route_host(
        &self,
        hostname: &Hostname,
        backend: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        let _ = (hostname, backend);
        Err(ProviderError::NotSupported(format!(
            "route_host on {}",
            self.kind()
        )))
    }
}
