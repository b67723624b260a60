//! core::manifest::schema
//!
//! Manifest schema types: the raw TOML shape and the validated model.
//!
//! # Manifest format
//!
//! ```toml
//! [project]
//! name = "acme"
//!
//! [settings]
//! max_retries = 3
//! provider_concurrency = 4
//! timeout_secs = 600
//!
//! [[service]]
//! name = "api"
//! provider = "containers"
//! image = "registry.example.com/acme/api:1.4.2"
//! min_instances = 0
//! max_instances = 10
//! concurrency = 80
//! health_path = "/healthz"
//!
//! [[service]]
//! name = "frontend"
//! provider = "pages"
//! site = "acme-frontend"
//!
//! [[binding]]
//! hostname = "api.example.com"
//! service = "api"
//! record = "CNAME"
//! certificate = true
//! ```
//!
//! # Validation
//!
//! Raw values are parsed permissively (everything optional) and then
//! validated into the strong-typed model in [`super`]. Credentials never
//! appear in the manifest; they come from the environment.

use serde::{Deserialize, Serialize};

use crate::core::types::{Hostname, ImageRef, ServiceName};

// ---------------------------------------------------------------------------
// Raw TOML shape
// ---------------------------------------------------------------------------

/// The manifest exactly as it appears on disk.
///
/// Fields are optional so validation can produce targeted errors instead
/// of opaque serde failures.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawManifest {
    /// Project metadata.
    pub project: Option<RawProject>,

    /// Orchestration settings.
    pub settings: Option<RawSettings>,

    /// Declared services.
    #[serde(rename = "service")]
    pub services: Vec<RawService>,

    /// Declared domain bindings.
    #[serde(rename = "binding")]
    pub bindings: Vec<RawBinding>,
}

/// `[project]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawProject {
    pub name: Option<String>,
}

/// `[settings]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawSettings {
    pub max_retries: Option<u32>,
    pub provider_concurrency: Option<usize>,
    pub timeout_secs: Option<u64>,
    pub backoff_base_ms: Option<u64>,
    pub backoff_cap_ms: Option<u64>,
}

/// A `[[service]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawService {
    pub name: Option<String>,
    pub provider: Option<String>,
    pub image: Option<String>,
    pub site: Option<String>,
    pub min_instances: Option<u32>,
    pub max_instances: Option<u32>,
    pub concurrency: Option<u32>,
    pub health_path: Option<String>,
    pub health_timeout_secs: Option<u64>,
}

/// A `[[binding]]` entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RawBinding {
    pub hostname: Option<String>,
    pub service: Option<String>,
    pub record: Option<String>,
    pub certificate: Option<bool>,
    pub via: Option<String>,
}

// ---------------------------------------------------------------------------
// Validated model
// ---------------------------------------------------------------------------

/// Where a service is deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceTarget {
    /// Container-serving platform.
    Containers,
    /// Static-site / frontend host.
    Pages,
}

impl ServiceTarget {
    /// The target name as used in manifests.
    pub fn name(&self) -> &'static str {
        match self {
            ServiceTarget::Containers => "containers",
            ServiceTarget::Pages => "pages",
        }
    }

    /// Parse a manifest `provider` value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "containers" => Some(ServiceTarget::Containers),
            "pages" => Some(ServiceTarget::Pages),
            _ => None,
        }
    }
}

impl std::fmt::Display for ServiceTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// What gets deployed for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Artifact {
    /// A container image reference.
    Image(ImageRef),
    /// A built static site, identified by the host platform's site name.
    Site(String),
}

/// Scaling bounds for a container service.
///
/// Invariant: `min_instances <= max_instances` and `max_instances >= 1`,
/// enforced by manifest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingBounds {
    /// Minimum warm instances (0 allows scale-to-zero).
    pub min_instances: u32,
    /// Maximum instances.
    pub max_instances: u32,
    /// Concurrent requests per instance.
    pub concurrency: u32,
}

impl Default for ScalingBounds {
    fn default() -> Self {
        Self {
            min_instances: 0,
            max_instances: 1,
            concurrency: 80,
        }
    }
}

/// Health contract for a deployed service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthContract {
    /// HTTP path probed by the platform.
    pub path: String,
    /// Probe timeout in seconds.
    pub timeout_secs: u64,
}

/// A validated service declaration: the desired end state of one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceManifest {
    /// Service name, unique within the manifest.
    pub name: ServiceName,
    /// Which provider kind serves it.
    pub target: ServiceTarget,
    /// The deployable artifact.
    pub artifact: Artifact,
    /// Scaling bounds (container services only).
    pub scaling: Option<ScalingBounds>,
    /// Optional health contract.
    pub health: Option<HealthContract>,
}

/// DNS record type for a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Cname,
    Alias,
}

impl RecordType {
    /// Canonical record type string.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Cname => "CNAME",
            RecordType::Alias => "ALIAS",
        }
    }

    /// Parse a manifest `record` value (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "A" => Some(RecordType::A),
            "CNAME" => Some(RecordType::Cname),
            "ALIAS" => Some(RecordType::Alias),
            _ => None,
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How traffic reaches the bound service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteVia {
    /// Bound directly on the serving platform.
    Direct,
    /// Routed through the load balancer's host rules.
    LoadBalancer,
}

impl RouteVia {
    /// Parse a manifest `via` value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(RouteVia::Direct),
            "loadbalancer" => Some(RouteVia::LoadBalancer),
            _ => None,
        }
    }
}

/// A validated domain binding.
///
/// Invariant: each hostname maps to exactly one binding, enforced by
/// manifest validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainBinding {
    /// The public hostname.
    pub hostname: Hostname,
    /// The service it targets.
    pub service: ServiceName,
    /// DNS record type to publish.
    pub record: RecordType,
    /// Whether a managed certificate is required.
    pub certificate: bool,
    /// Routing path.
    pub via: RouteVia,
}

/// Orchestration settings with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Retry budget for transient provider failures.
    pub max_retries: u32,
    /// Per-provider cap on simultaneous in-flight calls.
    pub provider_concurrency: usize,
    /// Optional run-wide timeout.
    pub timeout_secs: Option<u64>,
    /// Base backoff delay in milliseconds.
    pub backoff_base_ms: u64,
    /// Backoff delay cap in milliseconds.
    pub backoff_cap_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            provider_concurrency: 4,
            timeout_secs: None,
            backoff_base_ms: 500,
            backoff_cap_ms: 10_000,
        }
    }
}

/// The validated manifest: desired end state for one run.
///
/// Immutable once loaded; the engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Project name.
    pub project: String,
    /// Orchestration settings.
    pub settings: Settings,
    /// Declared services, in manifest order.
    pub services: Vec<ServiceManifest>,
    /// Declared bindings, in manifest order.
    pub bindings: Vec<DomainBinding>,
}

impl Manifest {
    /// Look up a service by name.
    pub fn service(&self, name: &ServiceName) -> Option<&ServiceManifest> {
        self.services.iter().find(|s| &s.name == name)
    }
}
