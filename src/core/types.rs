//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ServiceName`] - Validated service identifier
//! - [`Hostname`] - Validated DNS hostname
//! - [`ImageRef`] - Container image reference
//! - [`Fingerprint`] - Desired-state hash for skip-if-already-applied
//! - [`OpId`] - Deterministic operation identifier
//! - [`RunId`] - Unique run identifier
//! - [`UtcTimestamp`] - RFC3339 timestamp
//!
//! # Validation
//!
//! These types enforce validity at construction time. Invalid values
//! cannot be represented, preventing entire classes of bugs.
//!
//! # Examples
//!
//! ```
//! use berth::core::types::{Hostname, ServiceName};
//!
//! // Valid constructions
//! let host = Hostname::new("api.example.com").unwrap();
//! let service = ServiceName::new("api").unwrap();
//!
//! // Invalid constructions fail at creation time
//! assert!(Hostname::new("has space.example.com").is_err());
//! assert!(ServiceName::new("-leading-dash").is_err());
//! ```

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid service name: {0}")]
    InvalidServiceName(String),

    #[error("invalid hostname: {0}")]
    InvalidHostname(String),

    #[error("invalid image reference: {0}")]
    InvalidImageRef(String),
}

/// A validated service identifier.
///
/// Service names follow the common cloud-provider rules:
/// - 1 to 63 characters
/// - Lowercase ASCII letters, digits, and hyphens
/// - Must start with a letter, must not end with a hyphen
///
/// # Example
///
/// ```
/// use berth::core::types::ServiceName;
///
/// let name = ServiceName::new("api-gateway").unwrap();
/// assert_eq!(name.as_str(), "api-gateway");
///
/// assert!(ServiceName::new("").is_err());
/// assert!(ServiceName::new("9lives").is_err());
/// assert!(ServiceName::new("Upper").is_err());
/// assert!(ServiceName::new("trailing-").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServiceName(String);

impl ServiceName {
    /// Create a new validated service name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidServiceName` if the name violates the rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidServiceName(
                "service name cannot be empty".into(),
            ));
        }
        if name.len() > 63 {
            return Err(TypeError::InvalidServiceName(
                "service name cannot exceed 63 characters".into(),
            ));
        }
        if !name.chars().next().is_some_and(|c| c.is_ascii_lowercase()) {
            return Err(TypeError::InvalidServiceName(
                "service name must start with a lowercase letter".into(),
            ));
        }
        if name.ends_with('-') {
            return Err(TypeError::InvalidServiceName(
                "service name cannot end with '-'".into(),
            ));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(TypeError::InvalidServiceName(format!(
                "service name '{}' contains invalid characters",
                name
            )));
        }
        Ok(())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ServiceName {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ServiceName> for String {
    fn from(value: ServiceName) -> Self {
        value.0
    }
}

/// A validated DNS hostname.
///
/// Hostnames must conform to RFC 1123:
/// - At least two dot-separated labels (bare labels are rejected; every
///   binding in a manifest names a fully qualified host)
/// - Each label 1-63 characters, ASCII letters/digits/hyphens
/// - Labels cannot start or end with a hyphen
/// - Total length at most 253 characters
/// - No trailing dot (canonical form)
///
/// # Example
///
/// ```
/// use berth::core::types::Hostname;
///
/// let host = Hostname::new("app.example.com").unwrap();
/// assert_eq!(host.as_str(), "app.example.com");
///
/// assert!(Hostname::new("").is_err());
/// assert!(Hostname::new("nodots").is_err());
/// assert!(Hostname::new("-bad.example.com").is_err());
/// assert!(Hostname::new("app.example.com.").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Hostname(String);

impl Hostname {
    /// Create a new validated hostname.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidHostname` if the name violates RFC 1123 rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        if name.is_empty() {
            return Err(TypeError::InvalidHostname(
                "hostname cannot be empty".into(),
            ));
        }
        if name.len() > 253 {
            return Err(TypeError::InvalidHostname(
                "hostname cannot exceed 253 characters".into(),
            ));
        }
        if name.ends_with('.') {
            return Err(TypeError::InvalidHostname(
                "hostname must not have a trailing dot".into(),
            ));
        }
        let labels: Vec<&str> = name.split('.').collect();
        if labels.len() < 2 {
            return Err(TypeError::InvalidHostname(format!(
                "'{}' is not a fully qualified hostname",
                name
            )));
        }
        for label in labels {
            if label.is_empty() || label.len() > 63 {
                return Err(TypeError::InvalidHostname(format!(
                    "label in '{}' must be 1-63 characters",
                    name
                )));
            }
            if label.starts_with('-') || label.ends_with('-') {
                return Err(TypeError::InvalidHostname(format!(
                    "label in '{}' cannot start or end with '-'",
                    name
                )));
            }
            if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Err(TypeError::InvalidHostname(format!(
                    "'{}' contains invalid characters",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Get the hostname as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Hostname {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Hostname {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Hostname> for String {
    fn from(value: Hostname) -> Self {
        value.0
    }
}

/// A container image reference.
///
/// Validation is intentionally light: registries disagree on the fine
/// details, so this only rejects values that cannot possibly be an image
/// reference (empty, whitespace, control characters).
///
/// # Example
///
/// ```
/// use berth::core::types::ImageRef;
///
/// let image = ImageRef::new("registry.example.com/acme/api:1.4.2").unwrap();
/// assert_eq!(image.as_str(), "registry.example.com/acme/api:1.4.2");
///
/// assert!(ImageRef::new("").is_err());
/// assert!(ImageRef::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ImageRef(String);

impl ImageRef {
    /// Create a new validated image reference.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidImageRef` if the reference is malformed.
    pub fn new(image: impl Into<String>) -> Result<Self, TypeError> {
        let image = image.into();
        if image.is_empty() {
            return Err(TypeError::InvalidImageRef(
                "image reference cannot be empty".into(),
            ));
        }
        if image.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(TypeError::InvalidImageRef(format!(
                "image reference '{}' contains whitespace or control characters",
                image
            )));
        }
        Ok(Self(image))
    }

    /// Get the reference as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ImageRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ImageRef {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ImageRef> for String {
    fn from(value: ImageRef) -> Self {
        value.0
    }
}

/// A SHA-256 digest of an operation's desired-state parameters.
///
/// Fingerprints enable skip-if-already-applied semantics: a deploy stamps
/// the remote service with the fingerprint of the parameters it applied,
/// and the planner emits no operation when the observed fingerprint
/// already matches the desired one.
///
/// # Example
///
/// ```
/// use berth::core::types::Fingerprint;
///
/// let a = Fingerprint::compute(["api", "registry.example.com/api:1.0"]);
/// let b = Fingerprint::compute(["api", "registry.example.com/api:1.0"]);
/// let c = Fingerprint::compute(["api", "registry.example.com/api:1.1"]);
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Compute a fingerprint over an ordered sequence of parameter strings.
    ///
    /// Parts are length-prefixed before hashing so the boundary between
    /// adjacent parts is unambiguous.
    pub fn compute<'a>(parts: impl IntoIterator<Item = &'a str>) -> Self {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update((part.len() as u64).to_be_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already-computed digest (e.g. read back from a provider).
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// Get the full hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display (first 12 hex characters).
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.short())
    }
}

/// A deterministic operation identifier.
///
/// Operation ids are slugs derived from the operation's verb and target
/// (`deploy/api`, `record/api.example.com/CNAME`), so the same manifest
/// diff always produces the same ids. This keeps plans reproducible and
/// run reports readable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpId(String);

impl OpId {
    /// Create an operation id from a pre-built slug.
    pub fn new(slug: impl Into<String>) -> Self {
        Self(slug.into())
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OpId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unique run identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Generate a fresh run id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::generate()
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An RFC3339 UTC timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcTimestamp(chrono::DateTime<chrono::Utc>);

impl UtcTimestamp {
    /// Capture the current time.
    pub fn now() -> Self {
        Self(chrono::Utc::now())
    }

    /// The wrapped instant.
    pub fn instant(&self) -> chrono::DateTime<chrono::Utc> {
        self.0
    }
}

impl std::fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            self.0.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)
        )
    }
}
