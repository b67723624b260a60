//! core::manifest
//!
//! Manifest loading and validation.
//!
//! # Design
//!
//! Loading is a two-step pipeline: parse the TOML into the permissive
//! [`schema::RawManifest`], then validate into the strong-typed
//! [`schema::Manifest`]. Validation is pure (no side effects, no network)
//! and rejects:
//!
//! - duplicate service names and duplicate hostnames
//! - scaling bounds where `min > max` or `max == 0`
//! - services with no provider target or no artifact
//! - bindings referencing undeclared services
//!
//! A validation failure is fatal: no operations run against any provider.

pub mod schema;

use std::collections::HashSet;
use std::path::Path;

use thiserror::Error;

use crate::core::types::{Hostname, ImageRef, ServiceName, TypeError};
pub use schema::{
    Artifact, DomainBinding, HealthContract, Manifest, RecordType, RouteVia, ScalingBounds,
    ServiceManifest, ServiceTarget, Settings,
};
use schema::{RawBinding, RawManifest, RawService};

/// Errors from manifest loading and validation.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Could not read the manifest file.
    #[error("failed to read manifest {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML (or has unknown fields).
    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value failed strong-type validation.
    #[error(transparent)]
    Type(#[from] TypeError),

    /// `[project]` section or its name is missing.
    #[error("manifest is missing [project] name")]
    MissingProject,

    /// Two services share a name.
    #[error("duplicate service name: {0}")]
    DuplicateService(String),

    /// Two bindings share a hostname.
    #[error("duplicate hostname: {0}")]
    DuplicateHostname(String),

    /// A service has no `provider` field.
    #[error("service '{service}' is missing a provider target")]
    MissingProviderTarget { service: String },

    /// A service names a provider this tool does not know.
    #[error("service '{service}' has unknown provider target '{provider}'")]
    UnknownProviderTarget { service: String, provider: String },

    /// A service declares no deployable artifact.
    #[error("service '{service}' needs {expected} for provider '{provider}'")]
    MissingArtifact {
        service: String,
        provider: String,
        expected: &'static str,
    },

    /// Scaling bounds are inverted or empty.
    #[error("service '{service}' has invalid scaling bounds: min {min} > max {max}")]
    InvalidScaling { service: String, min: u32, max: u32 },

    /// Scaling bounds allow zero instances at most.
    #[error("service '{service}' must allow at least one instance")]
    ZeroMaxInstances { service: String },

    /// A binding is missing its hostname.
    #[error("binding is missing a hostname")]
    MissingHostname,

    /// A binding is missing its target service.
    #[error("binding for '{hostname}' is missing a target service")]
    MissingBindingService { hostname: String },

    /// A binding targets a service the manifest does not declare.
    #[error("binding for '{hostname}' references unknown service '{service}'")]
    UnknownService { hostname: String, service: String },

    /// A binding names an unknown record type.
    #[error("binding for '{hostname}' has unknown record type '{record}'")]
    UnknownRecordType { hostname: String, record: String },

    /// A binding names an unknown routing mode.
    #[error("binding for '{hostname}' has unknown route '{via}' (expected 'direct' or 'loadbalancer')")]
    UnknownRoute { hostname: String, via: String },
}

/// Load and validate a manifest from disk.
///
/// # Errors
///
/// Returns [`ManifestError`] for I/O, parse, or validation failures.
/// Any error means no operations will run.
pub fn load(path: &Path) -> Result<Manifest, ManifestError> {
    let text = std::fs::read_to_string(path).map_err(|source| ManifestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    parse(&text)
}

/// Parse and validate manifest text.
pub fn parse(text: &str) -> Result<Manifest, ManifestError> {
    let raw: RawManifest = toml::from_str(text)?;
    validate(raw)
}

/// Validate a raw manifest into the strong-typed model.
pub fn validate(raw: RawManifest) -> Result<Manifest, ManifestError> {
    let project = raw
        .project
        .and_then(|p| p.name)
        .filter(|n| !n.is_empty())
        .ok_or(ManifestError::MissingProject)?;

    let settings = raw
        .settings
        .map(|s| {
            let defaults = Settings::default();
            Settings {
                max_retries: s.max_retries.unwrap_or(defaults.max_retries),
                provider_concurrency: s
                    .provider_concurrency
                    .unwrap_or(defaults.provider_concurrency)
                    .max(1),
                timeout_secs: s.timeout_secs,
                backoff_base_ms: s.backoff_base_ms.unwrap_or(defaults.backoff_base_ms),
                backoff_cap_ms: s.backoff_cap_ms.unwrap_or(defaults.backoff_cap_ms),
            }
        })
        .unwrap_or_default();

    let mut services = Vec::with_capacity(raw.services.len());
    let mut seen_services: HashSet<ServiceName> = HashSet::new();
    for raw_service in raw.services {
        let service = validate_service(raw_service)?;
        if !seen_services.insert(service.name.clone()) {
            return Err(ManifestError::DuplicateService(service.name.to_string()));
        }
        services.push(service);
    }

    let mut bindings = Vec::with_capacity(raw.bindings.len());
    let mut seen_hostnames: HashSet<Hostname> = HashSet::new();
    for raw_binding in raw.bindings {
        let binding = validate_binding(raw_binding, &seen_services)?;
        if !seen_hostnames.insert(binding.hostname.clone()) {
            return Err(ManifestError::DuplicateHostname(
                binding.hostname.to_string(),
            ));
        }
        bindings.push(binding);
    }

    Ok(Manifest {
        project,
        settings,
        services,
        bindings,
    })
}

fn validate_service(raw: RawService) -> Result<ServiceManifest, ManifestError> {
    let name = ServiceName::new(raw.name.unwrap_or_default())?;

    let provider = raw
        .provider
        .ok_or_else(|| ManifestError::MissingProviderTarget {
            service: name.to_string(),
        })?;
    let target =
        ServiceTarget::parse(&provider).ok_or_else(|| ManifestError::UnknownProviderTarget {
            service: name.to_string(),
            provider: provider.clone(),
        })?;

    let artifact = match target {
        ServiceTarget::Containers => {
            let image = raw.image.ok_or_else(|| ManifestError::MissingArtifact {
                service: name.to_string(),
                provider: provider.clone(),
                expected: "an image",
            })?;
            Artifact::Image(ImageRef::new(image)?)
        }
        ServiceTarget::Pages => {
            let site = raw.site.ok_or_else(|| ManifestError::MissingArtifact {
                service: name.to_string(),
                provider: provider.clone(),
                expected: "a site",
            })?;
            Artifact::Site(site)
        }
    };

    let scaling = match target {
        ServiceTarget::Containers => {
            let defaults = ScalingBounds::default();
            let bounds = ScalingBounds {
                min_instances: raw.min_instances.unwrap_or(defaults.min_instances),
                max_instances: raw.max_instances.unwrap_or(defaults.max_instances),
                concurrency: raw.concurrency.unwrap_or(defaults.concurrency).max(1),
            };
            if bounds.max_instances == 0 {
                return Err(ManifestError::ZeroMaxInstances {
                    service: name.to_string(),
                });
            }
            if bounds.min_instances > bounds.max_instances {
                return Err(ManifestError::InvalidScaling {
                    service: name.to_string(),
                    min: bounds.min_instances,
                    max: bounds.max_instances,
                });
            }
            Some(bounds)
        }
        // Scaling is the platform's business for static sites.
        ServiceTarget::Pages => None,
    };

    let health = raw.health_path.map(|path| HealthContract {
        path,
        timeout_secs: raw.health_timeout_secs.unwrap_or(5),
    });

    Ok(ServiceManifest {
        name,
        target,
        artifact,
        scaling,
        health,
    })
}

fn validate_binding(
    raw: RawBinding,
    known_services: &HashSet<ServiceName>,
) -> Result<DomainBinding, ManifestError> {
    let hostname_str = raw.hostname.ok_or(ManifestError::MissingHostname)?;
    let hostname = Hostname::new(hostname_str)?;

    let service_str = raw
        .service
        .ok_or_else(|| ManifestError::MissingBindingService {
            hostname: hostname.to_string(),
        })?;
    let service = ServiceName::new(service_str)?;
    if !known_services.contains(&service) {
        return Err(ManifestError::UnknownService {
            hostname: hostname.to_string(),
            service: service.to_string(),
        });
    }

    let record = match raw.record {
        Some(r) => RecordType::parse(&r).ok_or_else(|| ManifestError::UnknownRecordType {
            hostname: hostname.to_string(),
            record: r,
        })?,
        None => RecordType::Cname,
    };

    let via = match raw.via {
        Some(v) => RouteVia::parse(&v).ok_or_else(|| ManifestError::UnknownRoute {
            hostname: hostname.to_string(),
            via: v,
        })?,
        None => RouteVia::Direct,
    };

    Ok(DomainBinding {
        hostname,
        service,
        record,
        certificate: raw.certificate.unwrap_or(false),
        via,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASIC: &str = r#"
        [project]
        name = "acme"

        [[service]]
        name = "api"
        provider = "containers"
        image = "registry.example.com/acme/api:1.4.2"
        min_instances = 1
        max_instances = 10

        [[service]]
        name = "frontend"
        provider = "pages"
        site = "acme-frontend"

        [[binding]]
        hostname = "api.example.com"
        service = "api"
        record = "CNAME"
        certificate = true

        [[binding]]
        hostname = "app.example.com"
        service = "frontend"
        certificate = true
    "#;

    #[test]
    fn parses_and_validates_basic_manifest() {
        let manifest = parse(BASIC).unwrap();
        assert_eq!(manifest.project, "acme");
        assert_eq!(manifest.services.len(), 2);
        assert_eq!(manifest.bindings.len(), 2);

        let api = &manifest.services[0];
        assert_eq!(api.target, ServiceTarget::Containers);
        assert_eq!(api.scaling.unwrap().max_instances, 10);

        let frontend = &manifest.services[1];
        assert_eq!(frontend.target, ServiceTarget::Pages);
        assert!(frontend.scaling.is_none());

        // Defaults: CNAME record, direct routing.
        assert_eq!(manifest.bindings[1].record, RecordType::Cname);
        assert_eq!(manifest.bindings[1].via, RouteVia::Direct);
    }

    #[test]
    fn rejects_duplicate_hostnames() {
        let text = r#"
            [project]
            name = "acme"

            [[service]]
            name = "api"
            provider = "containers"
            image = "r.example.com/api:1"

            [[binding]]
            hostname = "api.example.com"
            service = "api"

            [[binding]]
            hostname = "api.example.com"
            service = "api"
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ManifestError::DuplicateHostname(h) if h == "api.example.com"));
    }

    #[test]
    fn rejects_inverted_scaling_bounds() {
        let text = r#"
            [project]
            name = "acme"

            [[service]]
            name = "api"
            provider = "containers"
            image = "r.example.com/api:1"
            min_instances = 5
            max_instances = 2
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::InvalidScaling { min: 5, max: 2, .. }
        ));
    }

    #[test]
    fn rejects_missing_provider_target() {
        let text = r#"
            [project]
            name = "acme"

            [[service]]
            name = "api"
            image = "r.example.com/api:1"
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ManifestError::MissingProviderTarget { .. }));
    }

    #[test]
    fn rejects_binding_to_unknown_service() {
        let text = r#"
            [project]
            name = "acme"

            [[service]]
            name = "api"
            provider = "containers"
            image = "r.example.com/api:1"

            [[binding]]
            hostname = "db.example.com"
            service = "database"
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ManifestError::UnknownService { service, .. } if service == "database"));
    }

    #[test]
    fn rejects_containers_service_without_image() {
        let text = r#"
            [project]
            name = "acme"

            [[service]]
            name = "api"
            provider = "containers"
        "#;
        let err = parse(text).unwrap_err();
        assert!(matches!(err, ManifestError::MissingArtifact { .. }));
    }

    #[test]
    fn rejects_unknown_fields() {
        let text = r#"
            [project]
            name = "acme"
            token = "secret-credentials-do-not-belong-here"
        "#;
        assert!(matches!(parse(text), Err(ManifestError::Parse(_))));
    }

    #[test]
    fn missing_project_is_rejected() {
        assert!(matches!(parse(""), Err(ManifestError::MissingProject)));
    }

    #[test]
    fn settings_defaults_apply() {
        let manifest = parse(
            r#"
            [project]
            name = "acme"
        "#,
        )
        .unwrap();
        assert_eq!(manifest.settings, Settings::default());
        assert_eq!(manifest.settings.max_retries, 3);
    }
}
