//! provider::containers
//!
//! Container-serving platform adapter.
//!
//! # API surface
//!
//! - `GET  /v1/platform` - platform metadata (the CNAME target for mapped
//!   domains)
//! - `GET  /v1/services` - deployed services, including the desired-state
//!   fingerprint stamped by the last deploy
//! - `PUT  /v1/services/{name}` - create or update a service revision
//! - `GET  /v1/domains` - domain mappings and their certificate status
//! - `PUT  /v1/domains/{hostname}` - map a domain to a service
//! - `DELETE /v1/domains/{hostname}` - remove a mapping
//! - `POST /v1/certificates` - request managed certificates
//!
//! The fingerprint travels as an annotation on the service; the platform
//! stores it opaquely and reports it back on GET, which is what makes
//! skip-if-already-applied work without diffing the platform's own
//! revision model.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{CertStatePayload, RestClient};
use super::traits::{
    BindingRef, CertStatus, ObservedCertificate, ObservedService, ObservedState, Provider,
    ProviderError, ProviderKind, ServiceRef,
};
use crate::core::manifest::ScalingBounds;
use crate::core::types::{Fingerprint, Hostname, ImageRef, ServiceName};

/// Container-serving platform provider.
#[derive(Debug, Clone)]
pub struct ContainersProvider {
    client: RestClient,
}

#[derive(Debug, Deserialize)]
struct PlatformPayload {
    cname_target: String,
}

#[derive(Debug, Deserialize)]
struct ServicePayload {
    id: String,
    name: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    fingerprint: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeployBody<'a> {
    image: &'a str,
    min_instances: u32,
    max_instances: u32,
    concurrency: u32,
    fingerprint: &'a str,
}

#[derive(Debug, Deserialize)]
struct DomainPayload {
    id: String,
    hostname: String,
    service: String,
    #[serde(default)]
    certificate: Option<CertStatePayload>,
}

#[derive(Debug, Serialize)]
struct BindDomainBody<'a> {
    service: &'a str,
}

#[derive(Debug, Serialize)]
struct IssueCertificateBody<'a> {
    hostnames: &'a [Hostname],
}

impl ContainersProvider {
    /// Create an adapter against the platform API.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: RestClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl Provider for ContainersProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Containers
    }

    async fn observe(&self) -> Result<ObservedState, ProviderError> {
        let platform: PlatformPayload = self.client.get("/v1/platform").await?;
        let services: Vec<ServicePayload> = self.client.get("/v1/services").await?;
        let domains: Vec<DomainPayload> = self.client.get("/v1/domains").await?;

        let mut state = ObservedState {
            endpoint: Some(platform.cname_target),
            ..ObservedState::default()
        };

        for payload in services {
            let Ok(name) = ServiceName::new(payload.name) else {
                continue;
            };
            state.services.push(ObservedService {
                id: payload.id,
                name,
                image: payload.image.and_then(|i| ImageRef::new(i).ok()),
                fingerprint: payload.fingerprint.map(Fingerprint::from_hex),
            });
        }

        for payload in domains {
            let (Ok(hostname), Ok(service)) = (
                Hostname::new(payload.hostname),
                ServiceName::new(payload.service),
            ) else {
                continue;
            };
            if let Some(cert) = payload.certificate {
                state.certificates.push(ObservedCertificate {
                    hostname: hostname.clone(),
                    status: cert.into_status(),
                });
            }
            state.bindings.push(BindingRef {
                id: payload.id,
                hostname,
                service,
            });
        }

        Ok(state)
    }

    async fn deploy_container(
        &self,
        service: &ServiceName,
        image: &ImageRef,
        scaling: &ScalingBounds,
        fingerprint: &Fingerprint,
    ) -> Result<ServiceRef, ProviderError> {
        let path = format!("/v1/services/{}", service);
        let body = DeployBody {
            image: image.as_str(),
            min_instances: scaling.min_instances,
            max_instances: scaling.max_instances,
            concurrency: scaling.concurrency,
            fingerprint: fingerprint.as_str(),
        };
        let payload: ServicePayload = self.client.put(&path, &body).await?;
        Ok(ServiceRef {
            id: payload.id,
            name: service.clone(),
            url: payload.url,
        })
    }

    async fn bind_domain(
        &self,
        hostname: &Hostname,
        service: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        let path = format!("/v1/domains/{}", hostname);
        let body = BindDomainBody {
            service: service.as_str(),
        };
        let payload: DomainPayload = self.client.put(&path, &body).await?;
        Ok(BindingRef {
            id: payload.id,
            hostname: hostname.clone(),
            service: service.clone(),
        })
    }

    async fn unbind_domain(&self, hostname: &Hostname) -> Result<(), ProviderError> {
        self.client.delete(&format!("/v1/domains/{}", hostname)).await
    }

    async fn issue_certificate(
        &self,
        hostnames: &[Hostname],
    ) -> Result<CertStatus, ProviderError> {
        let payload: CertStatePayload = self
            .client
            .post("/v1/certificates", &IssueCertificateBody { hostnames })
            .await?;
        Ok(payload.into_status())
    }
}
