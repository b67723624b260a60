//! provider::pages
//!
//! Static-site / frontend host adapter.
//!
//! # API surface
//!
//! Site builds and deploys are the host's CI integration's business; this
//! adapter only manages the domain side:
//!
//! - `GET  /v1/platform` - platform metadata (CNAME target for custom
//!   domains)
//! - `GET  /v1/domains` - custom domains and their certificate status
//! - `PUT  /v1/domains/{hostname}` - attach a domain to a site
//! - `DELETE /v1/domains/{hostname}` - detach a domain
//! - `POST /v1/certificates` - request managed certificates

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{CertStatePayload, RestClient};
use super::traits::{
    BindingRef, CertStatus, ObservedCertificate, ObservedState, Provider, ProviderError,
    ProviderKind,
};
use crate::core::types::{Hostname, ServiceName};

/// Frontend host provider.
#[derive(Debug, Clone)]
pub struct PagesProvider {
    client: RestClient,
}

#[derive(Debug, Deserialize)]
struct PlatformPayload {
    cname_target: String,
}

#[derive(Debug, Deserialize)]
struct DomainPayload {
    id: String,
    hostname: String,
    site: String,
    #[serde(default)]
    certificate: Option<CertStatePayload>,
}

#[derive(Debug, Serialize)]
struct AttachDomainBody<'a> {
    site: &'a str,
}

#[derive(Debug, Serialize)]
struct IssueCertificateBody<'a> {
    hostnames: &'a [Hostname],
}

impl PagesProvider {
    /// Create an adapter against the host API.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: RestClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl Provider for PagesProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Pages
    }

    async fn observe(&self) -> Result<ObservedState, ProviderError> {
        let platform: PlatformPayload = self.client.get("/v1/platform").await?;
        let domains: Vec<DomainPayload> = self.client.get("/v1/domains").await?;

        let mut state = ObservedState {
            endpoint: Some(platform.cname_target),
            ..ObservedState::default()
        };

        for payload in domains {
            let (Ok(hostname), Ok(service)) = (
                Hostname::new(payload.hostname),
                ServiceName::new(payload.site),
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

    async fn bind_domain(
        &self,
        hostname: &Hostname,
        service: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        let path = format!("/v1/domains/{}", hostname);
        let body = AttachDomainBody {
            site: service.as_str(),
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
