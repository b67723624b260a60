//! provider::loadbalancer
//!
//! Load balancer adapter.
//!
//! # API surface
//!
//! The load balancer's internals (backend groups, forwarding rules) stay
//! opaque; the adapter only drives host routing and managed certificates:
//!
//! - `GET  /v1/frontend` - the public address DNS records point at
//! - `GET  /v1/routes` - host rules (hostname -> backend)
//! - `PUT  /v1/routes/{hostname}` - upsert a host rule
//! - `DELETE /v1/routes/{hostname}` - remove a host rule
//! - `GET  /v1/certificates` - managed certificates and their status
//! - `POST /v1/certificates` - request managed certificates

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{CertStatePayload, RestClient};
use super::traits::{
    BindingRef, CertStatus, ObservedCertificate, ObservedState, Provider, ProviderError,
    ProviderKind,
};
use crate::core::types::{Hostname, ServiceName};

/// Load balancer provider.
#[derive(Debug, Clone)]
pub struct LoadBalancerProvider {
    client: RestClient,
}

#[derive(Debug, Deserialize)]
struct FrontendPayload {
    address: String,
}

#[derive(Debug, Deserialize)]
struct RoutePayload {
    id: String,
    hostname: String,
    backend: String,
}

#[derive(Debug, Serialize)]
struct UpsertRouteBody<'a> {
    backend: &'a str,
}

#[derive(Debug, Deserialize)]
struct CertificatePayload {
    hostname: String,
    #[serde(flatten)]
    status: CertStatePayload,
}

#[derive(Debug, Serialize)]
struct IssueCertificateBody<'a> {
    hostnames: &'a [Hostname],
}

impl LoadBalancerProvider {
    /// Create an adapter against the load balancer API.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: RestClient::new(base_url, token)?,
        })
    }
}

#[async_trait]
impl Provider for LoadBalancerProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::LoadBalancer
    }

    async fn observe(&self) -> Result<ObservedState, ProviderError> {
        let frontend: FrontendPayload = self.client.get("/v1/frontend").await?;
        let routes: Vec<RoutePayload> = self.client.get("/v1/routes").await?;
        let certificates: Vec<CertificatePayload> = self.client.get("/v1/certificates").await?;

        let mut state = ObservedState {
            endpoint: Some(frontend.address),
            ..ObservedState::default()
        };

        for payload in routes {
            let (Ok(hostname), Ok(backend)) = (
                Hostname::new(payload.hostname),
                ServiceName::new(payload.backend),
            ) else {
                continue;
            };
            state.bindings.push(BindingRef {
                id: payload.id,
                hostname,
                service: backend,
            });
        }

        for payload in certificates {
            let Ok(hostname) = Hostname::new(payload.hostname) else {
                continue;
            };
            state.certificates.push(ObservedCertificate {
                hostname,
                status: payload.status.into_status(),
            });
        }

        Ok(state)
    }

    async fn route_host(
        &self,
        hostname: &Hostname,
        backend: &ServiceName,
    ) -> Result<BindingRef, ProviderError> {
        let path = format!("/v1/routes/{}", hostname);
        let body = UpsertRouteBody {
            backend: backend.as_str(),
        };
        let payload: RoutePayload = self.client.put(&path, &body).await?;
        Ok(BindingRef {
            id: payload.id,
            hostname: hostname.clone(),
            service: backend.clone(),
        })
    }

    async fn unbind_domain(&self, hostname: &Hostname) -> Result<(), ProviderError> {
        self.client.delete(&format!("/v1/routes/{}", hostname)).await
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
