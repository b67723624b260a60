//! provider::dns
//!
//! DNS registrar adapter.
//!
//! # API surface
//!
//! The registrar exposes record CRUD keyed by (hostname, type):
//!
//! - `GET  /v1/records` - list all records in the account's zones
//! - `PUT  /v1/records/{name}/{type}` - create or update a record
//! - `DELETE /v1/records/{name}/{type}` - remove a record
//!
//! Upserts are idempotent on the registrar side: PUT with the current
//! value returns the existing record unchanged.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::RestClient;
use super::traits::{ObservedState, Provider, ProviderError, ProviderKind, RecordRef};
use crate::core::manifest::RecordType;
use crate::core::types::Hostname;

/// DNS registrar provider.
#[derive(Debug, Clone)]
pub struct DnsProvider {
    client: RestClient,
}

/// A record as the registrar reports it.
#[derive(Debug, Deserialize)]
struct RecordPayload {
    id: String,
    name: String,
    #[serde(rename = "type")]
    record_type: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct UpsertRecordBody<'a> {
    value: &'a str,
}

impl DnsProvider {
    /// Create an adapter against the registrar API.
    pub fn new(base_url: &str, token: &str) -> Result<Self, ProviderError> {
        Ok(Self {
            client: RestClient::new(base_url, token)?,
        })
    }

    fn record_ref(payload: RecordPayload) -> Option<RecordRef> {
        // Skip record types and names this tool does not manage (MX, TXT,
        // apex NS records, ...) rather than failing the whole observe.
        let record_type = RecordType::parse(&payload.record_type)?;
        let name = Hostname::new(payload.name).ok()?;
        Some(RecordRef {
            id: payload.id,
            name,
            record_type,
            value: payload.value,
        })
    }
}

#[async_trait]
impl Provider for DnsProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Dns
    }

    async fn observe(&self) -> Result<ObservedState, ProviderError> {
        let payloads: Vec<RecordPayload> = self.client.get("/v1/records").await?;
        let records = payloads.into_iter().filter_map(Self::record_ref).collect();
        Ok(ObservedState {
            records,
            ..ObservedState::default()
        })
    }

    async fn upsert_record(
        &self,
        name: &Hostname,
        record_type: RecordType,
        value: &str,
    ) -> Result<RecordRef, ProviderError> {
        let path = format!("/v1/records/{}/{}", name, record_type.as_str());
        let payload: RecordPayload = self
            .client
            .put(&path, &UpsertRecordBody { value })
            .await?;
        Self::record_ref(payload).ok_or_else(|| ProviderError::Api {
            status: 200,
            message: "registrar returned an unparseable record".into(),
        })
    }

    async fn delete_record(
        &self,
        name: &Hostname,
        record_type: RecordType,
    ) -> Result<(), ProviderError> {
        let path = format!("/v1/records/{}/{}", name, record_type.as_str());
        self.client.delete(&path).await
    }
}
