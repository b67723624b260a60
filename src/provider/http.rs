//! provider::http
//!
//! Shared HTTP plumbing for the REST provider adapters.
//!
//! # Design
//!
//! Every hosted control plane speaks bearer-token JSON over HTTPS; the
//! interesting differences live in paths and payloads, which stay in the
//! per-provider modules. This module owns client construction, request
//! dispatch, and the mapping from HTTP status codes to the classified
//! [`ProviderError`] taxonomy:
//!
//! - 401 / 403 -> `AuthFailed` (permanent)
//! - 404 -> `NotFound` (permanent; deletes treat it as already-gone)
//! - 400 / 422 -> `InvalidParams` (permanent)
//! - 429 -> `RateLimited` (transient)
//! - 5xx -> `Api` (transient)
//! - connect/read timeouts -> `Timeout`, other transport -> `Network`

use std::time::Duration;

use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::traits::{CertStatus, ProviderError};

/// Default per-request timeout against provider control planes.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Error body shape shared by the provider APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Certificate status payload shared by the provider APIs.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CertStatePayload {
    pub state: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl CertStatePayload {
    /// Convert a wire status into [`CertStatus`].
    ///
    /// Unknown states are treated as pending rather than failing the run:
    /// providers add states and a conservative read is the safe one.
    pub fn into_status(self) -> CertStatus {
        match self.state.as_str() {
            "active" => CertStatus::Active,
            "failed" => CertStatus::Failed {
                reason: self.reason.unwrap_or_else(|| "unspecified".to_string()),
            },
            _ => CertStatus::Pending,
        }
    }
}

/// A bearer-token JSON REST client bound to one provider's base URL.
#[derive(Debug, Clone)]
pub(crate) struct RestClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestClient {
    /// Build a client for the given control plane.
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ProviderError::Network(format!("failed to build HTTP client: {}", e)))?;
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ProviderError> {
        let response = self
            .client
            .get(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(response).await
    }

    /// PUT a JSON body, returning the resulting resource.
    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .put(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(response).await
    }

    /// POST a JSON body, returning the resulting resource.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ProviderError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        handle_response(response).await
    }

    /// DELETE a resource. A 404 is success: the resource is already gone.
    pub async fn delete(&self, path: &str) -> Result<(), ProviderError> {
        let response = self
            .client
            .delete(self.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(transport_error)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            Ok(())
        } else {
            Err(error_for_status(response, status).await)
        }
    }
}

/// Map reqwest transport failures to the provider taxonomy.
fn transport_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        ProviderError::Timeout(err.to_string())
    } else {
        ProviderError::Network(err.to_string())
    }
}

/// Handle an API response, mapping errors appropriately.
async fn handle_response<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
    let status = response.status();
    if status.is_success() {
        response.json().await.map_err(|e| ProviderError::Api {
            status: status.as_u16(),
            message: format!("failed to parse response: {}", e),
        })
    } else {
        Err(error_for_status(response, status).await)
    }
}

/// Classify an error response by status code.
async fn error_for_status(response: Response, status: StatusCode) -> ProviderError {
    let message = match response.json::<ApiErrorBody>().await {
        Ok(body) => body.message,
        Err(_) => "unknown error".to_string(),
    };

    match status {
        StatusCode::UNAUTHORIZED => ProviderError::AuthFailed("invalid or expired token".into()),
        StatusCode::FORBIDDEN => ProviderError::AuthFailed(format!("permission denied: {}", message)),
        StatusCode::NOT_FOUND => ProviderError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            ProviderError::InvalidParams(message)
        }
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited,
        _ => ProviderError::Api {
            status: status.as_u16(),
            message,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cert_state_mapping() {
        let active = CertStatePayload {
            state: "active".into(),
            reason: None,
        };
        assert_eq!(active.into_status(), CertStatus::Active);

        let failed = CertStatePayload {
            state: "failed".into(),
            reason: Some("CAA record forbids issuance".into()),
        };
        assert!(matches!(failed.into_status(), CertStatus::Failed { .. }));

        let odd = CertStatePayload {
            state: "provisioning".into(),
            reason: None,
        };
        assert_eq!(odd.into_status(), CertStatus::Pending);
    }
}
