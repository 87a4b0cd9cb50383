//! reqwest-backed chat-completions transport

use super::types::ChatCompletionRequest;
use crate::transport::{ChatTransport, TransportFailure, TransportResponse};
use async_trait::async_trait;
use reqwest::Client;
use scamguard_core::{ConfigError, ProviderConfig};

/// HTTP transport for an OpenAI-compatible endpoint.
///
/// Holds no timeout of its own: the executor bounds every attempt.
pub struct HttpTransport {
    client: Client,
    api_key: String,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "api_endpoint".to_string(),
                value: config.api_endpoint.clone(),
                reason: format!("failed to build HTTP client: {}", e),
            })?;
        Ok(Self::with_client(client, config))
    }

    /// Reuse an existing connection pool.
    pub fn with_client(client: Client, config: &ProviderConfig) -> Self {
        Self {
            client,
            api_key: config.api_key.clone(),
            endpoint: config.api_endpoint.clone(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn send(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<TransportResponse, TransportFailure> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportFailure {
    if err.is_timeout() {
        TransportFailure::Timeout
    } else {
        TransportFailure::Network(err.to_string())
    }
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}
