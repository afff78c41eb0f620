//! HTTP transport used by the discovery cache.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use crate::{config::DiscoveryOptions, error::DiscoveryError};

/// Status and body of a completed GET request.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: Bytes,
}

impl FetchResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Issues GET requests on behalf of the cache.
///
/// Implementations report non-success statuses as a normal [`FetchResponse`];
/// only transport failures (DNS, TLS, timeouts, broken bodies) are errors.
#[async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, uri: &str) -> Result<FetchResponse, DiscoveryError>;
}

/// [`HttpFetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Wraps an existing client.
    #[must_use]
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Builds a client with the timeout and user agent from `options`.
    ///
    /// # Errors
    ///
    /// Returns [`DiscoveryError::Transport`] if the TLS backend cannot be initialised.
    pub fn from_options(options: &DiscoveryOptions) -> Result<Self, DiscoveryError> {
        let client = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .user_agent(options.user_agent.as_str())
            .build()
            .map_err(|e| DiscoveryError::Transport {
                uri: String::new(),
                message: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, uri: &str) -> Result<FetchResponse, DiscoveryError> {
        let transport = |e: reqwest::Error| DiscoveryError::Transport {
            uri: uri.to_string(),
            message: e.to_string(),
        };

        let response = self.client.get(uri).send().await.map_err(transport)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport)?;

        debug!(uri, status, bytes = body.len(), "GET completed");
        Ok(FetchResponse { status, body })
    }
}
