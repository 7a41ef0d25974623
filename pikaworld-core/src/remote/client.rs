//! HTTP client for the remote document service.
//!
//! Endpoints (all under the configured server URL):
//!
//! - `GET /health`: connectivity probe (no auth)
//! - `PUT /v1/collections/{collection}/{id}`: merge upsert
//! - `DELETE /v1/collections/{collection}/{id}`
//! - `GET /v1/collections/{collection}?owner={id}`

use std::time::Duration;

use super::error::RemoteError;
use super::protocol::{Document, ErrorResponse, HealthResponse};
use super::RemoteStore;
use crate::identity::IdentityProvider;

/// Remote document store reached over HTTP with the identity's bearer token.
#[derive(Debug)]
pub struct HttpRemoteStore<I> {
    client: reqwest::Client,
    server_url: String,
    identity: I,
}

impl<I: IdentityProvider> HttpRemoteStore<I> {
    /// Creates a client for `server_url` with a per-request timeout.
    pub fn new(
        server_url: impl Into<String>,
        identity: I,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let server_url = server_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            server_url,
            identity,
        })
    }

    /// Returns the server URL.
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/v1/collections/{}/{}", self.server_url, collection, id)
    }

    fn token(&self) -> Result<String, RemoteError> {
        self.identity
            .access_token()
            .ok_or(RemoteError::Unauthenticated)
    }
}

impl<I: IdentityProvider> RemoteStore for HttpRemoteStore<I> {
    async fn probe_connectivity(&self) -> bool {
        let url = format!("{}/health", self.server_url);

        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<HealthResponse>().await {
                    Ok(health) => {
                        tracing::debug!("Server {} is {} ({})", url, health.status, health.version);
                        true
                    }
                    Err(e) => {
                        tracing::debug!("Unexpected health response from {}: {}", url, e);
                        false
                    }
                }
            }
            Ok(response) => {
                tracing::debug!("Health check returned {}", response.status());
                false
            }
            Err(e) => {
                tracing::debug!("Health check failed: {}", e);
                false
            }
        }
    }

    async fn upsert(
        &self,
        collection: &str,
        id: &str,
        payload: &Document,
    ) -> Result<Document, RemoteError> {
        let response = self
            .client
            .put(self.document_url(collection, id))
            .bearer_auth(self.token()?)
            .json(payload)
            .send()
            .await?;

        Ok(check_response(response).await?.json().await?)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.document_url(collection, id))
            .bearer_auth(self.token()?)
            .send()
            .await?;

        check_response(response).await?;
        Ok(())
    }

    async fn query_by_owner(
        &self,
        collection: &str,
        owner_id: &str,
    ) -> Result<Vec<Document>, RemoteError> {
        let response = self
            .client
            .get(format!("{}/v1/collections/{}", self.server_url, collection))
            .query(&[("owner", owner_id)])
            .bearer_auth(self.token()?)
            .send()
            .await?;

        Ok(check_response(response).await?.json().await?)
    }
}

/// Maps a non-2xx response to [`RemoteError::Server`].
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = match response.json::<ErrorResponse>().await {
        Ok(body) => body.message,
        Err(_) => status.canonical_reason().unwrap_or("unknown error").to_string(),
    };

    Err(RemoteError::Server {
        status: status.as_u16(),
        message,
    })
}
