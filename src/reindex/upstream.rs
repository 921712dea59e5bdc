//! Shared HTTP plumbing for the catalogue clients

use super::error::UpstreamClientError;
use crate::error::Upstream;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Authenticated GETs against one upstream service
#[derive(Clone)]
pub(crate) struct UpstreamHttp {
    client: Client,
    base_url: String,
    auth_token: String,
    upstream: Upstream,
}

impl UpstreamHttp {
    pub(crate) fn new(
        upstream: Upstream,
        base_url: &str,
        auth_token: &str,
        timeout: Duration,
    ) -> Result<Self, UpstreamClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UpstreamClientError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token: auth_token.to_string(),
            upstream,
        })
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Vec<u8>, UpstreamClientError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.get(&url);
        if !self.auth_token.is_empty() {
            request = request.bearer_auth(&self.auth_token);
        }

        let response = request
            .send()
            .await
            .map_err(|source| UpstreamClientError::Http {
                upstream: self.upstream,
                url: url.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(UpstreamClientError::Status {
                upstream: self.upstream,
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| UpstreamClientError::Http {
                upstream: self.upstream,
                url: url.clone(),
                source,
            })?;

        debug!(upstream = %self.upstream, url = %url, bytes = bytes.len(), "Upstream request completed");
        Ok(bytes.to_vec())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamClientError> {
        let bytes = self.get(path).await?;
        serde_json::from_slice(&bytes).map_err(|source| UpstreamClientError::Decode {
            upstream: self.upstream,
            url: format!("{}{}", self.base_url, path),
            source,
        })
    }
}
