//! CMS (zebedee) client: the published-URI listing and page bodies

use super::error::UpstreamClientError;
use super::upstream::UpstreamHttp;
use crate::config::UpstreamConfig;
use crate::error::Upstream;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

/// Source of published CMS pages
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Every URI currently published
    async fn published_uris(&self) -> Result<Vec<String>, UpstreamClientError>;

    /// Raw JSON body of one published page
    async fn published_data(&self, uri: &str) -> Result<Vec<u8>, UpstreamClientError>;
}

#[derive(Debug, Deserialize)]
struct PublishedIndex {
    #[serde(default)]
    items: Vec<PublishedIndexItem>,
}

#[derive(Debug, Deserialize)]
struct PublishedIndexItem {
    uri: String,
}

/// HTTP client for the CMS publishing endpoints
#[derive(Clone)]
pub struct ZebedeeClient {
    http: UpstreamHttp,
}

impl ZebedeeClient {
    pub fn new(base_url: &str, auth_token: &str, timeout: Duration) -> Result<Self, UpstreamClientError> {
        Ok(Self {
            http: UpstreamHttp::new(Upstream::Cms, base_url, auth_token, timeout)?,
        })
    }

    pub fn from_config(config: &UpstreamConfig) -> Result<Self, UpstreamClientError> {
        Self::new(
            &config.zebedee_url,
            &config.service_auth_token,
            Duration::from_secs(config.timeout_secs),
        )
    }
}

#[async_trait]
impl ContentSource for ZebedeeClient {
    async fn published_uris(&self) -> Result<Vec<String>, UpstreamClientError> {
        let index: PublishedIndex = self.http.get_json("/publishedindex").await?;
        Ok(index.items.into_iter().map(|item| item.uri).collect())
    }

    async fn published_data(&self, uri: &str) -> Result<Vec<u8>, UpstreamClientError> {
        self.http
            .get(&format!("/publisheddata?uri={}", urlencoding::encode(uri)))
            .await
    }
}
