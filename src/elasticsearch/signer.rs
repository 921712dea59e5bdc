//! Outbound request signing
//!
//! Every request leaving [`HttpEsClient`](super::HttpEsClient) passes through
//! a [`RequestSigner`]. Unsigned clusters use [`NoopSigner`]; clusters behind
//! the cloud provider's IAM scheme use [`AwsSigV4Signer`].

use super::error::{EsError, EsResult};
use crate::config::SignerConfig;
use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{
    sign, SignableBody, SignableRequest, SigningParams, SigningSettings,
};
use aws_sigv4::sign::v4;
use aws_smithy_runtime_api::client::identity::Identity;
use reqwest::header::{HeaderName, HeaderValue};
use std::sync::Arc;
use std::time::SystemTime;

/// Transform applied to each outbound request before it is sent
#[async_trait]
pub trait RequestSigner: Send + Sync {
    async fn sign(&self, request: &mut reqwest::Request) -> EsResult<()>;
}

/// Identity transform for unsigned clusters
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSigner;

#[async_trait]
impl RequestSigner for NoopSigner {
    async fn sign(&self, _request: &mut reqwest::Request) -> EsResult<()> {
        Ok(())
    }
}

/// SigV4 signer backed by the default credential chain
#[derive(Debug, Clone)]
pub struct AwsSigV4Signer {
    credentials: SharedCredentialsProvider,
    region: String,
    service: String,
}

impl AwsSigV4Signer {
    /// Resolve credentials from the environment, profile or instance role
    pub async fn from_config(config: &SignerConfig) -> EsResult<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));
        if let Some(profile) = &config.profile {
            loader = loader.profile_name(profile);
        }
        let sdk_config = loader.load().await;

        let credentials = sdk_config.credentials_provider().ok_or_else(|| {
            EsError::Configuration("no AWS credentials provider available".to_string())
        })?;

        tracing::info!(
            region = %config.region,
            service = %config.service,
            "Signing Elasticsearch requests with SigV4"
        );

        Ok(Self {
            credentials,
            region: config.region.clone(),
            service: config.service.clone(),
        })
    }
}

#[async_trait]
impl RequestSigner for AwsSigV4Signer {
    async fn sign(&self, request: &mut reqwest::Request) -> EsResult<()> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| EsError::Signing(e.to_string()))?;
        let identity: Identity = credentials.into();

        let params: SigningParams<'_> = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(&self.service)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| EsError::Signing(e.to_string()))?
            .into();

        let body = request
            .body()
            .and_then(|b| b.as_bytes())
            .unwrap_or_default();
        let headers: Vec<(&str, &str)> = request
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str(), v)))
            .collect();

        let signable = SignableRequest::new(
            request.method().as_str(),
            request.url().as_str(),
            headers.into_iter(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| EsError::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| EsError::Signing(e.to_string()))?
            .into_parts();

        let signed: Vec<(HeaderName, HeaderValue)> = instructions
            .headers()
            .map(|(name, value)| {
                let name = HeaderName::from_bytes(name.as_bytes())
                    .map_err(|e| EsError::Signing(e.to_string()))?;
                let value =
                    HeaderValue::from_str(value).map_err(|e| EsError::Signing(e.to_string()))?;
                Ok((name, value))
            })
            .collect::<EsResult<_>>()?;

        for (name, value) in signed {
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }
}

/// Build the signer the configuration asks for
pub async fn from_config(config: &SignerConfig) -> EsResult<Arc<dyn RequestSigner>> {
    if config.enabled {
        Ok(Arc::new(AwsSigV4Signer::from_config(config).await?))
    } else {
        Ok(Arc::new(NoopSigner))
    }
}
