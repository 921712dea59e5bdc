//! Error types for the reindex pipeline and its upstream clients

use crate::elasticsearch::EsError;
use crate::error::Upstream;

/// Failure talking to the CMS or the datasets catalogue
#[derive(Debug, thiserror::Error)]
pub enum UpstreamClientError {
    #[error("{upstream} request to {url} failed: {source}")]
    Http {
        upstream: Upstream,
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{upstream} returned status {status} for {url}")]
    Status {
        upstream: Upstream,
        url: String,
        status: u16,
    },

    #[error("{upstream} response from {url} was unreadable: {source}")]
    Decode {
        upstream: Upstream,
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to create HTTP client: {0}")]
    Configuration(String),
}

impl UpstreamClientError {
    pub fn upstream(&self) -> Option<Upstream> {
        match self {
            UpstreamClientError::Http { upstream, .. }
            | UpstreamClientError::Status { upstream, .. }
            | UpstreamClientError::Decode { upstream, .. } => Some(*upstream),
            UpstreamClientError::Configuration(_) => None,
        }
    }
}

/// Errors that abort a reindex run
#[derive(Debug, thiserror::Error)]
pub enum ReindexError {
    /// The published-URI listing could not be fetched
    #[error("Failed to list published documents: {0}")]
    Listing(#[source] UpstreamClientError),

    #[error("Failed to create index {index}: {source}")]
    CreateIndex {
        index: String,
        #[source]
        source: EsError,
    },

    #[error("Failed to move alias to {index}: {source}")]
    AliasFlip {
        index: String,
        #[source]
        source: EsError,
    },

    #[error("Reindex cancelled before the alias was moved")]
    Cancelled,
}
