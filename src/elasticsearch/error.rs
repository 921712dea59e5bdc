//! Error types for Elasticsearch calls

/// Result type for Elasticsearch operations
pub type EsResult<T> = std::result::Result<T, EsError>;

/// Errors that can occur talking to the cluster
#[derive(Debug, thiserror::Error)]
pub enum EsError {
    /// Transport failure before a response arrived
    #[error("{operation} request failed: {source}")]
    Http {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Cluster answered with a non-success status
    #[error("{operation} returned status {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Response body did not have the expected shape
    #[error("{operation} returned an unreadable body: {source}")]
    Decode {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// Request signing failed
    #[error("Request signing failed: {0}")]
    Signing(String),

    /// Bulk indexer no longer accepts items
    #[error("Bulk indexer is closed")]
    BulkClosed,

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),
}

impl EsError {
    pub(crate) fn http(operation: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| EsError::Http { operation, source }
    }

    pub(crate) fn decode(operation: &'static str) -> impl FnOnce(serde_json::Error) -> Self {
        move |source| EsError::Decode { operation, source }
    }
}
