//! Error types for response transformation

/// Errors raised while shaping a raw cluster response
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    /// Response bytes were not the expected envelope
    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Multi-search envelope held no responses
    #[error("Response contained no sub-query responses")]
    EmptyResponses,

    /// A sub-query the response is built from failed at the cluster
    #[error("Sub-query {name} failed: {reason}")]
    SubQueryFailed { name: String, reason: String },

    /// A hit's `_source` could not be read as a document
    #[error("Unreadable document at hit {position}: {source}")]
    Document {
        position: usize,
        #[source]
        source: serde_json::Error,
    },
}
