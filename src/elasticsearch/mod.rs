//! Elasticsearch access
//!
//! - [`ElasticSearch`]: the operations the gateway and reindexer use, behind a
//!   trait so handlers and the pipeline can run against an in-memory fake
//! - [`HttpEsClient`]: reqwest implementation over one shared connection pool
//! - [`RequestSigner`]: per-request transform, identity or AWS SigV4
//! - [`BulkIndexer`]: batching writer with per-item callbacks

pub mod bulk;
pub mod client;
pub mod error;
pub mod signer;

pub use bulk::{BulkAction, BulkIndexer, BulkStats};
pub use client::{alias_actions, frame_pairs, parse_alias_map, AliasMap, ElasticSearch, HttpEsClient};
pub use error::{EsError, EsResult};
pub use signer::{AwsSigV4Signer, NoopSigner, RequestSigner};

use chrono::Utc;

/// Settings and mappings every new physical index is created with
pub const INDEX_SETTINGS: &str = include_str!("../../assets/search-index-settings.json");

/// Prefix shared by the alias and every physical index
pub const INDEX_PREFIX: &str = "ons";

/// Fresh physical index name: the prefix followed by microseconds since the epoch
pub fn new_index_name() -> String {
    format!("{}{}", INDEX_PREFIX, Utc::now().timestamp_micros())
}
