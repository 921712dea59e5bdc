use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Elasticsearch cluster configuration
    #[serde(default)]
    pub elasticsearch: ElasticsearchConfig,

    /// Upstream catalogue services
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Reindex pipeline sizing
    #[serde(default)]
    pub reindex: ReindexConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the embedded defaults, an optional file and the environment
    pub fn load() -> Result<Self, config::ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config/local.toml".to_string());

        config::Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config::File::with_name(&config_path).required(false))
            // Override with environment variables (prefix: DP_SEARCH)
            .add_source(
                config::Environment::with_prefix("DP_SEARCH")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP API binds to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// How long in-flight requests get to finish on shutdown (seconds)
    #[serde(default = "default_graceful_shutdown_timeout")]
    pub graceful_shutdown_timeout_secs: u64,

    /// Interval between background cluster probes (seconds)
    #[serde(default = "default_healthcheck_interval")]
    pub healthcheck_interval_secs: u64,

    /// Degraded duration after which the monitor reports critical (seconds)
    #[serde(default = "default_healthcheck_critical_timeout")]
    pub healthcheck_critical_timeout_secs: u64,

    /// Outbound request timeout (seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn graceful_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.graceful_shutdown_timeout_secs)
    }

    pub fn healthcheck_interval(&self) -> Duration {
        Duration::from_secs(self.healthcheck_interval_secs)
    }

    pub fn healthcheck_critical_timeout(&self) -> Duration {
        Duration::from_secs(self.healthcheck_critical_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            graceful_shutdown_timeout_secs: default_graceful_shutdown_timeout(),
            healthcheck_interval_secs: default_healthcheck_interval(),
            healthcheck_critical_timeout_secs: default_healthcheck_critical_timeout(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElasticsearchConfig {
    /// Base URL of the cluster
    #[serde(default = "default_es_url")]
    pub url: String,

    /// Request signing for managed clusters
    #[serde(default)]
    pub signer: SignerConfig,

    /// Bulk indexer batching
    #[serde(default)]
    pub bulk: BulkConfig,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        Self {
            url: default_es_url(),
            signer: SignerConfig::default(),
            bulk: BulkConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Re-sign every outbound request with AWS SigV4
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_aws_region")]
    pub region: String,

    #[serde(default = "default_aws_service")]
    pub service: String,

    /// Named credentials profile; the default chain is used when absent
    pub profile: Option<String>,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            region: default_aws_region(),
            service: default_aws_service(),
            profile: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Items accumulated before a flush
    #[serde(default = "default_flush_items")]
    pub flush_items: usize,

    /// Maximum age of a partial batch (milliseconds)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,

    /// Capacity of the add queue
    #[serde(default = "default_bulk_queue_size")]
    pub queue_size: usize,
}

impl BulkConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            flush_items: default_flush_items(),
            flush_interval_ms: default_flush_interval_ms(),
            queue_size: default_bulk_queue_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// CMS publishing index
    #[serde(default = "default_zebedee_url")]
    pub zebedee_url: String,

    /// Datasets catalogue
    #[serde(default = "default_dataset_api_url")]
    pub dataset_api_url: String,

    /// Service-to-service token, also guards the admin routes
    #[serde(default)]
    pub service_auth_token: String,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            zebedee_url: default_zebedee_url(),
            dataset_api_url: default_dataset_api_url(),
            service_auth_token: String::new(),
            timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexConfig {
    /// Document extractor workers
    #[serde(default = "default_extractors")]
    pub extractors: usize,

    /// Bulk indexer workers
    #[serde(default = "default_indexers")]
    pub indexers: usize,

    /// Capacity of each stage channel
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Page size when listing the datasets catalogue
    #[serde(default = "default_dataset_page_size")]
    pub dataset_page_size: usize,

    /// Run the dataset subflow alongside the CMS pipeline
    #[serde(default = "default_true")]
    pub include_datasets: bool,
}

impl Default for ReindexConfig {
    fn default() -> Self {
        Self {
            extractors: default_extractors(),
            indexers: default_indexers(),
            channel_capacity: default_channel_capacity(),
            dataset_page_size: default_dataset_page_size(),
            include_datasets: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,

    /// Enable Prometheus metrics
    #[serde(default = "default_true")]
    pub prometheus_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            prometheus_enabled: true,
        }
    }
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:23900".to_string()
}

fn default_graceful_shutdown_timeout() -> u64 {
    5
}

fn default_healthcheck_interval() -> u64 {
    30
}

fn default_healthcheck_critical_timeout() -> u64 {
    90
}

fn default_request_timeout() -> u64 {
    30
}

fn default_es_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_aws_region() -> String {
    "eu-west-2".to_string()
}

fn default_aws_service() -> String {
    "es".to_string()
}

fn default_flush_items() -> usize {
    500
}

fn default_flush_interval_ms() -> u64 {
    1000
}

fn default_bulk_queue_size() -> usize {
    1000
}

fn default_zebedee_url() -> String {
    "http://localhost:8082".to_string()
}

fn default_dataset_api_url() -> String {
    "http://localhost:22000".to_string()
}

fn default_extractors() -> usize {
    20
}

fn default_indexers() -> usize {
    30
}

fn default_channel_capacity() -> usize {
    10
}

fn default_dataset_page_size() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}
