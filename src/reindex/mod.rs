//! Full reindex: build a fresh physical index from the CMS and the datasets
//! catalogue, then move the `ons` alias onto it and drop the old indices.

pub mod alias;
pub mod cms;
pub mod datasets;
pub mod error;
pub mod pipeline;
pub mod population_types;
pub mod transform;
mod upstream;

pub use alias::{flip_alias, unaliased_indices};
pub use cms::{ContentSource, ZebedeeClient};
pub use datasets::{DatasetApiClient, DatasetSource, VersionMetadata};
pub use error::{ReindexError, UpstreamClientError};
pub use pipeline::{run_pipeline, PipelineOutcome};

use crate::config::{BulkConfig, ReindexConfig};
use crate::elasticsearch::{new_index_name, ElasticSearch, INDEX_SETTINGS};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReindexSummary {
    pub index: String,
    pub indexed: u64,
    pub failed: u64,
    pub deleted: Vec<String>,
}

impl fmt::Display for ReindexSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Indexed: {}, Failed: {}", self.indexed, self.failed)
    }
}

/// Drives one reindex run end to end
pub struct Reindexer {
    es: Arc<dyn ElasticSearch>,
    cms: Arc<dyn ContentSource>,
    datasets: Option<Arc<dyn DatasetSource>>,
    config: ReindexConfig,
    bulk: BulkConfig,
}

impl Reindexer {
    pub fn new(
        es: Arc<dyn ElasticSearch>,
        cms: Arc<dyn ContentSource>,
        config: ReindexConfig,
        bulk: BulkConfig,
    ) -> Self {
        Self {
            es,
            cms,
            datasets: None,
            config,
            bulk,
        }
    }

    /// Also index the datasets catalogue
    pub fn with_datasets(mut self, datasets: Arc<dyn DatasetSource>) -> Self {
        self.datasets = Some(datasets);
        self
    }

    /// Create a new index, fill it, and cut the alias over.
    ///
    /// A cancelled run stops before the alias moves; its half-built index
    /// is collected by the next successful run.
    #[instrument(skip_all)]
    pub async fn run(&self, cancel: CancellationToken) -> Result<ReindexSummary, ReindexError> {
        let index = new_index_name();
        self.es
            .create_index(&index, INDEX_SETTINGS.as_bytes())
            .await
            .map_err(|source| ReindexError::CreateIndex {
                index: index.clone(),
                source,
            })?;
        info!(index = %index, "Created index");

        let outcome = run_pipeline(
            self.cms.clone(),
            self.datasets.clone(),
            self.es.clone(),
            &index,
            &self.config,
            &self.bulk,
            cancel.clone(),
        )
        .await?;

        if cancel.is_cancelled() {
            return Err(ReindexError::Cancelled);
        }

        let deleted = flip_alias(self.es.as_ref(), &index).await?;
        let summary = ReindexSummary {
            index,
            indexed: outcome.indexed,
            failed: outcome.failed,
            deleted,
        };
        info!(index = %summary.index, indexed = summary.indexed, failed = summary.failed, "{}", summary);
        Ok(summary)
    }
}
