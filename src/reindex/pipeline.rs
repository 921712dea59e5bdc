//! Staged document pipeline
//!
//! ```text
//! producer ─▶ [uris] ─▶ extractors (N) ─▶ [extracted] ─▶ transformers ─▶ [transformed] ─▶ indexers (M)
//!                            │                                   ▲                          │
//!                            ▼                                   │                          ▼
//!                       [failures]                      dataset subflow              bulk callbacks ─▶ [indexed]
//! ```
//!
//! Every stage owns its output sender and drops it only after all of its
//! workers have returned, which closes the channel for the next stage.
//! Stage channels are bounded so a slow stage holds back the ones before
//! it. The outcome channels are unbounded because bulk callbacks cannot
//! wait.

use super::cms::ContentSource;
use super::datasets::DatasetSource;
use super::error::ReindexError;
use super::transform::{transform_document, TransformedDocument};
use crate::config::{BulkConfig, ReindexConfig};
use crate::elasticsearch::{BulkAction, BulkIndexer, BulkStats, ElasticSearch};
use crate::metrics::REINDEX_DOCUMENTS_TOTAL;
use crate::models::{document_id, Document};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

type SharedReceiver<T> = Arc<Mutex<mpsc::Receiver<T>>>;

/// Per-document outcome counts of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub indexed: u64,
    pub failed: u64,
    pub bulk: BulkStats,
}

/// Sending halves of the outcome channels
#[derive(Clone)]
struct Outcomes {
    failures: mpsc::UnboundedSender<String>,
    indexed: mpsc::UnboundedSender<bool>,
}

impl Outcomes {
    fn failed(&self, uri: impl Into<String>) {
        REINDEX_DOCUMENTS_TOTAL.with_label_values(&["failed"]).inc();
        let _ = self.failures.send(uri.into());
    }
}

/// Send unless the run is cancelled; false when the item was not delivered
async fn send_or_cancel<T>(tx: &mpsc::Sender<T>, item: T, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Next item from a receiver shared by a worker pool
async fn next_item<T>(rx: &SharedReceiver<T>, cancel: &CancellationToken) -> Option<T> {
    if cancel.is_cancelled() {
        return None;
    }
    let mut rx = rx.lock().await;
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        item = rx.recv() => item,
    }
}

async fn join_stage(stage: &'static str, mut workers: JoinSet<()>) {
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            error!(stage, error = %e, "Pipeline worker panicked");
        }
    }
    debug!(stage, "Pipeline stage drained");
}

/// Emit every published URI. A listing failure is fatal to the run.
async fn produce_uris(
    cms: Arc<dyn ContentSource>,
    tx: mpsc::Sender<String>,
    cancel: CancellationToken,
) -> Result<usize, ReindexError> {
    let uris = cms.published_uris().await.map_err(ReindexError::Listing)?;
    info!(count = uris.len(), "Fetched published URI listing");

    let mut sent = 0;
    for uri in uris {
        if !send_or_cancel(&tx, uri, &cancel).await {
            break;
        }
        sent += 1;
    }
    Ok(sent)
}

async fn extract_stage(
    cms: Arc<dyn ContentSource>,
    workers: usize,
    uris: mpsc::Receiver<String>,
    tx: mpsc::Sender<Document>,
    outcomes: Outcomes,
    cancel: CancellationToken,
) {
    let uris: SharedReceiver<String> = Arc::new(Mutex::new(uris));
    let mut pool = JoinSet::new();

    for _ in 0..workers.max(1) {
        let (cms, uris, tx, outcomes, cancel) = (
            cms.clone(),
            uris.clone(),
            tx.clone(),
            outcomes.clone(),
            cancel.clone(),
        );
        pool.spawn(async move {
            while let Some(uri) = next_item(&uris, &cancel).await {
                match cms.published_data(&uri).await {
                    Ok(body) => {
                        if !send_or_cancel(&tx, Document::new(uri, body), &cancel).await {
                            return;
                        }
                    }
                    Err(e) => {
                        warn!(uri = %uri, error = %e, "Failed to extract document");
                        outcomes.failed(uri);
                    }
                }
            }
        });
    }

    join_stage("extract", pool).await;
}

/// One task per extracted document, joined before the output closes
async fn transform_stage(
    mut extracted: mpsc::Receiver<Document>,
    tx: mpsc::Sender<TransformedDocument>,
    outcomes: Outcomes,
    cancel: CancellationToken,
) {
    let mut tasks = JoinSet::new();

    while let Some(doc) = extracted.recv().await {
        if cancel.is_cancelled() {
            break;
        }
        let (tx, outcomes, cancel) = (tx.clone(), outcomes.clone(), cancel.clone());
        tasks.spawn(async move {
            match transform_document(&doc) {
                Ok(transformed) => {
                    send_or_cancel(&tx, transformed, &cancel).await;
                }
                Err(e) => {
                    warn!(uri = %doc.uri, error = %e, "Failed to transform document");
                    outcomes.failed(doc.uri);
                }
            }
        });
    }

    join_stage("transform", tasks).await;
}

/// Walk the datasets catalogue and feed documents straight to the indexers
async fn dataset_stage(
    datasets: Arc<dyn DatasetSource>,
    page_size: usize,
    tx: mpsc::Sender<TransformedDocument>,
    outcomes: Outcomes,
    cancel: CancellationToken,
) {
    let page_size = page_size.max(1);
    let mut offset = 0;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        let page = match datasets.datasets(offset, page_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!(offset, error = %e, "Failed to list datasets");
                return;
            }
        };

        for dataset in &page.items {
            let editions = match datasets.editions(&dataset.id).await {
                Ok(editions) => editions,
                Err(e) => {
                    warn!(dataset = %dataset.id, error = %e, "Failed to list editions");
                    outcomes.failed(format!("/datasets/{}", dataset.id));
                    continue;
                }
            };

            for edition in editions {
                let version = edition.links.latest_version.id.as_str();
                let metadata = match datasets
                    .version_metadata(&dataset.id, &edition.edition, version)
                    .await
                {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(dataset = %dataset.id, edition = %edition.edition, error = %e, "Failed to fetch version metadata");
                        outcomes.failed(format!("/datasets/{}/editions/{}", dataset.id, edition.edition));
                        continue;
                    }
                };

                let doc = metadata.into_document(&dataset.id, &edition.edition, version);
                let transformed = match serde_json::to_string(&doc) {
                    Ok(body) => TransformedDocument {
                        id: document_id(&doc.uri),
                        body,
                    },
                    Err(e) => {
                        warn!(uri = %doc.uri, error = %e, "Failed to encode dataset document");
                        outcomes.failed(doc.uri);
                        continue;
                    }
                };
                if !send_or_cancel(&tx, transformed, &cancel).await {
                    return;
                }
            }
        }

        offset += page.items.len();
        if page.items.is_empty() || offset >= page.total_count {
            return;
        }
    }
}

async fn index_stage(
    bulk: Arc<BulkIndexer>,
    index: String,
    workers: usize,
    transformed: mpsc::Receiver<TransformedDocument>,
    outcomes: Outcomes,
    cancel: CancellationToken,
) {
    let transformed: SharedReceiver<TransformedDocument> = Arc::new(Mutex::new(transformed));
    let index: Arc<str> = Arc::from(index);
    let mut pool = JoinSet::new();

    for _ in 0..workers.max(1) {
        let (bulk, index, transformed, outcomes, cancel) = (
            bulk.clone(),
            index.clone(),
            transformed.clone(),
            outcomes.clone(),
            cancel.clone(),
        );
        pool.spawn(async move {
            while let Some(doc) = next_item(&transformed, &cancel).await {
                let on_success = {
                    let indexed = outcomes.indexed.clone();
                    move || {
                        REINDEX_DOCUMENTS_TOTAL.with_label_values(&["indexed"]).inc();
                        let _ = indexed.send(true);
                    }
                };
                let on_failure = {
                    let indexed = outcomes.indexed.clone();
                    let id = doc.id.clone();
                    move |reason: String| {
                        REINDEX_DOCUMENTS_TOTAL.with_label_values(&["failed"]).inc();
                        debug!(id = %id, reason = %reason, "Document rejected by bulk indexer");
                        let _ = indexed.send(false);
                    }
                };

                // a closed indexer has already fired on_failure
                if bulk
                    .add(BulkAction::Create, &index, &doc.id, doc.body, on_success, on_failure)
                    .await
                    .is_err()
                {
                    return;
                }
            }
        });
    }

    join_stage("index", pool).await;
}

/// Run every stage into `index` and count per-document outcomes.
///
/// Returns once the bulk indexer has been closed, so every callback has
/// fired. Only a failed URI listing is an error.
pub async fn run_pipeline(
    cms: Arc<dyn ContentSource>,
    datasets: Option<Arc<dyn DatasetSource>>,
    es: Arc<dyn ElasticSearch>,
    index: &str,
    config: &ReindexConfig,
    bulk_config: &BulkConfig,
    cancel: CancellationToken,
) -> Result<PipelineOutcome, ReindexError> {
    let capacity = config.channel_capacity.max(1);
    let (uri_tx, uri_rx) = mpsc::channel::<String>(capacity);
    let (extracted_tx, extracted_rx) = mpsc::channel::<Document>(capacity);
    let (transformed_tx, transformed_rx) = mpsc::channel::<TransformedDocument>(capacity);
    let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<String>();
    let (indexed_tx, mut indexed_rx) = mpsc::unbounded_channel::<bool>();
    let outcomes = Outcomes {
        failures: failures_tx,
        indexed: indexed_tx,
    };

    let bulk = Arc::new(BulkIndexer::new(es, bulk_config));

    let producer = tokio::spawn(produce_uris(cms.clone(), uri_tx, cancel.clone()));
    let extract = tokio::spawn(extract_stage(
        cms,
        config.extractors,
        uri_rx,
        extracted_tx,
        outcomes.clone(),
        cancel.clone(),
    ));
    let transform = tokio::spawn(transform_stage(
        extracted_rx,
        transformed_tx.clone(),
        outcomes.clone(),
        cancel.clone(),
    ));
    let dataset_flow = datasets.map(|datasets| {
        tokio::spawn(dataset_stage(
            datasets,
            config.dataset_page_size,
            transformed_tx.clone(),
            outcomes.clone(),
            cancel.clone(),
        ))
    });
    drop(transformed_tx);
    let indexers = tokio::spawn(index_stage(
        bulk.clone(),
        index.to_string(),
        config.indexers,
        transformed_rx,
        outcomes.clone(),
        cancel.clone(),
    ));
    drop(outcomes);

    let produced = match producer.await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "URI producer panicked");
            Ok(0)
        }
    };
    for (stage, handle) in [("extract", extract), ("transform", transform), ("index", indexers)] {
        if let Err(e) = handle.await {
            error!(stage, error = %e, "Pipeline stage panicked");
        }
    }
    if let Some(handle) = dataset_flow {
        if let Err(e) = handle.await {
            error!(error = %e, "Dataset subflow panicked");
        }
    }

    let bulk_stats = match Arc::try_unwrap(bulk) {
        Ok(bulk) => bulk.close().await,
        Err(_) => {
            error!("Bulk indexer still shared after the index stage drained");
            BulkStats::default()
        }
    };

    let mut outcome = PipelineOutcome {
        bulk: bulk_stats,
        ..Default::default()
    };
    while let Some(uri) = failures_rx.recv().await {
        debug!(uri = %uri, "Document failed");
        outcome.failed += 1;
    }
    while let Some(indexed) = indexed_rx.recv().await {
        if indexed {
            outcome.indexed += 1;
        } else {
            outcome.failed += 1;
        }
    }

    let produced = produced?;
    info!(
        uris = produced,
        indexed = outcome.indexed,
        failed = outcome.failed,
        flushes = outcome.bulk.flushes,
        "Pipeline drained"
    );
    Ok(outcome)
}
