//! Client-side bulk indexer
//!
//! Items are queued on a bounded channel and drained by a single flusher
//! task, which posts a `_bulk` request whenever the batch reaches
//! `flush_items` or the flush interval elapses. Exactly one of an item's
//! callbacks fires once the batch holding it has been flushed.

use super::client::ElasticSearch;
use super::error::{EsError, EsResult};
use crate::config::BulkConfig;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use strum::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

/// Bulk operation applied to one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum BulkAction {
    Create,
    Index,
    Update,
}

type SuccessCallback = Box<dyn FnOnce() + Send>;
type FailureCallback = Box<dyn FnOnce(String) + Send>;

struct BulkItem {
    action: BulkAction,
    index: String,
    id: String,
    body: String,
    on_success: SuccessCallback,
    on_failure: FailureCallback,
}

/// Totals reported when the indexer is closed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkStats {
    pub added: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub flushes: u64,
}

/// Batches document writes into `_bulk` requests
pub struct BulkIndexer {
    sender: mpsc::Sender<BulkItem>,
    flusher: JoinHandle<BulkStats>,
}

impl BulkIndexer {
    /// Start the flusher task
    pub fn new(client: Arc<dyn ElasticSearch>, config: &BulkConfig) -> Self {
        let (sender, receiver) = mpsc::channel(config.queue_size.max(1));
        let flusher = tokio::spawn(run_flusher(
            client,
            receiver,
            config.flush_items.max(1),
            config.flush_interval(),
        ));
        Self { sender, flusher }
    }

    /// Queue one document; waits only while the queue is full
    pub async fn add<S, F>(
        &self,
        action: BulkAction,
        index: &str,
        id: &str,
        body: String,
        on_success: S,
        on_failure: F,
    ) -> EsResult<()>
    where
        S: FnOnce() + Send + 'static,
        F: FnOnce(String) + Send + 'static,
    {
        let item = BulkItem {
            action,
            index: index.to_string(),
            id: id.to_string(),
            body,
            on_success: Box::new(on_success),
            on_failure: Box::new(on_failure),
        };

        self.sender.send(item).await.map_err(|rejected| {
            (rejected.0.on_failure)("bulk indexer closed".to_string());
            EsError::BulkClosed
        })
    }

    /// Flush outstanding items and wait until every callback has fired
    pub async fn close(self) -> BulkStats {
        drop(self.sender);
        match self.flusher.await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Bulk flusher task failed");
                BulkStats::default()
            }
        }
    }
}

async fn run_flusher(
    client: Arc<dyn ElasticSearch>,
    mut receiver: mpsc::Receiver<BulkItem>,
    flush_items: usize,
    flush_interval: Duration,
) -> BulkStats {
    let mut stats = BulkStats::default();
    let mut batch: Vec<BulkItem> = Vec::with_capacity(flush_items);
    let mut ticker = tokio::time::interval(flush_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            item = receiver.recv() => match item {
                Some(item) => {
                    stats.added += 1;
                    batch.push(item);
                    if batch.len() >= flush_items {
                        flush(client.as_ref(), &mut batch, &mut stats).await;
                    }
                }
                None => break,
            },
            _ = ticker.tick() => {
                if !batch.is_empty() {
                    flush(client.as_ref(), &mut batch, &mut stats).await;
                }
            }
        }
    }

    if !batch.is_empty() {
        flush(client.as_ref(), &mut batch, &mut stats).await;
    }

    debug!(?stats, "Bulk indexer drained");
    stats
}

/// NDJSON body for a batch: an action line and a source line per item
fn encode_batch(batch: &[BulkItem]) -> String {
    let mut body = String::new();
    for item in batch {
        let mut meta = serde_json::Map::new();
        meta.insert(
            item.action.to_string(),
            json!({"_index": item.index, "_id": item.id}),
        );
        body.push_str(&serde_json::Value::Object(meta).to_string());
        body.push('\n');
        if item.action == BulkAction::Update {
            body.push_str("{\"doc\":");
            body.push_str(&item.body);
            body.push('}');
        } else {
            body.push_str(&item.body);
        }
        body.push('\n');
    }
    body
}

#[derive(Debug, Deserialize)]
struct BulkResponse {
    #[serde(default)]
    items: Vec<std::collections::HashMap<String, BulkItemResult>>,
}

#[derive(Debug, Deserialize)]
struct BulkItemResult {
    #[serde(default)]
    status: u16,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl BulkItemResult {
    fn failure(&self) -> Option<String> {
        match &self.error {
            Some(error) => Some(
                error
                    .get("reason")
                    .and_then(|r| r.as_str())
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            ),
            None if !(200..300).contains(&self.status) => {
                Some(format!("unexpected status {}", self.status))
            }
            None => None,
        }
    }
}

/// Post a batch and fire one callback per item
async fn flush(client: &dyn ElasticSearch, batch: &mut Vec<BulkItem>, stats: &mut BulkStats) {
    let items: Vec<BulkItem> = std::mem::take(batch);
    stats.flushes += 1;

    let outcome = match client.bulk(encode_batch(&items)).await {
        Ok(bytes) => serde_json::from_slice::<BulkResponse>(&bytes)
            .map_err(|e| format!("unreadable bulk response: {}", e)),
        Err(e) => Err(e.to_string()),
    };

    match outcome {
        Ok(response) => {
            let mut results = response.items.into_iter();
            for item in items {
                let failure = match results.next() {
                    Some(result) => result.into_values().next().and_then(|r| r.failure()),
                    None => Some("missing from bulk response".to_string()),
                };
                match failure {
                    None => {
                        stats.succeeded += 1;
                        (item.on_success)();
                    }
                    Some(reason) => {
                        stats.failed += 1;
                        warn!(index = %item.index, id = %item.id, reason = %reason, "Bulk item failed");
                        (item.on_failure)(reason);
                    }
                }
            }
        }
        Err(reason) => {
            error!(items = items.len(), reason = %reason, "Bulk request failed");
            for item in items {
                stats.failed += 1;
                (item.on_failure)(reason.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::elasticsearch::client::AliasMap;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Answers bulk calls, failing documents whose id starts with "bad"
    #[derive(Default)]
    struct FakeBulk {
        bodies: Mutex<Vec<String>>,
        reject_all: bool,
    }

    #[async_trait]
    impl ElasticSearch for FakeBulk {
        async fn search(&self, _: &str, _: &[String], _: &str) -> EsResult<Vec<u8>> {
            unimplemented!()
        }
        async fn multi_search(&self, _: &str, _: &[String], _: &str) -> EsResult<Vec<u8>> {
            unimplemented!()
        }
        async fn get_status(&self) -> EsResult<String> {
            unimplemented!()
        }
        async fn create_index(&self, _: &str, _: &[u8]) -> EsResult<()> {
            unimplemented!()
        }
        async fn bulk(&self, body: String) -> EsResult<Vec<u8>> {
            if self.reject_all {
                return Err(EsError::Status {
                    operation: "bulk",
                    status: 503,
                    body: "unavailable".into(),
                });
            }
            let items: Vec<serde_json::Value> = body
                .lines()
                .step_by(2)
                .map(|line| {
                    let meta: serde_json::Value = serde_json::from_str(line).unwrap();
                    let id = meta["create"]["_id"].as_str().unwrap_or_default().to_string();
                    if id.starts_with("bad") {
                        json!({"create": {"status": 409, "error": {"reason": "exists"}}})
                    } else {
                        json!({"create": {"status": 201}})
                    }
                })
                .collect();
            self.bodies.lock().unwrap().push(body);
            Ok(json!({"errors": false, "items": items}).to_string().into_bytes())
        }
        async fn update_aliases(&self, _: &str, _: &[String], _: &[String]) -> EsResult<()> {
            unimplemented!()
        }
        async fn get_alias(&self) -> EsResult<AliasMap> {
            unimplemented!()
        }
        async fn delete_indices(&self, _: &[String]) -> EsResult<()> {
            unimplemented!()
        }
    }

    fn config(flush_items: usize) -> BulkConfig {
        BulkConfig {
            flush_items,
            flush_interval_ms: 60_000,
            queue_size: 16,
        }
    }

    #[test]
    fn test_encode_batch() {
        let items = vec![
            BulkItem {
                action: BulkAction::Create,
                index: "ons1".into(),
                id: "%2Fa".into(),
                body: r#"{"uri":"/a"}"#.into(),
                on_success: Box::new(|| {}),
                on_failure: Box::new(|_| {}),
            },
            BulkItem {
                action: BulkAction::Update,
                index: "ons1".into(),
                id: "%2Fb".into(),
                body: r#"{"title":"B"}"#.into(),
                on_success: Box::new(|| {}),
                on_failure: Box::new(|_| {}),
            },
        ];
        let lines: Vec<serde_json::Value> = encode_batch(&items)
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines[0], json!({"create": {"_index": "ons1", "_id": "%2Fa"}}));
        assert_eq!(lines[1], json!({"uri": "/a"}));
        assert_eq!(lines[3], json!({"doc": {"title": "B"}}));
    }

    #[tokio::test]
    async fn test_exactly_one_callback_per_item() {
        let fake = Arc::new(FakeBulk::default());
        let indexer = BulkIndexer::new(fake.clone(), &config(2));
        let ok = Arc::new(AtomicUsize::new(0));
        let failed = Arc::new(AtomicUsize::new(0));

        for id in ["a", "bad-b", "c", "d", "bad-e"] {
            let ok = ok.clone();
            let failed = failed.clone();
            indexer
                .add(
                    BulkAction::Create,
                    "ons1",
                    id,
                    "{}".to_string(),
                    move || {
                        ok.fetch_add(1, Ordering::SeqCst);
                    },
                    move |_| {
                        failed.fetch_add(1, Ordering::SeqCst);
                    },
                )
                .await
                .unwrap();
        }

        let stats = indexer.close().await;
        assert_eq!(ok.load(Ordering::SeqCst), 3);
        assert_eq!(failed.load(Ordering::SeqCst), 2);
        assert_eq!(stats.added, 5);
        assert_eq!(stats.succeeded, 3);
        assert_eq!(stats.failed, 2);
        // two full batches plus the remainder on close
        assert_eq!(fake.bodies.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_request_fails_every_item() {
        let fake = Arc::new(FakeBulk {
            reject_all: true,
            ..Default::default()
        });
        let indexer = BulkIndexer::new(fake, &config(10));
        let failed = Arc::new(AtomicUsize::new(0));

        for id in ["a", "b"] {
            let failed = failed.clone();
            indexer
                .add(BulkAction::Create, "ons1", id, "{}".to_string(), || {}, move |reason| {
                    assert!(reason.contains("503"));
                    failed.fetch_add(1, Ordering::SeqCst);
                })
                .await
                .unwrap();
        }

        let stats = indexer.close().await;
        assert_eq!(failed.load(Ordering::SeqCst), 2);
        assert_eq!(stats.flushes, 1);
    }
}
