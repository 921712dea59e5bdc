//! End-to-end reindex against a stub CMS and an in-memory cluster

mod common;

use async_trait::async_trait;
use common::FakeEs;
use dp_search_api::config::{BulkConfig, ReindexConfig};
use dp_search_api::elasticsearch::ElasticSearch;
use dp_search_api::reindex::{
    datasets::{DatasetPage, DatasetSummary, Edition},
    DatasetSource, ReindexError, Reindexer, UpstreamClientError, VersionMetadata, ZebedeeClient,
};
use mockito::Matcher;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn small_config() -> (ReindexConfig, BulkConfig) {
    let reindex = ReindexConfig {
        extractors: 2,
        indexers: 3,
        channel_capacity: 1,
        ..Default::default()
    };
    let bulk = BulkConfig {
        flush_items: 10,
        flush_interval_ms: 20,
        queue_size: 4,
    };
    (reindex, bulk)
}

async fn stub_cms(server: &mut mockito::ServerGuard) {
    server
        .mock("GET", "/publishedindex")
        .with_body(r#"{"count":2,"items":[{"uri":"/good"},{"uri":"/bad"}]}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/publisheddata")
        .match_query(Matcher::UrlEncoded("uri".into(), "/good".into()))
        .with_body(r#"{"type":"bulletin","uri":"/good","description":{"title":"Good page"}}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/publisheddata")
        .match_query(Matcher::UrlEncoded("uri".into(), "/bad".into()))
        .with_status(500)
        .create_async()
        .await;
}

#[tokio::test]
async fn test_reindex_counts_and_flips_alias() {
    let mut server = mockito::Server::new_async().await;
    stub_cms(&mut server).await;

    let es = Arc::new(FakeEs::with_indices(&[("ons1", Some("ons")), ("ons2", None)]));
    let cms = Arc::new(ZebedeeClient::new(&server.url(), "", Duration::from_secs(5)).unwrap());
    let (reindex, bulk) = small_config();

    let summary = Reindexer::new(es.clone(), cms, reindex, bulk)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.to_string(), "Indexed: 1, Failed: 1");

    let calls = es.alias_calls.lock().unwrap().clone();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, "ons");
    assert_eq!(calls[0].1, vec!["ons*".to_string()]);
    assert_eq!(calls[0].2, vec![summary.index.clone()]);

    let aliases = es.get_alias().await.unwrap();
    let aliased: Vec<&String> = aliases
        .iter()
        .filter(|(_, set)| set.contains("ons"))
        .map(|(index, _)| index)
        .collect();
    assert_eq!(aliased, vec![&summary.index]);
    assert_eq!(aliases.len(), 1);

    let mut deleted = summary.deleted.clone();
    deleted.sort();
    assert_eq!(deleted, vec!["ons1", "ons2"]);

    let docs = es.bulk_documents.lock().unwrap().clone();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].contains("\"title\":\"Good page\""));
}

#[tokio::test]
async fn test_listing_failure_is_fatal() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/publishedindex")
        .with_status(503)
        .create_async()
        .await;

    let es = Arc::new(FakeEs::with_indices(&[("ons1", Some("ons"))]));
    let cms = Arc::new(ZebedeeClient::new(&server.url(), "", Duration::from_secs(5)).unwrap());
    let (reindex, bulk) = small_config();

    let err = Reindexer::new(es.clone(), cms, reindex, bulk)
        .run(CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ReindexError::Listing(_)));
    assert!(es.alias_calls.lock().unwrap().is_empty());
    assert!(es.indices.lock().unwrap()["ons1"].contains("ons"));
}

#[tokio::test]
async fn test_cancelled_run_keeps_alias() {
    let mut server = mockito::Server::new_async().await;
    stub_cms(&mut server).await;

    let es = Arc::new(FakeEs::with_indices(&[("ons1", Some("ons"))]));
    let cms = Arc::new(ZebedeeClient::new(&server.url(), "", Duration::from_secs(5)).unwrap());
    let (reindex, bulk) = small_config();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Reindexer::new(es.clone(), cms, reindex, bulk)
        .run(cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, ReindexError::Cancelled));
    assert!(es.alias_calls.lock().unwrap().is_empty());
}

/// One dataset with one edition
struct OneDataset;

#[async_trait]
impl DatasetSource for OneDataset {
    async fn datasets(&self, offset: usize, _limit: usize) -> Result<DatasetPage, UpstreamClientError> {
        let items = if offset == 0 {
            vec![DatasetSummary { id: "TS009".into() }]
        } else {
            vec![]
        };
        Ok(DatasetPage {
            items,
            total_count: 1,
        })
    }

    async fn editions(&self, _dataset_id: &str) -> Result<Vec<Edition>, UpstreamClientError> {
        Ok(vec![serde_json::from_str(
            r#"{"edition":"2021","links":{"latest_version":{"id":"1"}}}"#,
        )
        .unwrap()])
    }

    async fn version_metadata(
        &self,
        _dataset_id: &str,
        _edition: &str,
        _version: &str,
    ) -> Result<VersionMetadata, UpstreamClientError> {
        Ok(serde_json::from_str(
            r#"{"title":"Age","is_based_on":{"@type":"cantabular_flexible_table","@id":"UR"}}"#,
        )
        .unwrap())
    }
}

#[tokio::test]
async fn test_datasets_indexed_alongside_cms() {
    let mut server = mockito::Server::new_async().await;
    stub_cms(&mut server).await;

    let es = Arc::new(FakeEs::default());
    let cms = Arc::new(ZebedeeClient::new(&server.url(), "", Duration::from_secs(5)).unwrap());
    let (reindex, bulk) = small_config();

    let summary = Reindexer::new(es.clone(), cms, reindex, bulk)
        .with_datasets(Arc::new(OneDataset))
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.indexed, 2);
    assert_eq!(summary.failed, 1);

    let docs = es.bulk_documents.lock().unwrap().clone();
    assert!(docs
        .iter()
        .any(|d| d.contains("cantabular_flexible_table") && d.contains("All usual residents")));
}
