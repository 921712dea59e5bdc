use super::error::{EsError, EsResult};
use super::signer::RequestSigner;
use crate::metrics::EsTimer;
use crate::query::SearchPair;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::Deserialize;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Index name mapped to the aliases it currently holds
pub type AliasMap = HashMap<String, BTreeSet<String>>;

/// Operations the gateway and the reindexer need from the cluster
#[async_trait]
pub trait ElasticSearch: Send + Sync {
    /// Run one search; returns the raw response body
    async fn search(&self, index: &str, types: &[String], body: &str) -> EsResult<Vec<u8>>;

    /// Run a line-framed multi-search; returns the raw response body
    async fn multi_search(&self, index: &str, types: &[String], body: &str) -> EsResult<Vec<u8>>;

    /// Plain-text cluster health line from `_cat/health`
    async fn get_status(&self) -> EsResult<String>;

    async fn create_index(&self, name: &str, settings: &[u8]) -> EsResult<()>;

    /// Post an NDJSON `_bulk` body; returns the raw response body
    async fn bulk(&self, body: String) -> EsResult<Vec<u8>>;

    /// Atomically move `alias` off every `remove_from` index onto `add_to`
    async fn update_aliases(
        &self,
        alias: &str,
        remove_from: &[String],
        add_to: &[String],
    ) -> EsResult<()>;

    async fn get_alias(&self) -> EsResult<AliasMap>;

    async fn delete_indices(&self, names: &[String]) -> EsResult<()>;
}

/// Line-frame release pairs as a multi-search body
pub fn frame_pairs(pairs: &[SearchPair]) -> String {
    let mut body = String::new();
    for pair in pairs {
        body.push_str(&pair.header);
        body.push('\n');
        body.push_str(&pair.body);
        body.push('\n');
    }
    body
}

/// Build the path of a search endpoint, typed when types are given
fn search_path(index: &str, types: &[String], endpoint: &str) -> String {
    if types.is_empty() {
        format!("/{}/{}", index, endpoint)
    } else {
        format!("/{}/{}/{}", index, types.join(","), endpoint)
    }
}

/// reqwest-backed client; all requests pass through the configured signer
#[derive(Clone)]
pub struct HttpEsClient {
    client: Client,
    base_url: String,
    signer: Arc<dyn RequestSigner>,
}

impl HttpEsClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        signer: Arc<dyn RequestSigner>,
    ) -> EsResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EsError::Configuration(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// Sign, send and collect one request, failing on non-2xx statuses
    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        content_type: &str,
        body: Option<Vec<u8>>,
    ) -> EsResult<Vec<u8>> {
        let _timer = EsTimer::start(operation);
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self.client.request(method, &url);
        if let Some(body) = body {
            builder = builder.header("Content-Type", content_type).body(body);
        }
        let mut request = builder.build().map_err(EsError::http(operation))?;
        self.signer.sign(&mut request).await?;

        let response = self
            .client
            .execute(request)
            .await
            .map_err(EsError::http(operation))?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(EsError::http(operation))?;

        if !status.is_success() {
            return Err(EsError::Status {
                operation,
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        debug!(operation, url = %url, bytes = bytes.len(), "Elasticsearch request completed");
        Ok(bytes.to_vec())
    }

    async fn execute_json(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> EsResult<Vec<u8>> {
        self.execute(operation, method, path, "application/json", body)
            .await
    }
}

#[derive(Debug, Deserialize)]
struct IndexAliases {
    #[serde(default)]
    aliases: HashMap<String, serde_json::Value>,
}

#[async_trait]
impl ElasticSearch for HttpEsClient {
    async fn search(&self, index: &str, types: &[String], body: &str) -> EsResult<Vec<u8>> {
        let path = search_path(index, types, "_search");
        self.execute_json("search", Method::POST, &path, Some(body.as_bytes().to_vec()))
            .await
    }

    async fn multi_search(&self, index: &str, types: &[String], body: &str) -> EsResult<Vec<u8>> {
        let path = search_path(index, types, "_msearch");
        self.execute(
            "multi_search",
            Method::POST,
            &path,
            "application/x-ndjson",
            Some(body.as_bytes().to_vec()),
        )
        .await
    }

    async fn get_status(&self) -> EsResult<String> {
        let bytes = self
            .execute("get_status", Method::GET, "/_cat/health", "text/plain", None)
            .await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    async fn create_index(&self, name: &str, settings: &[u8]) -> EsResult<()> {
        self.execute_json(
            "create_index",
            Method::PUT,
            &format!("/{}", name),
            Some(settings.to_vec()),
        )
        .await?;
        info!(index = name, "Created index");
        Ok(())
    }

    async fn bulk(&self, body: String) -> EsResult<Vec<u8>> {
        self.execute(
            "bulk",
            Method::POST,
            "/_bulk",
            "application/x-ndjson",
            Some(body.into_bytes()),
        )
        .await
    }

    async fn update_aliases(
        &self,
        alias: &str,
        remove_from: &[String],
        add_to: &[String],
    ) -> EsResult<()> {
        let body = alias_actions(alias, remove_from, add_to);
        self.execute_json(
            "update_aliases",
            Method::POST,
            "/_aliases",
            Some(body.to_string().into_bytes()),
        )
        .await?;
        info!(alias, ?remove_from, ?add_to, "Updated aliases");
        Ok(())
    }

    async fn get_alias(&self) -> EsResult<AliasMap> {
        let bytes = self
            .execute_json("get_alias", Method::GET, "/_alias", None)
            .await?;
        parse_alias_map(&bytes)
    }

    async fn delete_indices(&self, names: &[String]) -> EsResult<()> {
        if names.is_empty() {
            return Ok(());
        }
        self.execute_json(
            "delete_indices",
            Method::DELETE,
            &format!("/{}", names.join(",")),
            None,
        )
        .await?;
        info!(indices = ?names, "Deleted indices");
        Ok(())
    }
}

/// Body of an `_aliases` call; a single request so the cluster applies it atomically
pub fn alias_actions(alias: &str, remove_from: &[String], add_to: &[String]) -> serde_json::Value {
    let removes = remove_from
        .iter()
        .map(|index| json!({"remove": {"index": index, "alias": alias}}));
    let adds = add_to
        .iter()
        .map(|index| json!({"add": {"index": index, "alias": alias}}));

    json!({"actions": removes.chain(adds).collect::<Vec<_>>()})
}

/// Parse a `GET /_alias` body: `{index: {aliases: {name: {}}}}`
pub fn parse_alias_map(bytes: &[u8]) -> EsResult<AliasMap> {
    let raw: HashMap<String, IndexAliases> =
        serde_json::from_slice(bytes).map_err(EsError::decode("get_alias"))?;
    Ok(raw
        .into_iter()
        .map(|(index, entry)| (index, entry.aliases.into_keys().collect()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_pairs() {
        let pairs = vec![
            SearchPair {
                header: r#"{"index":"ons"}"#.to_string(),
                body: r#"{"size":1}"#.to_string(),
            },
            SearchPair {
                header: r#"{"index":"ons"}"#.to_string(),
                body: r#"{"size":0}"#.to_string(),
            },
        ];
        assert_eq!(
            frame_pairs(&pairs),
            "{\"index\":\"ons\"}\n{\"size\":1}\n{\"index\":\"ons\"}\n{\"size\":0}\n"
        );
    }

    #[test]
    fn test_search_path() {
        assert_eq!(search_path("ons", &[], "_msearch"), "/ons/_msearch");
        assert_eq!(
            search_path("ons", &["a".to_string(), "b".to_string()], "_search"),
            "/ons/a,b/_search"
        );
    }

    #[test]
    fn test_alias_actions_remove_before_add() {
        let body = alias_actions("ons", &["ons*".to_string()], &["ons123".to_string()]);
        assert_eq!(
            body,
            json!({"actions": [
                {"remove": {"index": "ons*", "alias": "ons"}},
                {"add": {"index": "ons123", "alias": "ons"}}
            ]})
        );

        let first_run = alias_actions("ons", &[], &["ons123".to_string()]);
        assert_eq!(first_run["actions"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_alias_map() {
        let body = br#"{
            "ons1": {"aliases": {"ons": {}}},
            "ons0": {"aliases": {}},
            "departments": {"aliases": {"dept": {}}}
        }"#;
        let map = parse_alias_map(body).unwrap();
        assert!(map["ons1"].contains("ons"));
        assert!(map["ons0"].is_empty());
        assert_eq!(map.len(), 3);
    }
}
