//! Shared test doubles
#![allow(dead_code)]

use async_trait::async_trait;
use dp_search_api::api::{build_router, AppState};
use dp_search_api::elasticsearch::{AliasMap, ElasticSearch, EsError, EsResult};
use std::sync::{Arc, Mutex};

/// In-memory cluster: canned search replies, real alias bookkeeping
#[derive(Default)]
pub struct FakeEs {
    pub search_reply: Mutex<Vec<u8>>,
    pub status_reply: Mutex<String>,
    pub fail_searches: bool,
    pub indices: Mutex<AliasMap>,
    pub bulk_documents: Mutex<Vec<String>>,
    pub search_bodies: Mutex<Vec<String>>,
    pub alias_calls: Mutex<Vec<(String, Vec<String>, Vec<String>)>>,
}

impl FakeEs {
    pub fn replying(body: &str) -> Self {
        Self {
            search_reply: Mutex::new(body.as_bytes().to_vec()),
            ..Default::default()
        }
    }

    pub fn with_status(status: &str) -> Self {
        Self {
            status_reply: Mutex::new(status.to_string()),
            ..Default::default()
        }
    }

    /// Seed indices, each optionally holding one alias
    pub fn with_indices(names: &[(&str, Option<&str>)]) -> Self {
        let fake = Self::default();
        {
            let mut indices = fake.indices.lock().unwrap();
            for (name, alias) in names {
                indices.insert(
                    name.to_string(),
                    alias.iter().map(|a| a.to_string()).collect(),
                );
            }
        }
        fake
    }

    pub fn last_search_body(&self) -> Option<String> {
        self.search_bodies.lock().unwrap().last().cloned()
    }

    fn reply(&self, body: &str) -> EsResult<Vec<u8>> {
        self.search_bodies.lock().unwrap().push(body.to_string());
        if self.fail_searches {
            return Err(EsError::Status {
                operation: "search",
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(self.search_reply.lock().unwrap().clone())
    }
}

fn matches_pattern(index: &str, pattern: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => index.starts_with(prefix),
        None => index == pattern,
    }
}

#[async_trait]
impl ElasticSearch for FakeEs {
    async fn search(&self, _index: &str, _types: &[String], body: &str) -> EsResult<Vec<u8>> {
        self.reply(body)
    }

    async fn multi_search(&self, _index: &str, _types: &[String], body: &str) -> EsResult<Vec<u8>> {
        self.reply(body)
    }

    async fn get_status(&self) -> EsResult<String> {
        Ok(self.status_reply.lock().unwrap().clone())
    }

    async fn create_index(&self, name: &str, _settings: &[u8]) -> EsResult<()> {
        self.indices
            .lock()
            .unwrap()
            .insert(name.to_string(), Default::default());
        Ok(())
    }

    async fn bulk(&self, body: String) -> EsResult<Vec<u8>> {
        let lines: Vec<&str> = body.lines().collect();
        let mut items = Vec::new();
        for pair in lines.chunks(2) {
            if let [_meta, source] = pair {
                self.bulk_documents.lock().unwrap().push(source.to_string());
                items.push(serde_json::json!({"create": {"status": 201}}));
            }
        }
        Ok(serde_json::json!({"errors": false, "items": items})
            .to_string()
            .into_bytes())
    }

    async fn update_aliases(
        &self,
        alias: &str,
        remove_from: &[String],
        add_to: &[String],
    ) -> EsResult<()> {
        self.alias_calls.lock().unwrap().push((
            alias.to_string(),
            remove_from.to_vec(),
            add_to.to_vec(),
        ));

        let mut indices = self.indices.lock().unwrap();
        for (index, aliases) in indices.iter_mut() {
            if remove_from.iter().any(|p| matches_pattern(index, p)) {
                aliases.remove(alias);
            }
        }
        for index in add_to {
            indices
                .entry(index.clone())
                .or_default()
                .insert(alias.to_string());
        }
        Ok(())
    }

    async fn get_alias(&self) -> EsResult<AliasMap> {
        Ok(self.indices.lock().unwrap().clone())
    }

    async fn delete_indices(&self, names: &[String]) -> EsResult<()> {
        let mut indices = self.indices.lock().unwrap();
        for name in names {
            indices.remove(name);
        }
        Ok(())
    }
}

/// Router over a fake cluster
pub fn router(es: Arc<FakeEs>) -> axum::Router {
    let state = AppState::new(es).unwrap().with_admin_token("admin-token");
    build_router(state)
}
