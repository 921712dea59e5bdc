//! Cluster health probe and background monitor

use crate::elasticsearch::ElasticSearch;
use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status")]
pub enum HealthStatus {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "error")]
    Error { error: String },
}

impl HealthStatus {
    /// Map a `_cat/health` line; green and yellow clusters are serving
    pub fn from_cat_health(line: &str) -> Self {
        if line.contains(" green ") || line.contains(" yellow ") {
            HealthStatus::Ok
        } else {
            HealthStatus::Error {
                error: line.to_string(),
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, HealthStatus::Ok)
    }
}

impl IntoResponse for HealthStatus {
    fn into_response(self) -> axum::response::Response {
        let code = if self.is_ok() {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        (code, Json(self)).into_response()
    }
}

/// Fetch and map the cluster health line; a failed fetch is an error status
pub async fn probe(es: &dyn ElasticSearch) -> HealthStatus {
    match es.get_status().await {
        Ok(line) => HealthStatus::from_cat_health(&line),
        Err(e) => HealthStatus::Error {
            error: e.to_string(),
        },
    }
}

/// Periodically probe the cluster, escalating once it stays degraded
pub struct HealthMonitor {
    es: Arc<dyn ElasticSearch>,
    interval: Duration,
    critical_timeout: Duration,
}

impl HealthMonitor {
    pub fn new(es: Arc<dyn ElasticSearch>, interval: Duration, critical_timeout: Duration) -> Self {
        Self {
            es,
            interval,
            critical_timeout,
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut degraded_since: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match probe(self.es.as_ref()).await {
                HealthStatus::Ok => {
                    if degraded_since.take().is_some() {
                        info!("Elasticsearch cluster recovered");
                    }
                }
                HealthStatus::Error { error } => {
                    let since = *degraded_since.get_or_insert_with(Instant::now);
                    let degraded_for = since.elapsed();
                    if degraded_for >= self.critical_timeout {
                        error!(error = %error, degraded_secs = degraded_for.as_secs(), "Elasticsearch cluster critical");
                    } else {
                        warn!(error = %error, "Elasticsearch cluster degraded");
                    }
                }
            }
        }
    }
}
