use crate::api::params::{self, Params};
use crate::api::AppState;
use crate::elasticsearch::{frame_pairs, new_index_name, INDEX_SETTINGS};
use crate::error::{AppError, QueryKind, Result};
use crate::health::{self, HealthStatus};
use crate::metrics::gather_metrics;
use crate::query::ONS_INDEX;
use crate::transformer::transform_search;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::IgnoredAny, Serialize};
use tracing::{debug, info};

/// Content type of every JSON search response
pub const JSON_CONTENT_TYPE: &str = "application/json;charset=utf-8";

fn json_bytes(body: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, JSON_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

fn json_body<T: Serialize>(kind: QueryKind, value: &T) -> Result<Response> {
    let body = serde_json::to_vec(value).map_err(|e| AppError::Transform {
        kind,
        cause: e.to_string(),
    })?;
    Ok(json_bytes(body))
}

/// Reject cluster replies that are not JSON before anything reads them
fn ensure_json(kind: QueryKind, body: &[u8]) -> Result<()> {
    serde_json::from_slice::<IgnoredAny>(body)
        .map(|_| ())
        .map_err(|e| AppError::decode(kind, e))
}

/// Content search
pub async fn search(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let params = Params::from(pairs);
    let request = params::search_request(&state.search_validators, &params)?;

    let compiled = state
        .queries
        .build_search_query(&request)
        .map_err(|e| AppError::compile(QueryKind::Search, e))?;

    let raw = state
        .es
        .multi_search(ONS_INDEX, &request.types, &compiled.body)
        .await
        .map_err(|e| AppError::elasticsearch(QueryKind::Search, e))?;
    ensure_json(QueryKind::Search, &raw)?;

    if params.raw() {
        return Ok(json_bytes(raw));
    }

    let response = transform_search(&raw, &compiled.sub_queries, request.highlight)
        .map_err(|e| AppError::transform(QueryKind::Search, e))?;
    debug!(term = %request.term, count = response.count, "Search answered");
    json_body(QueryKind::Search, &response)
}

/// Release calendar search
pub async fn search_releases(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let params = Params::from(pairs);
    let request = params::release_request(&state.release_validators, &params)?;

    let queries = state
        .queries
        .build_release_queries(&request)
        .map_err(|e| AppError::compile(QueryKind::Release, e))?;

    let raw = state
        .es
        .multi_search(ONS_INDEX, &[], &frame_pairs(&queries.pairs))
        .await
        .map_err(|e| AppError::elasticsearch(QueryKind::Release, e))?;
    ensure_json(QueryKind::Release, &raw)?;

    if params.raw() {
        return Ok(json_bytes(raw));
    }

    let response = state
        .releases
        .transform(&raw, &request, &queries.counts)
        .map_err(|e| AppError::transform(QueryKind::Release, e))?;
    json_body(QueryKind::Release, &response)
}

/// Latest timeseries document for a CDID
pub async fn timeseries(
    State(state): State<AppState>,
    Path(cdid): Path<String>,
) -> Result<Response> {
    let body = state
        .queries
        .build_timeseries_query(&cdid)
        .map_err(|e| AppError::compile(QueryKind::Timeseries, e))?;

    let raw = state
        .es
        .search(ONS_INDEX, &[], &body)
        .await
        .map_err(|e| AppError::elasticsearch(QueryKind::Timeseries, e))?;
    ensure_json(QueryKind::Timeseries, &raw)?;
    Ok(json_bytes(raw))
}

/// Documents by URI and type, in the legacy multi-search envelope
pub async fn data(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response> {
    let request = params::data_request(&Params::from(pairs));
    let body = state
        .queries
        .build_data_query(&request)
        .map_err(|e| AppError::compile(QueryKind::Data, e))?;

    let raw = state
        .es
        .search(ONS_INDEX, &[], &body)
        .await
        .map_err(|e| AppError::elasticsearch(QueryKind::Data, e))?;
    ensure_json(QueryKind::Data, &raw)?;

    let mut wrapped = Vec::with_capacity(raw.len() + 16);
    wrapped.extend_from_slice(br#"{"responses":["#);
    wrapped.extend_from_slice(&raw);
    wrapped.extend_from_slice(b"]}");
    Ok(json_bytes(wrapped))
}

/// Cluster health
pub async fn health_check(State(state): State<AppState>) -> HealthStatus {
    health::probe(state.es.as_ref()).await
}

#[derive(Debug, Serialize)]
pub struct CreateIndexResponse {
    pub index_name: String,
}

/// Create a new empty index with the search settings
pub async fn create_index(State(state): State<AppState>) -> Result<(StatusCode, Json<CreateIndexResponse>)> {
    let index_name = new_index_name();
    state
        .es
        .create_index(&index_name, INDEX_SETTINGS.as_bytes())
        .await
        .map_err(|e| AppError::CreateIndex {
            cause: e.to_string(),
        })?;

    info!(index = %index_name, "Created index");
    Ok((StatusCode::CREATED, Json(CreateIndexResponse { index_name })))
}

/// Prometheus exposition
pub async fn metrics() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        gather_metrics(),
    )
        .into_response()
}
