//! Router tests against an in-memory cluster

mod common;

use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{router, FakeEs};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

const SEARCH_REPLY: &str = r#"{"responses":[{"took":7,"hits":{"total":1,"hits":[{"_source":{"type":"bulletin","uri":"/a","description":{"title":"T","summary":"S"}}}]},"aggregations":{"docCounts":{"buckets":[{"key":"bulletin","doc_count":1}]}}}]}"#;

async fn get(app: Router, uri: &str) -> (StatusCode, String, String) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, String, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .map(|v| v.to_str().unwrap().to_string())
        .unwrap_or_default();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_search_limit_too_high() {
    let es = Arc::new(FakeEs::replying(SEARCH_REPLY));
    let (status, content_type, body) = get(router(es.clone()), "/search?limit=1001").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(content_type.starts_with("text/plain"));
    assert!(body.contains("Invalid limit parameter"));
    assert!(es.last_search_body().is_none());
}

#[tokio::test]
async fn test_search_transforms_response() {
    let es = Arc::new(FakeEs::replying(SEARCH_REPLY));
    let (status, content_type, body) =
        get(router(es.clone()), "/search?q=cpi&limit=10&offset=0").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json;charset=utf-8");

    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["count"], 1);
    assert_eq!(body["took"], 7);
    assert_eq!(body["items"][0]["uri"], "/a");
    assert_eq!(body["content_types"], json!([{"type": "bulletin", "count": 1}]));

    // one header/body pair for the default content sub-query
    let sent = es.last_search_body().unwrap();
    assert_eq!(sent.lines().count(), 2);
    let header: Value = serde_json::from_str(sent.lines().next().unwrap()).unwrap();
    assert_eq!(header["index"], "ons");
    assert_eq!(header["search_type"], "dfs_query_then_fetch");
}

#[tokio::test]
async fn test_search_term_with_dollar_signs() {
    let es = Arc::new(FakeEs::replying(SEARCH_REPLY));
    let (status, _, _) = get(router(es.clone()), "/search?q=a%24%24b").await;

    assert_eq!(status, StatusCode::OK);

    // the term stays inside its string literal rather than splitting a line
    let sent = es.last_search_body().unwrap();
    assert_eq!(sent.lines().count(), 2);
    for line in sent.lines() {
        serde_json::from_str::<Value>(line).unwrap();
    }
    assert!(sent.lines().nth(1).unwrap().contains("a$$b"));
}

#[tokio::test]
async fn test_search_raw_passthrough() {
    let es = Arc::new(FakeEs::replying(SEARCH_REPLY));
    let (status, _, body) = get(router(es), "/search?q=cpi&raw=true").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, SEARCH_REPLY);
}

#[tokio::test]
async fn test_search_upstream_failure() {
    let es = Arc::new(FakeEs {
        fail_searches: true,
        ..Default::default()
    });
    let (status, _, body) = get(router(es), "/search?q=cpi").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to run search query");
}

#[tokio::test]
async fn test_search_unreadable_reply() {
    let es = Arc::new(FakeEs::replying("<html>oops</html>"));
    let (status, _, body) = get(router(es), "/search?q=cpi").await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Failed to process search query");
}

#[tokio::test]
async fn test_release_dates_out_of_order() {
    let es = Arc::new(FakeEs::replying("{}"));
    let (status, _, body) = get(
        router(es),
        "/search/releases?fromDate=2021-06-01&toDate=2021-01-01",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("invalid dates - 'from' after 'to'"));
}

#[tokio::test]
async fn test_release_search_breakdown() {
    let count = |n: u64| json!({"took": 1, "hits": {"total": n, "hits": []}});
    let reply = json!({"responses": [
        {"took": 4, "hits": {"total": 1, "hits": [
            {"_source": {"type": "release", "uri": "/releases/gdp", "title": "GDP", "finalised": true,
                         "date_changes": [{"change_notice": "moved", "previous_date": "2024-01-01"}]}}
        ]}},
        count(1), count(2), count(3), count(4), count(5), count(6)
    ]});
    let es = Arc::new(FakeEs::replying(&reply.to_string()));
    let (status, _, body) = get(router(es.clone()), "/search/releases?query=gdp&limit=5").await;

    assert_eq!(status, StatusCode::OK);
    let body: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(body["limit"], 5);
    assert_eq!(body["breakdown"]["total"], 1);
    assert_eq!(body["breakdown"]["postponed"], 3);
    assert_eq!(body["breakdown"]["census"], 6);
    assert_eq!(body["releases"][0]["description"]["postponed"], true);

    // main query plus six count queries
    assert_eq!(es.last_search_body().unwrap().lines().count(), 14);
}

#[tokio::test]
async fn test_data_wraps_raw_reply() {
    let es = Arc::new(FakeEs::replying(r#"{"dummy":"x"}"#));
    let (status, content_type, body) =
        get(router(es.clone()), "/data?uris=u1&uris=u2&types=t").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type, "application/json;charset=utf-8");
    assert_eq!(body, r#"{"responses":[{"dummy":"x"}]}"#);

    let sent: Value = serde_json::from_str(&es.last_search_body().unwrap()).unwrap();
    assert_eq!(sent["query"]["bool"]["filter"][0]["terms"]["uri"], json!(["u1", "u2"]));
}

#[tokio::test]
async fn test_timeseries_lookup() {
    let es = Arc::new(FakeEs::replying(r#"{"hits":{"total":1,"hits":[]}}"#));
    let (status, _, body) = get(router(es.clone()), "/timeseries/ABMI").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, r#"{"hits":{"total":1,"hits":[]}}"#);
    assert!(es.last_search_body().unwrap().contains("abmi"));
}

#[tokio::test]
async fn test_health_green_and_red() {
    let es = Arc::new(FakeEs::with_status("1 green 3 3 0 0"));
    let (status, _, body) = get(router(es), "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(serde_json::from_str::<Value>(&body).unwrap(), json!({"status": "OK"}));

    let es = Arc::new(FakeEs::with_status("1 red 3 3 0 0"));
    let (status, _, body) = get(router(es), "/health").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        serde_json::from_str::<Value>(&body).unwrap(),
        json!({"status": "error", "error": "1 red 3 3 0 0"})
    );
}

#[tokio::test]
async fn test_create_index_requires_token() {
    let es = Arc::new(FakeEs::default());

    let request = Request::post("/search").body(Body::empty()).unwrap();
    let (status, _, body) = send(router(es.clone()), request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, "Unauthorised");
    assert!(es.indices.lock().unwrap().is_empty());

    let request = Request::post("/search")
        .header(header::AUTHORIZATION, "Bearer admin-token")
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(router(es.clone()), request).await;
    assert_eq!(status, StatusCode::CREATED);

    let body: Value = serde_json::from_str(&body).unwrap();
    let name = body["index_name"].as_str().unwrap();
    assert!(name.starts_with("ons"));
    assert!(es.indices.lock().unwrap().contains_key(name));
}
