use crate::api::{handlers, middleware, AppState};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};

/// Build the main API router
pub fn build_router(state: AppState) -> Router {
    let admin = Router::new()
        .route("/search", post(handlers::create_index))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_admin));

    Router::new()
        // Search surfaces
        .route("/search", get(handlers::search))
        .route("/search/releases", get(handlers::search_releases))
        .route("/timeseries/:cdid", get(handlers::timeseries))
        .route("/data", get(handlers::data))
        // Health & metrics
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics))
        .merge(admin)
        .route_layer(from_fn(middleware::track_requests))
        // Add state
        .with_state(state)
        // Add middleware
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().include_headers(true))
                .on_response(DefaultOnResponse::new().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
}
