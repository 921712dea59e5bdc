//! Request middleware: admin authorisation and request counting

use super::AppState;
use crate::error::AppError;
use crate::metrics::SEARCH_REQUESTS_TOTAL;
use axum::{
    extract::{MatchedPath, Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Reject requests without `Authorization: Bearer <service token>`.
///
/// An unset token locks the admin routes entirely.
pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let presented = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(token) if !state.admin_token.is_empty() && token == state.admin_token.as_ref() => {
            next.run(req).await
        }
        _ => AppError::Unauthorised.into_response(),
    }
}

/// Count every answered request by route and status
pub async fn track_requests(req: Request, next: Next) -> Response {
    let surface = req
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(req).await;
    SEARCH_REQUESTS_TOTAL
        .with_label_values(&[&surface, response.status().as_str()])
        .inc();
    response
}
