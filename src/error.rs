use crate::elasticsearch::EsError;
use crate::query::QueryError;
use crate::transformer::TransformError;
use crate::validation::ValidationError;
use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use std::fmt;
use thiserror::Error;

/// Search surface an error happened on; part of the public message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Search,
    Release,
    Data,
    Timeseries,
}

impl fmt::Display for QueryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QueryKind::Search => "search",
            QueryKind::Release => "release",
            QueryKind::Data => "data",
            QueryKind::Timeseries => "timeseries",
        })
    }
}

/// Upstream service a call failed against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Elasticsearch,
    Cms,
    Datasets,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Upstream::Elasticsearch => "elasticsearch",
            Upstream::Cms => "cms",
            Upstream::Datasets => "datasets",
        })
    }
}

/// Application error types.
///
/// The `Display` text of each variant is the public response body; the
/// `cause` fields are only logged.
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid dates - 'from' after 'to'")]
    InvalidDateRange,

    #[error("Failed to create {kind} query")]
    Compile { kind: QueryKind, cause: String },

    #[error("Failed to run {kind} query")]
    Upstream {
        kind: QueryKind,
        upstream: Upstream,
        cause: String,
    },

    #[error("Failed to process {kind} query")]
    Decode { kind: QueryKind, cause: String },

    #[error("Failed to transform {kind} response")]
    Transform { kind: QueryKind, cause: String },

    #[error("Failed to create index")]
    CreateIndex { cause: String },

    #[error("Unauthorised")]
    Unauthorised,
}

impl AppError {
    pub fn compile(kind: QueryKind, err: QueryError) -> Self {
        AppError::Compile {
            kind,
            cause: err.to_string(),
        }
    }

    pub fn elasticsearch(kind: QueryKind, err: EsError) -> Self {
        AppError::Upstream {
            kind,
            upstream: Upstream::Elasticsearch,
            cause: err.to_string(),
        }
    }

    pub fn decode(kind: QueryKind, err: impl fmt::Display) -> Self {
        AppError::Decode {
            kind,
            cause: err.to_string(),
        }
    }

    pub fn transform(kind: QueryKind, err: TransformError) -> Self {
        match err {
            TransformError::Decode(cause) => AppError::Decode {
                kind,
                cause: cause.to_string(),
            },
            other => AppError::Transform {
                kind,
                cause: other.to_string(),
            },
        }
    }

    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::InvalidDateRange => StatusCode::BAD_REQUEST,
            AppError::Unauthorised => StatusCode::UNAUTHORIZED,
            AppError::Compile { .. }
            | AppError::Upstream { .. }
            | AppError::Decode { .. }
            | AppError::Transform { .. }
            | AppError::CreateIndex { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::InvalidDateRange => "VALIDATION_ERROR",
            AppError::Compile { .. } => "COMPILE_ERROR",
            AppError::Upstream { .. } => "UPSTREAM_ERROR",
            AppError::Decode { .. } => "DECODE_ERROR",
            AppError::Transform { .. } => "TRANSFORM_ERROR",
            AppError::CreateIndex { .. } => "UPSTREAM_ERROR",
            AppError::Unauthorised => "UNAUTHORISED",
        }
    }

    fn cause(&self) -> Option<&str> {
        match self {
            AppError::Compile { cause, .. }
            | AppError::Upstream { cause, .. }
            | AppError::Decode { cause, .. }
            | AppError::Transform { cause, .. }
            | AppError::CreateIndex { cause } => Some(cause),
            _ => None,
        }
    }
}

/// Convert AppError to a plain-text HTTP response
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(
                error_code = self.error_code(),
                status_code = status.as_u16(),
                cause = self.cause().unwrap_or_default(),
                message = %message,
                "Request error"
            );
        } else {
            tracing::warn!(
                error_code = self.error_code(),
                status_code = status.as_u16(),
                message = %message,
                "Request rejected"
            );
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            message,
        )
            .into_response()
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
