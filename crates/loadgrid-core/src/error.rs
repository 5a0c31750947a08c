//! Error kinds shared by workers and the gateway.
//!
//! Every variant maps onto one HTTP status and a stable `kind` string so
//! the dashboard can tell a rejected slider payload from an unreachable
//! worker. None of them are fatal to the serving process.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Result type alias for loadgrid operations.
pub type LoadgridResult<T> = Result<T, LoadgridError>;

/// Errors surfaced by loadgrid services.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadgridError {
    /// Malformed level payload (unknown resource, non-integer value, bad shape).
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown app name.
    #[error("not found: {0}")]
    NotFound(String),

    /// A worker could not be reached, timed out, or answered non-2xx.
    #[error("upstream {app} unavailable: {reason}")]
    UpstreamUnavailable { app: String, reason: String },

    /// Invalid configuration; only raised at startup.
    #[error("configuration error: {0}")]
    Config(String),
}

impl LoadgridError {
    /// Shorthand for an upstream failure.
    pub fn upstream(app: impl Into<String>, reason: impl ToString) -> Self {
        Self::UpstreamUnavailable {
            app: app.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable kind, used in error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable { .. } => "upstream_unavailable",
            Self::Config(_) => "config",
        }
    }

    /// HTTP status this error is reported with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error body: `{ "success": false, "kind": "...", "error": "..." }`.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub kind: String,
    pub error: String,
}

impl IntoResponse for LoadgridError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            kind: self.kind().to_string(),
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
