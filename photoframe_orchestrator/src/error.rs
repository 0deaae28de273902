//! Error taxonomy shared by the core components and mapped to HTTP statuses
//! at the surface.
//!
//! | Variant | Status |
//! |---|---|
//! | `ClientInput` | 400 |
//! | `Auth` | 401 |
//! | `Disabled` | 403 |
//! | `NotFound` | 404 |
//! | `Internal` | 500 |
//! | `Upstream` | 502 |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use daily_upstream::UpstreamError;
use serde_json::json;
use thiserror::Error;

/// Unified error type raised by the core and serialized by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed form/JSON input or out-of-range values.
    #[error("{0}")]
    ClientInput(String),

    /// Missing or mismatched token.
    #[error("invalid token")]
    Auth,

    /// An endpoint that is switched off by configuration.
    #[error("{0}")]
    Disabled(String),

    /// A referenced asset or override does not exist.
    #[error("{0}")]
    NotFound(String),

    /// The daily-image upstream failed or returned a non-BMP body.
    #[error("daily image unavailable: {0}")]
    Upstream(#[from] UpstreamError),

    /// Store or disk failure.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<diesel::result::Error> for ApiError {
    fn from(e: diesel::result::Error) -> Self {
        ApiError::Internal(e.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match &self {
            ApiError::ClientInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Auth => (StatusCode::UNAUTHORIZED, self.to_string()),
            ApiError::Disabled(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Shorthand used throughout the handlers and core modules.
pub type ApiResult<T> = Result<T, ApiError>;
