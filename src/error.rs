//! Relay error taxonomy and its HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::relay::transport::TransportError;

/// Everything that ends a relay request without a successful upstream body.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("URL is required")]
    MissingUrl,

    #[error("invalid URL `{input}`: {reason}")]
    InvalidUrl { input: String, reason: String },

    #[error("origin `{origin}` is not allowed")]
    OriginNotAllowed { origin: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("upstream returned error page")]
    UpstreamErrorPage { status: StatusCode, excerpt: String },

    #[error("upstream responded with status {status}")]
    UpstreamStatus { status: StatusCode, excerpt: String },
}

impl RelayError {
    /// Status code sent to the client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::MissingUrl | RelayError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
            RelayError::OriginNotAllowed { .. } => StatusCode::FORBIDDEN,
            RelayError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::UpstreamErrorPage { .. } | RelayError::UpstreamStatus { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::MissingUrl => "missing_url",
            RelayError::InvalidUrl { .. } => "invalid_url",
            RelayError::OriginNotAllowed { .. } => "origin_not_allowed",
            RelayError::Transport(_) => "transport",
            RelayError::UpstreamErrorPage { .. } => "error_page",
            RelayError::UpstreamStatus { .. } => "upstream_status",
        }
    }

    fn body(&self) -> ErrorBody {
        let (upstream_status, excerpt) = match self {
            RelayError::UpstreamErrorPage { status, excerpt }
            | RelayError::UpstreamStatus { status, excerpt } => {
                (Some(status.as_u16()), Some(excerpt.clone()).filter(|e| !e.is_empty()))
            }
            _ => (None, None),
        };
        ErrorBody {
            message: self.to_string(),
            status: upstream_status,
            body: excerpt,
        }
    }
}

/// JSON error body.
#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self.body())).into_response()
    }
}

/// Lossy UTF-8 text of `bytes`, cut to at most `limit` characters.
pub fn excerpt(bytes: &[u8], limit: usize) -> String {
    String::from_utf8_lossy(bytes).chars().take(limit).collect()
}
