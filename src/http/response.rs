//! Response construction.
//!
//! # Responsibilities
//! - Turn a relay outcome into an HTTP response
//! - Stream binary bodies without buffering
//! - Stamp the relay's standard headers on every response, errors included
//!
//! # Design Decisions
//! - Playlists always go out as `application/vnd.apple.mpegurl`, whatever
//!   the upstream declared
//! - Upstream status is mirrored for successful outcomes

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};

use crate::config::CorsConfig;
use crate::error::RelayError;
use crate::relay::RelayResponse;
use crate::security::headers::apply_relay_headers;

pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

impl IntoResponse for RelayResponse {
    fn into_response(self) -> Response {
        match self {
            RelayResponse::Playlist { status, body } => (
                status,
                [(header::CONTENT_TYPE, HeaderValue::from_static(PLAYLIST_CONTENT_TYPE))],
                body,
            )
                .into_response(),
            RelayResponse::Stream { status, headers, body } => {
                let mut response = Response::new(Body::from_stream(body));
                *response.status_mut() = status;
                *response.headers_mut() = headers;
                response
            }
        }
    }
}

/// Final client response for a relay outcome.
pub fn finalize(result: Result<RelayResponse, RelayError>, inbound: &HeaderMap, cors: &CorsConfig) -> Response {
    let mut response = match result {
        Ok(relayed) => relayed.into_response(),
        Err(e) => e.into_response(),
    };
    apply_relay_headers(response.headers_mut(), inbound.get(header::ORIGIN), cors);
    response
}
