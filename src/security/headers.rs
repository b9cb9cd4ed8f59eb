//! Response headers added to every relay response.
//!
//! # Responsibilities
//! - CORS headers mirroring the inbound `Origin` (credentials require a concrete origin)
//! - Cache-disabling directives so players always refetch live playlists
//! - `X-Proxy-By` marker and `nosniff`

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::config::CorsConfig;

pub const X_PROXY_BY: HeaderName = HeaderName::from_static("x-proxy-by");

/// Add the relay's standard headers to `headers`, replacing existing values.
pub fn apply_relay_headers(headers: &mut HeaderMap, inbound_origin: Option<&HeaderValue>, cors: &CorsConfig) {
    let allow_origin = inbound_origin
        .cloned()
        .unwrap_or_else(|| HeaderValue::from_static("*"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allow_origin);
    headers.append(header::VARY, HeaderValue::from_static("Origin"));

    set(headers, header::ACCESS_CONTROL_ALLOW_METHODS, &cors.allow_methods);
    set(headers, header::ACCESS_CONTROL_ALLOW_HEADERS, &cors.allow_headers);
    set(headers, header::ACCESS_CONTROL_EXPOSE_HEADERS, &cors.expose_headers);
    if cors.allow_credentials {
        headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    }

    set(headers, header::CACHE_CONTROL, &cors.cache_control);
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    set(headers, X_PROXY_BY, &cors.marker);
    headers.insert(header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
}

fn set(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        headers.insert(name, value);
    }
}
