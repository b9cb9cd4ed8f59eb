//! Upstream response classification.

use axum::http::{header, HeaderMap, StatusCode};

use crate::relay::target::UpstreamTarget;

/// How the relay should treat an upstream response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Text manifest to be rewritten.
    Playlist,
    /// Media or key bytes streamed through.
    Binary,
    /// Small or HTML response that may be an error page dressed up as media.
    PossibleErrorPage,
}

/// Classify a response from its target path and metadata.
///
/// `threshold` is the declared content-length under which a non-playlist
/// body is suspicious.
pub fn classify(
    target: &UpstreamTarget,
    status: StatusCode,
    headers: &HeaderMap,
    threshold: u64,
) -> Classification {
    let content_type = header_str(headers, header::CONTENT_TYPE)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if target.path().to_ascii_lowercase().ends_with(".m3u8") || content_type.contains("mpegurl") {
        return Classification::Playlist;
    }

    if status == StatusCode::NOT_MODIFIED {
        return Classification::Binary;
    }

    let small = content_length(headers).is_some_and(|len| len < threshold);
    if content_type.contains("text/html") || small {
        Classification::PossibleErrorPage
    } else {
        Classification::Binary
    }
}

/// Whether a peeked body prefix is an HTML document.
pub fn looks_like_html_document(prefix: &[u8]) -> bool {
    let text = String::from_utf8_lossy(prefix).to_ascii_lowercase();
    text.contains("<html") || text.contains("<!doctype")
}

/// Content type for a binary response whose upstream sent none.
///
/// Upstream `Content-Type` always wins; this only fills the gap.
pub fn fallback_content_type(target: &UpstreamTarget) -> &'static str {
    let path = target.path().to_ascii_lowercase();
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext {
        "ts" => "video/mp2t",
        "m4s" => "video/iso.segment",
        "mp4" => "video/mp4",
        "aac" => "audio/aac",
        "vtt" => "text/vtt",
        _ => "application/octet-stream",
    }
}

/// Declared `Content-Length`, if present and numeric.
pub fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, header::CONTENT_LENGTH).and_then(|v| v.trim().parse().ok())
}

fn header_str(headers: &HeaderMap, name: header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
