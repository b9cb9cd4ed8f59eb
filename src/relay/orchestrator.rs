//! Per-request relay state machine.
//!
//! ```text
//! ValidateOrigin → ParseTarget → ComposeHeaders → Fetch → UpdateSession
//!     → CheckStatus → Classify → { RewritePlaylist | StreamBinary | EmitError }
//! ```
//!
//! Every path ends in exactly one `Result`: the HTTP layer turns it into the
//! single response for the inbound request.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use futures_util::{StreamExt, TryStreamExt};

use crate::config::RelayConfig;
use crate::error::{excerpt, RelayError};
use crate::observability::metrics;
use crate::relay::classify::{classify, content_length, fallback_content_type, looks_like_html_document, Classification};
use crate::relay::headers::HeaderComposer;
use crate::relay::overrides::HeaderOverrides;
use crate::relay::peek::PeekableBody;
use crate::relay::playlist::PlaylistRewriter;
use crate::relay::session::SessionStore;
use crate::relay::target::UpstreamTarget;
use crate::relay::transport::{
    BodyStream, ReqwestTransport, TransportError, UpstreamRequest, UpstreamResponse, UpstreamTransport,
};
use crate::security::access_control::OriginPolicy;

/// Query parameters of the relay endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelayQuery {
    /// Absolute upstream URL (required).
    pub url: Option<String>,
    /// JSON object of header overrides.
    pub headers: Option<String>,
    pub referer: Option<String>,
    pub referrer: Option<String>,
}

impl RelayQuery {
    /// Read the relay parameters from a raw query string.
    ///
    /// The first occurrence of each parameter wins and unknown parameters
    /// are ignored, so a repeated `referer` never costs the request its `url`.
    pub fn from_query_string(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "url" => &mut query.url,
                "headers" => &mut query.headers,
                "referer" => &mut query.referer,
                "referrer" => &mut query.referrer,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }

    /// Legacy referer parameter, either spelling.
    pub fn legacy_referer(&self) -> Option<&str> {
        self.referer
            .as_deref()
            .or(self.referrer.as_deref())
            .filter(|r| !r.is_empty())
    }
}

/// Successful relay outcome.
pub enum RelayResponse {
    /// Rewritten playlist text.
    Playlist { status: StatusCode, body: String },
    /// Upstream bytes streamed through with curated headers.
    Stream {
        status: StatusCode,
        headers: HeaderMap,
        body: BodyStream,
    },
}

impl RelayResponse {
    /// Label for logs and metrics.
    pub fn mode(&self) -> &'static str {
        match self {
            RelayResponse::Playlist { .. } => "playlist",
            RelayResponse::Stream { .. } => "binary",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            RelayResponse::Playlist { status, .. } | RelayResponse::Stream { status, .. } => *status,
        }
    }
}

impl std::fmt::Debug for RelayResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RelayResponse::Playlist { status, body } => f
                .debug_struct("Playlist")
                .field("status", status)
                .field("body", body)
                .finish(),
            RelayResponse::Stream { status, headers, .. } => f
                .debug_struct("Stream")
                .field("status", status)
                .field("headers", headers)
                .finish_non_exhaustive(),
        }
    }
}

/// The relay engine: configuration, session jar and transport.
pub struct Relay {
    config: Arc<RelayConfig>,
    origins: OriginPolicy,
    sessions: SessionStore,
    transport: Arc<dyn UpstreamTransport>,
}

impl Relay {
    pub fn new(config: Arc<RelayConfig>, sessions: SessionStore, transport: Arc<dyn UpstreamTransport>) -> Self {
        let origins = OriginPolicy::from_config(&config.relay.allowed_origins);
        Self {
            config,
            origins,
            sessions,
            transport,
        }
    }

    /// Build with the reqwest transport selected by the configuration.
    pub fn from_config(config: Arc<RelayConfig>, sessions: SessionStore) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::from_config(&config.upstream)?;
        Ok(Self::new(config, sessions, Arc::new(transport)))
    }

    pub fn config(&self) -> &Arc<RelayConfig> {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Origin check on its own, for CORS preflight.
    pub fn check_origin(&self, inbound: &HeaderMap) -> Result<(), RelayError> {
        let origin = inbound.get(header::ORIGIN).and_then(|v| v.to_str().ok());
        self.origins.check(origin)
    }

    /// Run one inbound request through the relay.
    pub async fn handle(&self, query: &RelayQuery, inbound: &HeaderMap) -> Result<RelayResponse, RelayError> {
        self.check_origin(inbound)?;
        let target = UpstreamTarget::parse(query.url.as_deref())?;

        let overrides = query.headers.as_deref().and_then(HeaderOverrides::try_parse);
        let session_cookie = self.sessions.get(target.host());
        let headers = HeaderComposer::new(&self.config.upstream).compose(
            inbound,
            &target,
            overrides.as_ref(),
            query.legacy_referer(),
            session_cookie.as_deref(),
        );
        let tls = self.config.relay.tls_policy_for(&target);

        tracing::info!(url = %target, tls = ?tls, "Fetching");
        let response = self
            .transport
            .fetch(UpstreamRequest {
                url: target.url().clone(),
                headers: headers.into_inner(),
                tls,
            })
            .await
            .inspect_err(|e| {
                metrics::record_upstream_error("fetch");
                tracing::error!(url = %target, error = %e, "Upstream fetch failed");
            })?;

        self.sessions.update(target.host(), response.set_cookies());

        let status = response.status;
        if !(status.is_success() || status == StatusCode::NOT_MODIFIED) {
            let body = self.peek_excerpt(response.body).await;
            tracing::warn!(url = %target, status = %status, "Upstream returned error status");
            return Err(RelayError::UpstreamStatus { status, excerpt: body });
        }

        match classify(&target, status, &response.headers, self.config.relay.error_page_threshold) {
            Classification::Playlist => self.rewrite_playlist(&target, query, response).await,
            Classification::PossibleErrorPage => self.inspect_small_body(&target, response).await,
            Classification::Binary => Ok(self.stream_binary(&target, status, &response.headers, response.body)),
        }
    }

    async fn rewrite_playlist(
        &self,
        target: &UpstreamTarget,
        query: &RelayQuery,
        response: UpstreamResponse,
    ) -> Result<RelayResponse, RelayError> {
        let status = response.status;
        tracing::info!(url = %target, status = %status, "Playlist mode");

        let bytes = response.collect_body().await?;
        let text = String::from_utf8_lossy(&bytes);

        let rewriter = PlaylistRewriter::new(self.config.relay.path.as_str())
            .with_overrides(query.headers.as_deref())
            .with_referer(query.legacy_referer());
        let body = rewriter.rewrite(&text, target.url());

        Ok(RelayResponse::Playlist { status, body })
    }

    /// Peek a suspicious body; reject it if it is an HTML page, otherwise
    /// stream it with the peeked bytes replayed.
    async fn inspect_small_body(
        &self,
        target: &UpstreamTarget,
        response: UpstreamResponse,
    ) -> Result<RelayResponse, RelayError> {
        let UpstreamResponse { status, headers, body } = response;
        let mut body = PeekableBody::new(body, self.config.relay.peek_limit);
        let prefix = body.fill().await?;

        if looks_like_html_document(prefix) {
            let page = excerpt(prefix, self.config.relay.excerpt_limit);
            metrics::record_error_page();
            tracing::error!(
                url = %target,
                excerpt = %page.chars().take(500).collect::<String>(),
                "Error page detected"
            );
            return Err(RelayError::UpstreamErrorPage { status, excerpt: page });
        }

        Ok(self.stream_binary(target, status, &headers, body.into_stream()))
    }

    fn stream_binary(
        &self,
        target: &UpstreamTarget,
        status: StatusCode,
        upstream: &HeaderMap,
        body: BodyStream,
    ) -> RelayResponse {
        let mut headers = HeaderMap::new();
        for name in &self.config.upstream.response_headers {
            let Ok(name) = HeaderName::from_bytes(name.as_bytes()) else {
                continue;
            };
            for value in upstream.get_all(&name) {
                headers.append(name.clone(), value.clone());
            }
        }
        if !headers.contains_key(header::CONTENT_TYPE) && status != StatusCode::NOT_MODIFIED {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(fallback_content_type(target)),
            );
        }

        tracing::debug!(
            status = %status,
            content_type = ?headers.get(header::CONTENT_TYPE),
            content_length = %content_length(upstream).map_or_else(|| "chunked".to_string(), |l| l.to_string()),
            path = %target.file_name(),
            "Binary mode"
        );

        let url = target.to_string();
        let body = body
            .inspect_err(move |e| {
                metrics::record_upstream_error("stream");
                tracing::warn!(url = %url, error = %e, "Upstream body failed mid-stream");
            })
            .boxed();

        RelayResponse::Stream { status, headers, body }
    }

    /// Best-effort excerpt of an error body; read failures yield "".
    async fn peek_excerpt(&self, body: BodyStream) -> String {
        let mut body = PeekableBody::new(body, self.config.relay.peek_limit);
        match body.fill().await {
            Ok(prefix) => excerpt(prefix, self.config.relay.excerpt_limit),
            Err(_) => String::new(),
        }
    }
}
