//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::relay::transport::{TlsPolicy, TransportKind};
use crate::relay::UpstreamTarget;

/// Root configuration for the relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Relay endpoint behaviour.
    pub relay: RelaySettings,

    /// How upstream requests are built and sent.
    pub upstream: UpstreamConfig,

    /// Headers added to every relay response.
    pub cors: CorsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Relay endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Path the relay is served on; also the prefix of rewritten playlist URIs.
    pub path: String,

    /// Origins allowed to use the relay. Empty or containing "*" allows all.
    pub allowed_origins: Vec<String>,

    /// Declared content-length below which a non-playlist body is peeked.
    pub error_page_threshold: u64,

    /// Maximum number of bytes peeked when looking for an HTML error page.
    pub peek_limit: usize,

    /// Maximum characters of upstream body quoted in error responses.
    pub excerpt_limit: usize,

    /// Target path extensions fetched with certificate validation relaxed.
    pub relaxed_tls_extensions: Vec<String>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            path: "/proxy".to_string(),
            allowed_origins: Vec::new(),
            error_page_threshold: 2000,
            peek_limit: 4096,
            excerpt_limit: 1000,
            relaxed_tls_extensions: vec![".mp4".to_string()],
        }
    }
}

impl RelaySettings {
    /// TLS policy for one target.
    pub fn tls_policy_for(&self, target: &UpstreamTarget) -> TlsPolicy {
        if target.path_ends_with_any(&self.relaxed_tls_extensions) {
            TlsPolicy::Relaxed
        } else {
            TlsPolicy::Strict
        }
    }
}

/// Upstream request configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// User-Agent sent upstream.
    pub user_agent: String,

    /// Accept-Language sent upstream.
    pub accept_language: String,

    /// Referer used when the caller supplies none.
    pub default_referer: Option<String>,

    /// Referers containing one of these get a trailing slash appended.
    pub trailing_slash_referer_hosts: Vec<String>,

    /// Inbound headers copied verbatim to the upstream request.
    pub forward_headers: Vec<String>,

    /// Upstream headers copied to binary responses.
    pub response_headers: Vec<String>,

    /// Client strategy.
    pub transport: TransportKind,

    /// Connection establishment timeout in seconds (unset: none).
    pub connect_timeout_secs: Option<u64>,

    /// Total request timeout in seconds (unset: none).
    pub request_timeout_secs: Option<u64>,

    /// Redirects followed before giving up.
    pub max_redirects: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/144.0.0.0 Safari/537.36"
                .to_string(),
            accept_language: "en-US,en;q=0.9".to_string(),
            default_referer: None,
            trailing_slash_referer_hosts: vec!["kwik.cx".to_string()],
            forward_headers: [
                "range",
                "if-match",
                "if-none-match",
                "if-modified-since",
                "if-unmodified-since",
                "authorization",
                "cookie",
            ]
            .map(String::from)
            .to_vec(),
            response_headers: [
                "content-type",
                "content-length",
                "content-range",
                "accept-ranges",
                "last-modified",
                "etag",
            ]
            .map(String::from)
            .to_vec(),
            transport: TransportKind::default(),
            connect_timeout_secs: None,
            request_timeout_secs: None,
            max_redirects: 10,
        }
    }
}

/// Response headers set on every relay response.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allow_methods: String,
    pub allow_headers: String,
    pub expose_headers: String,
    pub allow_credentials: bool,
    pub cache_control: String,
    /// Value of the `X-Proxy-By` marker header.
    pub marker: String,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allow_methods: "GET, POST, OPTIONS, HEAD".to_string(),
            allow_headers: "Content-Type, X-Requested-With, Range, Authorization, Cookie".to_string(),
            expose_headers: "Content-Range, Content-Length, Accept-Ranges, Content-Type".to_string(),
            allow_credentials: true,
            cache_control: "no-store, no-cache, must-revalidate, proxy-revalidate".to_string(),
            marker: "m3u8-relay".to_string(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
