//! Upstream HTTP transport.
//!
//! # Responsibilities
//! - Issue the upstream GET with the composed headers
//! - Follow redirects, never decompress (bytes go through untouched)
//! - Apply the per-request TLS policy
//!
//! # Design Decisions
//! - Strategy trait so the relay can swap clients (standard, browser-shaped, test mocks)
//! - TLS strictness is a field of each request, never shared mutable state:
//!   the reqwest strategy holds a strict and a relaxed client and picks one per fetch
//! - No retries; failures surface to the caller once

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use futures_util::{Stream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::UpstreamConfig;

/// Streamed upstream body.
pub type BodyStream = Pin<Box<dyn Stream<Item = Result<Bytes, TransportError>> + Send>>;

/// Transport-level failure (DNS, connect, TLS, timeout, body read).
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("upstream request failed: {0}")]
    Request(String),

    #[error("upstream request timed out: {0}")]
    Timeout(String),

    #[error("failed reading upstream body: {0}")]
    Body(String),

    #[error("failed building HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            TransportError::Body(e.to_string())
        } else {
            TransportError::Request(e.to_string())
        }
    }
}

/// Certificate validation for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsPolicy {
    #[default]
    Strict,
    Relaxed,
}

/// Which client strategy to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Default reqwest client (HTTP/1.1 or HTTP/2 as negotiated).
    #[default]
    Standard,
    /// HTTP/1.1 only with title-case header names, closer to what desktop
    /// browsers put on the wire for front ends that fingerprint clients.
    Browser,
}

/// A fully composed upstream request.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub url: Url,
    pub headers: HeaderMap,
    pub tls: TlsPolicy,
}

/// Upstream response metadata plus the unread body.
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: BodyStream,
}

impl UpstreamResponse {
    /// Every `Set-Cookie` value that is valid text.
    pub fn set_cookies(&self) -> impl Iterator<Item = &str> {
        self.headers
            .get_all(axum::http::header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
    }

    /// Read the whole body into memory.
    pub async fn collect_body(self) -> Result<Bytes, TransportError> {
        let chunks: Vec<Bytes> = self.body.try_collect().await?;
        Ok(chunks.concat().into())
    }
}

impl std::fmt::Debug for UpstreamResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

/// Fetch strategy used by the relay.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError>;
}

/// reqwest-backed transport with a strict and a relaxed TLS client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    strict: reqwest::Client,
    relaxed: reqwest::Client,
}

impl ReqwestTransport {
    /// Build both clients from the upstream configuration.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, TransportError> {
        Ok(Self {
            strict: build_client(config, TlsPolicy::Strict)?,
            relaxed: build_client(config, TlsPolicy::Relaxed)?,
        })
    }

    fn client(&self, tls: TlsPolicy) -> &reqwest::Client {
        match tls {
            TlsPolicy::Strict => &self.strict,
            TlsPolicy::Relaxed => &self.relaxed,
        }
    }
}

fn build_client(config: &UpstreamConfig, tls: TlsPolicy) -> Result<reqwest::Client, TransportError> {
    let mut builder = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
        .danger_accept_invalid_certs(tls == TlsPolicy::Relaxed);

    if let Some(secs) = config.connect_timeout_secs {
        builder = builder.connect_timeout(Duration::from_secs(secs));
    }
    if let Some(secs) = config.request_timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    if config.transport == TransportKind::Browser {
        builder = builder.http1_only().http1_title_case_headers();
    }

    builder
        .build()
        .map_err(|e| TransportError::Build(e.to_string()))
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn fetch(&self, request: UpstreamRequest) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client(request.tls)
            .get(request.url)
            .headers(request.headers)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes_stream()
            .map_err(TransportError::from_reqwest)
            .boxed();

        Ok(UpstreamResponse { status, headers, body })
    }
}
