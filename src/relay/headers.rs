//! Outbound request header composition.
//!
//! # Responsibilities
//! - Make the upstream request look like an ordinary browser fetch
//! - Forward a fixed allow-list of client headers (range, conditionals, auth)
//! - Apply caller overrides and derive a consistent Referer/Origin pair
//! - Inject the relay's stored session cookie for the target host
//!
//! # Design Decisions
//! - Layering, lowest precedence first: defaults < forwarded < overrides <
//!   derived referer/origin < session cookie
//! - `HeaderMap::insert` replaces, so each name carries exactly one value
//! - Pure: no I/O, identical inputs give identical output

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use url::{Host, Url};

use crate::config::UpstreamConfig;
use crate::relay::overrides::{try_percent_decode, HeaderOverrides};
use crate::relay::target::UpstreamTarget;

/// The final header set sent upstream.
#[derive(Debug, Clone, Default)]
pub struct EffectiveRequestHeaders(HeaderMap);

impl EffectiveRequestHeaders {
    /// Header value as text, if present and visible ASCII.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn as_map(&self) -> &HeaderMap {
        &self.0
    }

    pub fn into_inner(self) -> HeaderMap {
        self.0
    }

    fn set(&mut self, name: &str, value: &str) {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(n) => n,
            Err(_) => {
                tracing::debug!(header = %name, "Skipping illegal header name");
                return;
            }
        };
        match HeaderValue::from_str(value) {
            Ok(v) => {
                self.0.insert(name, v);
            }
            Err(_) => tracing::debug!(header = %name, "Skipping illegal header value"),
        }
    }
}

/// Builds [`EffectiveRequestHeaders`] from the upstream configuration.
#[derive(Debug, Clone, Copy)]
pub struct HeaderComposer<'a> {
    config: &'a UpstreamConfig,
}

impl<'a> HeaderComposer<'a> {
    pub fn new(config: &'a UpstreamConfig) -> Self {
        Self { config }
    }

    /// Compose the upstream header set for `target`.
    ///
    /// `legacy_referer` is the `referer`/`referrer` query parameter;
    /// `session_cookie` is the stored jar entry for the target host.
    pub fn compose(
        &self,
        inbound: &HeaderMap,
        target: &UpstreamTarget,
        overrides: Option<&HeaderOverrides>,
        legacy_referer: Option<&str>,
        session_cookie: Option<&str>,
    ) -> EffectiveRequestHeaders {
        let mut headers = EffectiveRequestHeaders::default();

        headers.set(header::USER_AGENT.as_str(), &self.config.user_agent);
        headers.set(header::ACCEPT.as_str(), "*/*");
        headers.set(header::ACCEPT_LANGUAGE.as_str(), &self.config.accept_language);
        headers.set(header::CONNECTION.as_str(), "keep-alive");

        for name in &self.config.forward_headers {
            if let Some(value) = inbound.get(name.as_str()) {
                if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
                    headers.0.insert(name, value.clone());
                }
            }
        }

        let mut referer = legacy_referer.map(str::to_string);
        if let Some(overrides) = overrides {
            for (name, value) in overrides.iter() {
                headers.set(name, value);
            }
            if let Some(value) = overrides.referer() {
                referer = Some(value.to_string());
            }
        }
        let referer = referer.or_else(|| self.config.default_referer.clone());

        match referer {
            Some(raw) => {
                let referer = self.normalize_referer(&raw);
                let origin = derive_origin(&referer)
                    .filter(|origin| !is_loopback_origin(origin))
                    .unwrap_or_else(|| target.origin());
                headers.set(header::REFERER.as_str(), &referer);
                headers.set(header::ORIGIN.as_str(), &origin);
            }
            None => {
                let origin = headers
                    .get(header::ORIGIN.as_str())
                    .filter(|origin| !is_loopback_origin(origin))
                    .map(str::to_string)
                    .unwrap_or_else(|| target.origin());
                headers.set(header::ORIGIN.as_str(), &origin);
                headers.set(header::REFERER.as_str(), &target.origin());
            }
        }

        if let Some(stored) = session_cookie.filter(|c| !c.is_empty()) {
            let cookie = match headers.get(header::COOKIE.as_str()) {
                Some(existing) if !existing.is_empty() => format!("{existing}; {stored}"),
                _ => stored.to_string(),
            };
            headers.set(header::COOKIE.as_str(), &cookie);
        }

        headers
    }

    /// Percent-decode once and add the trailing slash some hosts insist on.
    fn normalize_referer(&self, raw: &str) -> String {
        let mut referer = try_percent_decode(raw).unwrap_or_else(|| raw.to_string());
        let needs_slash = self
            .config
            .trailing_slash_referer_hosts
            .iter()
            .any(|host| !host.is_empty() && referer.contains(host.as_str()));
        if needs_slash && !referer.ends_with('/') {
            referer.push('/');
        }
        referer
    }
}

/// `scheme://host[:port]` of `referer`, or `None` if it has no tuple origin.
fn derive_origin(referer: &str) -> Option<String> {
    let url = Url::parse(referer).ok()?;
    let origin = url.origin();
    origin
        .is_tuple()
        .then(|| origin.ascii_serialization())
}

/// Upstreams reject a relay's own local origin, so loopback never goes out.
pub(crate) fn is_loopback_origin(origin: &str) -> bool {
    match Url::parse(origin) {
        Ok(url) => match url.host() {
            Some(Host::Domain(domain)) => {
                let domain = domain.to_ascii_lowercase();
                domain == "localhost" || domain.ends_with(".localhost")
            }
            Some(Host::Ipv4(ip)) => ip.is_loopback() || ip.is_unspecified(),
            Some(Host::Ipv6(ip)) => ip.is_loopback() || ip.is_unspecified(),
            None => false,
        },
        Err(_) => origin.to_ascii_lowercase().contains("localhost"),
    }
}
