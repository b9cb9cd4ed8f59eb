//! Per-host session cookie jar.
//!
//! # Responsibilities
//! - Remember the `name=value` pairs an upstream host has set
//! - Replay them on later fetches to the same host (playlist -> key -> segment)
//!
//! # Design Decisions
//! - Attributes (path, domain, expiry, flags) are discarded; only identity is replayed
//! - Lives for the process lifetime; nothing is persisted or expired
//! - Merge for one host runs under that entry's lock, so concurrent updates merge

use std::sync::Arc;

use dashmap::DashMap;

use crate::observability::metrics;

/// Process-wide mapping from upstream hostname to a merged cookie string.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<DashMap<String, String>>,
}

impl SessionStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cookie string previously stored for `host`.
    pub fn get(&self, host: &str) -> Option<String> {
        self.inner.get(host).map(|r| r.value().clone())
    }

    /// Merge `Set-Cookie` values into the entry for `host`.
    ///
    /// Returns `true` if at least one cookie pair was present.
    pub fn update<'a, I>(&self, host: &str, set_cookie_values: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        let pairs: Vec<&str> = set_cookie_values
            .into_iter()
            .filter_map(cookie_pair)
            .collect();
        if pairs.is_empty() {
            return false;
        }

        let mut entry = self.inner.entry(host.to_string()).or_default();
        let merged = merge_cookie_pairs(entry.value(), &pairs);
        *entry.value_mut() = merged;
        drop(entry);

        metrics::record_session_update();
        tracing::info!(host = %host, cookies = pairs.len(), "Session updated");
        true
    }

    /// Number of hosts with a stored session.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// The leading `name=value` of a `Set-Cookie` header, if non-empty.
fn cookie_pair(set_cookie: &str) -> Option<&str> {
    let pair = set_cookie.split(';').next()?.trim();
    (!pair.is_empty()).then_some(pair)
}

/// Union of `current` (a `; `-joined string) and `incoming`, exact
/// duplicates removed, first-appearance order kept.
fn merge_cookie_pairs(current: &str, incoming: &[&str]) -> String {
    let mut merged: Vec<&str> = Vec::new();
    for pair in current.split("; ").chain(incoming.iter().copied()) {
        let pair = pair.trim();
        if !pair.is_empty() && !merged.contains(&pair) {
            merged.push(pair);
        }
    }
    merged.join("; ")
}
