//! Upstream target parsing.

use std::fmt;

use url::Url;

use crate::error::RelayError;

/// The absolute URL the relay fetches for one inbound request.
///
/// Parsed once from the `url` query parameter and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamTarget {
    url: Url,
}

impl UpstreamTarget {
    /// Parse the caller-supplied `url` parameter.
    ///
    /// Absence, invalid syntax, a non-HTTP(S) scheme, or a missing host are
    /// all terminal input errors.
    pub fn parse(raw: Option<&str>) -> Result<Self, RelayError> {
        let raw = raw
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(RelayError::MissingUrl)?;

        let url = Url::parse(raw).map_err(|e| RelayError::InvalidUrl {
            input: raw.to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(RelayError::InvalidUrl {
                input: raw.to_string(),
                reason: format!("unsupported scheme `{}`", url.scheme()),
            });
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(RelayError::InvalidUrl {
                input: raw.to_string(),
                reason: "missing host".to_string(),
            });
        }

        Ok(Self { url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Hostname used as the session-store key (port excluded).
    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// `scheme://host[:port]` of the target.
    pub fn origin(&self) -> String {
        self.url.origin().ascii_serialization()
    }

    /// Whether the lowercased path ends with any of `extensions`.
    pub fn path_ends_with_any(&self, extensions: &[String]) -> bool {
        let path = self.url.path().to_ascii_lowercase();
        extensions
            .iter()
            .any(|ext| path.ends_with(&ext.to_ascii_lowercase()))
    }

    /// Final path segment, for log lines.
    pub fn file_name(&self) -> &str {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .unwrap_or_default()
    }
}

impl fmt::Display for UpstreamTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
