//! M3U8 playlist rewriting.
//!
//! Every URI a playlist references is rewritten into a relay URL carrying
//! the absolute upstream address, so nested fetches (master -> variant ->
//! segment/key) keep going through the relay with the same overrides.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::Url;

/// Quoted `URI="..."` attribute inside a tag line.
static URI_ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)(URI\s*=\s*")([^"]+)(")"#).expect("URI attribute pattern is valid")
});

/// Tags that never carry a URI and are passed through untouched.
const PASSTHROUGH_TAGS: [&str; 2] = ["#EXTM3U", "#EXT-X-VERSION"];

/// Classification of one playlist line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaylistLine<'a> {
    Blank,
    HeaderTag,
    Tag(&'a str),
    Uri(&'a str),
}

impl<'a> PlaylistLine<'a> {
    pub fn classify(line: &'a str) -> Self {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            PlaylistLine::Blank
        } else if PASSTHROUGH_TAGS.iter().any(|tag| trimmed.starts_with(tag)) {
            PlaylistLine::HeaderTag
        } else if trimmed.starts_with('#') {
            PlaylistLine::Tag(line)
        } else {
            PlaylistLine::Uri(trimmed)
        }
    }
}

/// Rewrites playlists so that every reference routes back through the relay.
#[derive(Debug, Clone)]
pub struct PlaylistRewriter {
    relay_path: String,
    /// Raw `headers` blob to carry to the next hop.
    overrides: Option<String>,
    /// Legacy `referer` parameter to carry to the next hop.
    referer: Option<String>,
}

impl PlaylistRewriter {
    pub fn new(relay_path: impl Into<String>) -> Self {
        Self {
            relay_path: relay_path.into(),
            overrides: None,
            referer: None,
        }
    }

    pub fn with_overrides(mut self, overrides: Option<&str>) -> Self {
        self.overrides = overrides.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    pub fn with_referer(mut self, referer: Option<&str>) -> Self {
        self.referer = referer.filter(|s| !s.is_empty()).map(str::to_string);
        self
    }

    /// Rewrite `text`, resolving references against `base`.
    ///
    /// Never fails: a reference that cannot be resolved leaves its line as is.
    pub fn rewrite(&self, text: &str, base: &Url) -> String {
        text.split('\n')
            .map(|line| self.rewrite_line(line, base))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn rewrite_line(&self, line: &str, base: &Url) -> String {
        match PlaylistLine::classify(line) {
            PlaylistLine::Blank | PlaylistLine::HeaderTag => line.to_string(),
            PlaylistLine::Tag(tag) => URI_ATTRIBUTE
                .replace_all(tag, |caps: &Captures<'_>| match base.join(&caps[2]) {
                    Ok(absolute) => format!("{}{}{}", &caps[1], self.proxied_url(&absolute), &caps[3]),
                    Err(_) => caps[0].to_string(),
                })
                .into_owned(),
            PlaylistLine::Uri(reference) => match base.join(reference) {
                Ok(absolute) => self.proxied_url(&absolute),
                Err(e) => {
                    tracing::debug!(line = %reference, error = %e, "Leaving unresolvable playlist line");
                    line.to_string()
                }
            },
        }
    }

    /// Relay URL for an absolute upstream address.
    pub fn proxied_url(&self, absolute: &Url) -> String {
        let mut proxied = format!(
            "{}?url={}",
            self.relay_path,
            urlencoding::encode(absolute.as_str())
        );
        if let Some(overrides) = &self.overrides {
            proxied.push_str("&headers=");
            proxied.push_str(&urlencoding::encode(overrides));
        }
        if let Some(referer) = &self.referer {
            proxied.push_str("&referer=");
            proxied.push_str(&urlencoding::encode(referer));
        }
        proxied
    }
}
