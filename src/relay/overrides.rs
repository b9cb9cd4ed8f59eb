//! Caller-supplied header overrides.
//!
//! The `headers` query parameter carries a JSON object of header name to
//! value. Malformed input is expected from real players and is treated as
//! "no overrides" rather than an error.

use std::borrow::Cow;

use serde_json::{Map, Value};

/// Parsed header overrides, names case-folded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderOverrides {
    entries: Vec<(String, String)>,
}

impl HeaderOverrides {
    /// Parse an override blob, returning `None` when it is not a JSON object.
    ///
    /// Some callers percent-encode the blob twice, so a failed parse is
    /// retried once on the decoded text.
    pub fn try_parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            return None;
        }

        Self::parse_object(raw).or_else(|| {
            let decoded = try_percent_decode(raw)?;
            Self::parse_object(&decoded)
        })
    }

    fn parse_object(text: &str) -> Option<Self> {
        let object: Map<String, Value> = serde_json::from_str(text).ok()?;

        let entries = object
            .into_iter()
            .filter_map(|(name, value)| {
                let value = match value {
                    Value::String(s) => s,
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    Value::Null | Value::Array(_) | Value::Object(_) => return None,
                };
                Some((name.to_ascii_lowercase(), value))
            })
            .collect();

        Some(Self { entries })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Value of a `referer`/`referrer` entry, if any. The last one wins.
    pub fn referer(&self) -> Option<&str> {
        self.iter()
            .filter(|(name, _)| matches!(*name, "referer" | "referrer"))
            .map(|(_, value)| value)
            .last()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v)
            .last()
    }
}

/// Percent-decode `raw`, or `None` if it is not valid UTF-8 once decoded
/// or nothing changed.
pub fn try_percent_decode(raw: &str) -> Option<String> {
    match urlencoding::decode(raw).ok()? {
        Cow::Borrowed(_) => None,
        Cow::Owned(decoded) => Some(decoded),
    }
}
