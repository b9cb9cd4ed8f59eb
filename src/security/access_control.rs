//! Origin allow-list.
//! Decides which browser origins may use the relay.

use crate::error::RelayError;

/// Allow-list of inbound `Origin` values.
#[derive(Debug, Clone, Default)]
pub struct OriginPolicy {
    /// `None` when every origin is allowed.
    allowed: Option<Vec<String>>,
}

impl OriginPolicy {
    /// Build from configured origins. An empty list or a `*` entry allows all.
    pub fn from_config(origins: &[String]) -> Self {
        let allowed: Vec<String> = origins
            .iter()
            .map(|o| normalize(o))
            .filter(|o| !o.is_empty())
            .collect();

        if allowed.is_empty() || allowed.iter().any(|o| o == "*") {
            Self { allowed: None }
        } else {
            Self { allowed: Some(allowed) }
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.allowed.is_some()
    }

    /// Check the inbound `Origin`. A missing header fails an enforced list.
    pub fn check(&self, origin: Option<&str>) -> Result<(), RelayError> {
        let Some(allowed) = &self.allowed else {
            return Ok(());
        };

        match origin.map(normalize) {
            Some(origin) if allowed.contains(&origin) => Ok(()),
            other => {
                let origin = other.unwrap_or_default();
                tracing::warn!(origin = %origin, "Origin not allowed");
                Err(RelayError::OriginNotAllowed { origin })
            }
        }
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(origins: &[&str]) -> OriginPolicy {
        let origins: Vec<String> = origins.iter().map(|s| s.to_string()).collect();
        OriginPolicy::from_config(&origins)
    }

    #[test]
    fn empty_or_wildcard_allows_everything() {
        assert!(!policy(&[]).is_enforced());
        assert!(!policy(&["https://a.example", "*"]).is_enforced());
        assert!(policy(&[]).check(None).is_ok());
        assert!(policy(&["*"]).check(Some("https://evil.example")).is_ok());
    }

    #[test]
    fn listed_origin_passes() {
        let p = policy(&["https://app.example/"]);
        assert!(p.check(Some("https://app.example")).is_ok());
        assert!(p.check(Some("HTTPS://APP.EXAMPLE")).is_ok());
    }

    #[test]
    fn unlisted_or_missing_origin_is_rejected() {
        let p = policy(&["https://app.example"]);
        assert!(matches!(
            p.check(Some("https://other.example")),
            Err(RelayError::OriginNotAllowed { .. })
        ));
        assert!(matches!(p.check(None), Err(RelayError::OriginNotAllowed { .. })));
    }
}
