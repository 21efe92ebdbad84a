use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifetime tier of a cached session, chosen once per save from the
/// login form's "remember me" flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionPolicy {
    /// Long-lived ("remember me" checked)
    Persistent,
    /// Short-lived or tied to the browsing context
    Ephemeral,
}

impl RetentionPolicy {
    pub fn from_remember(remember: bool) -> Self {
        if remember {
            RetentionPolicy::Persistent
        } else {
            RetentionPolicy::Ephemeral
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RetentionPolicy::Persistent => "persistent",
            RetentionPolicy::Ephemeral => "ephemeral",
        }
    }
}

impl fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical location a session blob can live in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediumKind {
    /// Same-site secure cookie
    Cookie,
    /// Session-scoped store, gone when the browsing context ends
    Session,
}

impl MediumKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediumKind::Cookie => "cookie",
            MediumKind::Session => "session",
        }
    }
}

impl fmt::Display for MediumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cookie `SameSite` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    /// Attribute value as it appears in a `Set-Cookie` header
    pub fn as_attr(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Where a retention tier writes and how long the entry lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionRule {
    pub medium: MediumKind,
    /// Seconds until expiry; `None` keeps the entry for the lifetime of the medium
    #[serde(default)]
    pub expiry_secs: Option<u64>,
}

impl RetentionRule {
    pub fn expiry(&self) -> Option<Duration> {
        self.expiry_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_from_remember() {
        assert_eq!(RetentionPolicy::from_remember(true), RetentionPolicy::Persistent);
        assert_eq!(RetentionPolicy::from_remember(false), RetentionPolicy::Ephemeral);
    }

    #[test]
    fn test_rule_expiry() {
        let rule = RetentionRule {
            medium: MediumKind::Cookie,
            expiry_secs: Some(3600),
        };
        assert_eq!(rule.expiry(), Some(Duration::from_secs(3600)));

        let rule = RetentionRule {
            medium: MediumKind::Session,
            expiry_secs: None,
        };
        assert_eq!(rule.expiry(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(RetentionPolicy::Ephemeral.to_string(), "ephemeral");
        assert_eq!(MediumKind::Cookie.to_string(), "cookie");
        assert_eq!(SameSite::Strict.as_attr(), "Strict");
    }
}
