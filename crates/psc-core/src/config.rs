use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{PscError, PscResult};
use crate::types::{MediumKind, RetentionPolicy, RetentionRule, SameSite};

/// Seven days, the "remember me" lifetime
pub const PERSISTENT_EXPIRY_SECS: u64 = 7 * 24 * 60 * 60;

/// Sixty minutes, the short-lived cookie lifetime
pub const EPHEMERAL_EXPIRY_SECS: u64 = 60 * 60;

/// Top-level configuration (loaded from psc.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PscConfig {
    pub secret: SecretConfig,
    pub entry: EntryConfig,
    pub cookie: CookieConfig,
    pub retention: RetentionConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

impl PscConfig {
    /// Reject settings that would produce unusable media entries.
    pub fn validate(&self) -> PscResult<()> {
        let name = &self.entry.name;
        if name.is_empty() {
            return Err(PscError::Config("entry.name must not be empty".into()));
        }
        if name
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, ';' | ',' | '=' | '"'))
        {
            return Err(PscError::Config(format!(
                "entry.name {name:?} is not a valid cookie name"
            )));
        }
        if self.secret.env_var.is_empty() {
            return Err(PscError::Config("secret.env_var must not be empty".into()));
        }
        if self.cookie.max_value_bytes == 0 {
            return Err(PscError::Config(
                "cookie.max_value_bytes must be greater than zero".into(),
            ));
        }
        if !self.cookie.secure && self.cookie.same_site == SameSite::None {
            return Err(PscError::Config(
                "cookie.same_site = \"none\" requires cookie.secure = true".into(),
            ));
        }
        for policy in [RetentionPolicy::Persistent, RetentionPolicy::Ephemeral] {
            let rule = self.retention.rule(policy);
            if rule.expiry_secs == Some(0) {
                return Err(PscError::Config(format!(
                    "retention.{policy}.expiry_secs must be greater than zero"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretConfig {
    /// Environment variable holding the application secret
    pub env_var: String,
}

impl Default for SecretConfig {
    fn default() -> Self {
        Self {
            env_var: "PSC_SESSION_SECRET".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryConfig {
    /// Key the blob is stored under, in every medium
    pub name: String,
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            name: "lms_profile".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
    /// Upper bound for name + value, browsers drop anything larger
    pub max_value_bytes: usize,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            path: "/".into(),
            secure: true,
            same_site: SameSite::Strict,
            max_value_bytes: 4096,
        }
    }
}

/// Explicit `RetentionPolicy -> (Medium, ExpirySeconds)` table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub persistent: RetentionRule,
    pub ephemeral: RetentionRule,
}

impl RetentionConfig {
    /// Persistent tier in a cookie, ephemeral tier in the session store.
    pub fn hybrid() -> Self {
        Self {
            persistent: RetentionRule {
                medium: MediumKind::Cookie,
                expiry_secs: Some(PERSISTENT_EXPIRY_SECS),
            },
            ephemeral: RetentionRule {
                medium: MediumKind::Session,
                expiry_secs: None,
            },
        }
    }

    /// Both tiers in a cookie, differing only in lifetime.
    pub fn cookie_only() -> Self {
        Self {
            persistent: RetentionRule {
                medium: MediumKind::Cookie,
                expiry_secs: Some(PERSISTENT_EXPIRY_SECS),
            },
            ephemeral: RetentionRule {
                medium: MediumKind::Cookie,
                expiry_secs: Some(EPHEMERAL_EXPIRY_SECS),
            },
        }
    }

    pub fn rule(&self, policy: RetentionPolicy) -> RetentionRule {
        match policy {
            RetentionPolicy::Persistent => self.persistent,
            RetentionPolicy::Ephemeral => self.ephemeral,
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self::hybrid()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the file-backed cookie jar
    pub data_dir: PathBuf,
    /// Directory holding the file-backed session store (should not survive reboots)
    pub session_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.local/share/psc"),
            session_dir: std::env::temp_dir().join("psc-session"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}
