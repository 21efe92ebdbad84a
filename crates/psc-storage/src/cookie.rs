//! Cookie medium
//!
//! Models what the browser does with a script-set cookie: one value per name,
//! the jar-wide attributes (`Path`, `Secure`, `SameSite`), an optional expiry
//! after which the cookie is gone, and a size cap past which the browser
//! silently drops the write. Here the oversize write is an error instead, so
//! the caller can log it.

use std::path::Path;
use std::time::Duration;

use psc_core::config::CookieConfig;
use psc_core::{MediumKind, PscError, PscResult, SameSite};

use crate::medium::{expires_at_ms, now_ms, StorageMedium};
use crate::persist::{Entry, EntryTable};

/// Attributes applied to every cookie the jar writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieAttributes {
    pub path: String,
    pub secure: bool,
    pub same_site: SameSite,
    /// Maximum size of name + value in bytes
    pub max_value_bytes: usize,
}

impl Default for CookieAttributes {
    fn default() -> Self {
        Self::from(&CookieConfig::default())
    }
}

impl From<&CookieConfig> for CookieAttributes {
    fn from(cfg: &CookieConfig) -> Self {
        Self {
            path: cfg.path.clone(),
            secure: cfg.secure,
            same_site: cfg.same_site,
            max_value_bytes: cfg.max_value_bytes,
        }
    }
}

impl CookieAttributes {
    fn push_attrs(&self, out: &mut String) {
        out.push_str("; Path=");
        out.push_str(&self.path);
    }

    fn push_flags(&self, out: &mut String) {
        if self.secure {
            out.push_str("; Secure");
        }
        out.push_str("; SameSite=");
        out.push_str(self.same_site.as_attr());
    }
}

/// A live cookie as seen through the jar
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Epoch milliseconds at which the cookie expires; `None` = session cookie
    pub expires_at_ms: Option<u64>,
}

impl Cookie {
    /// Seconds left before expiry, rounded up; `None` for session cookies.
    pub fn max_age_secs(&self) -> Option<u64> {
        self.expires_at_ms
            .map(|at| at.saturating_sub(now_ms()).div_ceil(1000))
    }

    /// Render the `Set-Cookie` header value that would create this cookie.
    pub fn to_set_cookie_header(&self, attrs: &CookieAttributes) -> String {
        let mut out = format!("{}={}", self.name, self.value);
        attrs.push_attrs(&mut out);
        if let Some(max_age) = self.max_age_secs() {
            out.push_str(&format!("; Max-Age={max_age}"));
        }
        attrs.push_flags(&mut out);
        out
    }
}

pub struct CookieJar {
    attrs: CookieAttributes,
    table: EntryTable,
}

impl CookieJar {
    pub fn in_memory(attrs: CookieAttributes) -> Self {
        Self {
            attrs,
            table: EntryTable::in_memory("cookie"),
        }
    }

    /// Open a jar persisted at `path`. A missing or damaged file yields an empty jar.
    pub fn open(path: &Path, attrs: CookieAttributes) -> Self {
        Self {
            attrs,
            table: EntryTable::open("cookie", path),
        }
    }

    pub fn attributes(&self) -> &CookieAttributes {
        &self.attrs
    }

    /// Backing file, if the jar is persisted
    pub fn path(&self) -> Option<&Path> {
        self.table.path()
    }

    /// The live cookie under `name`, if any.
    pub fn cookie(&self, name: &str) -> PscResult<Option<Cookie>> {
        Ok(self.table.get(name)?.map(|entry| Cookie {
            name: name.to_string(),
            value: entry.value,
            expires_at_ms: entry.expires_at_ms,
        }))
    }

    /// Request `Cookie` header for every live cookie, or `None` if the jar is empty.
    pub fn cookie_header(&self) -> PscResult<Option<String>> {
        let pairs: Vec<String> = self
            .table
            .live_entries()?
            .into_iter()
            .map(|(name, entry)| format!("{name}={}", entry.value))
            .collect();
        Ok((!pairs.is_empty()).then(|| pairs.join("; ")))
    }

    /// `Set-Cookie` header value that makes a browser drop `name`.
    pub fn removal_header(&self, name: &str) -> String {
        let mut out = format!("{name}=");
        self.attrs.push_attrs(&mut out);
        out.push_str("; Max-Age=0");
        self.attrs.push_flags(&mut out);
        out
    }
}

impl StorageMedium for CookieJar {
    fn kind(&self) -> MediumKind {
        MediumKind::Cookie
    }

    fn get(&self, name: &str) -> PscResult<Option<String>> {
        Ok(self.table.get(name)?.map(|entry| entry.value))
    }

    fn set(&self, name: &str, value: &str, expiry: Option<Duration>) -> PscResult<()> {
        let size = name.len() + value.len();
        if size > self.attrs.max_value_bytes {
            return Err(PscError::Storage(format!(
                "cookie {name:?} is {size} bytes, limit is {}",
                self.attrs.max_value_bytes
            )));
        }
        self.table.insert(
            name,
            Entry {
                value: value.to_string(),
                expires_at_ms: expires_at_ms(expiry),
            },
        )
    }

    fn remove(&self, name: &str) -> PscResult<()> {
        self.table.remove(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let jar = CookieJar::in_memory(CookieAttributes::default());

        jar.set("lms_profile", "abc.def", Some(Duration::from_secs(60)))
            .unwrap();
        assert_eq!(jar.get("lms_profile").unwrap().as_deref(), Some("abc.def"));
        assert!(jar.contains("lms_profile").unwrap());

        jar.remove("lms_profile").unwrap();
        assert_eq!(jar.get("lms_profile").unwrap(), None);
        // idempotent
        jar.remove("lms_profile").unwrap();
    }

    #[test]
    fn test_expired_cookie_is_gone() {
        let jar = CookieJar::in_memory(CookieAttributes::default());
        jar.set("lms_profile", "v", Some(Duration::from_millis(50)))
            .unwrap();
        assert!(jar.contains("lms_profile").unwrap());

        std::thread::sleep(Duration::from_millis(80));
        assert_eq!(jar.get("lms_profile").unwrap(), None);
        assert_eq!(jar.cookie_header().unwrap(), None);
    }

    #[test]
    fn test_oversize_value_rejected() {
        let attrs = CookieAttributes {
            max_value_bytes: 32,
            ..CookieAttributes::default()
        };
        let jar = CookieJar::in_memory(attrs);

        let err = jar.set("lms_profile", &"x".repeat(64), None).unwrap_err();
        assert!(err.to_string().contains("limit"));
        assert_eq!(jar.get("lms_profile").unwrap(), None);
    }

    #[test]
    fn test_set_cookie_header_attributes() {
        let jar = CookieJar::in_memory(CookieAttributes::default());
        jar.set("lms_profile", "n0nce.c1pher", Some(Duration::from_secs(604_800)))
            .unwrap();

        let cookie = jar.cookie("lms_profile").unwrap().unwrap();
        let header = cookie.to_set_cookie_header(jar.attributes());

        assert!(header.starts_with("lms_profile=n0nce.c1pher; Path=/; Max-Age="));
        assert!(header.ends_with("; Secure; SameSite=Strict"));
        let max_age = cookie.max_age_secs().unwrap();
        assert!(max_age <= 604_800 && max_age > 604_700);
    }

    #[test]
    fn test_session_cookie_has_no_max_age() {
        let attrs = CookieAttributes {
            same_site: SameSite::Lax,
            secure: false,
            ..CookieAttributes::default()
        };
        let jar = CookieJar::in_memory(attrs);
        jar.set("lms_profile", "v", None).unwrap();

        let cookie = jar.cookie("lms_profile").unwrap().unwrap();
        assert_eq!(
            cookie.to_set_cookie_header(jar.attributes()),
            "lms_profile=v; Path=/; SameSite=Lax"
        );
    }

    #[test]
    fn test_removal_header() {
        let jar = CookieJar::in_memory(CookieAttributes::default());
        assert_eq!(
            jar.removal_header("lms_profile"),
            "lms_profile=; Path=/; Max-Age=0; Secure; SameSite=Strict"
        );
    }

    #[test]
    fn test_cookie_header_lists_live_cookies() {
        let jar = CookieJar::in_memory(CookieAttributes::default());
        jar.set("b", "2", None).unwrap();
        jar.set("a", "1", None).unwrap();

        assert_eq!(jar.cookie_header().unwrap().as_deref(), Some("a=1; b=2"));
    }

    #[test]
    fn test_persisted_jar() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("cookies.json");

        let jar = CookieJar::open(&path, CookieAttributes::default());
        jar.set("lms_profile", "persisted", Some(Duration::from_secs(60)))
            .unwrap();
        assert_eq!(jar.path(), Some(path.as_path()));
        drop(jar);

        let jar = CookieJar::open(&path, CookieAttributes::default());
        assert_eq!(jar.get("lms_profile").unwrap().as_deref(), Some("persisted"));
    }
}
