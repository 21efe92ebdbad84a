//! Public `save` / `load` / `clear` over the selected storage media.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard};

use psc_core::{MediumKind, PscConfig};
use psc_crypto::{decode, derive_key_from_env, encode, DecodeError, SessionKey};
use psc_storage::StorageMedium;

use crate::metrics::SessionMetrics;
use crate::selector::StorageSelector;

/// What a load found, before it is flattened to `Option`.
#[derive(Debug)]
pub enum LoadOutcome {
    /// A blob decoded cleanly
    Hit { value: Value, medium: MediumKind },
    /// No medium holds an entry
    Empty,
    /// A blob was found but could not be decoded; every medium has been cleared
    Corrupt {
        medium: MediumKind,
        error: DecodeError,
    },
}

impl LoadOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            LoadOutcome::Hit { .. } => "hit",
            LoadOutcome::Empty => "empty",
            LoadOutcome::Corrupt { .. } => "corrupt",
        }
    }

    pub fn into_profile(self) -> Option<Value> {
        match self {
            LoadOutcome::Hit { value, .. } => Some(value),
            LoadOutcome::Empty | LoadOutcome::Corrupt { .. } => None,
        }
    }
}

/// Encrypted cache for the signed-in user's profile.
///
/// Holds no global state: the media are injected, and a cache built with
/// [`SessionCache::detached`] (no storage available, e.g. server-side
/// rendering) turns every operation into a no-op.
///
/// Operations are serialized internally, so a load never observes the gap
/// between a save's clear and its write as anything but "no session yet".
/// Ordering between independent callers (a logout racing a profile refresh)
/// remains theirs to arrange.
pub struct SessionCache {
    key: SessionKey,
    entry_name: String,
    selector: Option<StorageSelector>,
    metrics: Option<SessionMetrics>,
    op_lock: Mutex<()>,
}

impl SessionCache {
    /// Cache over the given media, keyed from the secret named in `config`.
    pub fn new(
        config: &PscConfig,
        cookie: Arc<dyn StorageMedium>,
        session: Arc<dyn StorageMedium>,
    ) -> Self {
        Self {
            key: derive_key_from_env(&config.secret.env_var),
            entry_name: config.entry.name.clone(),
            selector: Some(StorageSelector::new(config.retention, cookie, session)),
            metrics: None,
            op_lock: Mutex::new(()),
        }
    }

    /// Cache with no storage behind it: saves and clears do nothing, loads return `None`.
    pub fn detached(config: &PscConfig) -> Self {
        Self {
            key: derive_key_from_env(&config.secret.env_var),
            entry_name: config.entry.name.clone(),
            selector: None,
            metrics: None,
            op_lock: Mutex::new(()),
        }
    }

    /// Replace the environment-derived key.
    pub fn with_key(mut self, key: SessionKey) -> Self {
        self.key = key;
        self
    }

    pub fn with_metrics(mut self, metrics: SessionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn is_attached(&self) -> bool {
        self.selector.is_some()
    }

    pub fn entry_name(&self) -> &str {
        &self.entry_name
    }

    pub fn selector(&self) -> Option<&StorageSelector> {
        self.selector.as_ref()
    }

    /// Cache `profile` under the tier picked by `remember`.
    ///
    /// Every medium is cleared first; `None` stops there (signed out, not an error).
    /// A failed write is logged and leaves the cache empty. If some medium
    /// could not be cleared, nothing is written: its stale entry stays the
    /// only one, never alongside a new blob in another medium.
    pub fn save<T: Serialize + ?Sized>(&self, profile: Option<&T>, remember: bool) {
        let Some(selector) = &self.selector else {
            tracing::trace!("no storage available, save skipped");
            return;
        };
        let _guard = self.lock();

        let failed = selector.clear_all(&self.entry_name);
        if failed > 0 {
            tracing::warn!(failed, "previous session could not be cleared, save abandoned");
            return;
        }

        let Some(profile) = profile else {
            tracing::debug!("no profile given, cached session cleared");
            self.record(|m| m.record_save("none"));
            return;
        };

        let selection = selector.select(remember);
        let blob = match encode(&self.key, profile) {
            Ok(blob) => blob,
            Err(e) => {
                tracing::warn!(policy = %selection.policy, "session not cached: {e}");
                return;
            }
        };

        if let Err(e) =
            selection
                .medium
                .set(&self.entry_name, blob.as_str(), selection.expiry)
        {
            tracing::warn!(
                policy = %selection.policy,
                medium = %selection.medium.kind(),
                "session not cached: {e}"
            );
            return;
        }

        tracing::debug!(
            policy = %selection.policy,
            medium = %selection.medium.kind(),
            expiry_secs = selection.expiry.map(|d| d.as_secs()),
            "session cached"
        );
        self.record(|m| m.record_save(selection.policy.as_str()));
    }

    /// The cached profile, or `None` if there is none or it could not be read.
    pub fn load(&self) -> Option<Value> {
        self.load_outcome().into_profile()
    }

    /// The cached profile deserialized into `T`.
    ///
    /// A blob that decodes but does not fit `T` gives `None` and stays cached;
    /// the blob itself is sound, the caller's shape is not.
    pub fn load_as<T: DeserializeOwned>(&self) -> Option<T> {
        let value = self.load()?;
        match serde_json::from_value(value) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!("cached session does not match the expected profile shape: {e}");
                None
            }
        }
    }

    /// Load with the outcome spelled out.
    ///
    /// The first medium (in priority order) holding an entry decides the
    /// result. If that entry does not decode, every medium is cleared so the
    /// same failure does not come back on the next load.
    pub fn load_outcome(&self) -> LoadOutcome {
        let Some(selector) = &self.selector else {
            return LoadOutcome::Empty;
        };
        let _guard = self.lock();

        let outcome = self.read_first(selector);
        if let LoadOutcome::Corrupt { medium, error } = &outcome {
            tracing::warn!(
                medium = %medium,
                kind = error.kind(),
                "discarding unreadable cached session"
            );
            selector.clear_all(&self.entry_name);
        }

        self.record(|m| m.record_load(outcome.label()));
        outcome
    }

    /// Remove the cached session from every medium. Safe to call when there is none.
    pub fn clear(&self) {
        let Some(selector) = &self.selector else {
            return;
        };
        let _guard = self.lock();

        selector.clear_all(&self.entry_name);
        tracing::debug!("cached session cleared");
        self.record(|m| m.record_clear());
    }

    fn read_first(&self, selector: &StorageSelector) -> LoadOutcome {
        for kind in selector.load_order() {
            let raw = match selector.medium(kind).get(&self.entry_name) {
                Ok(Some(raw)) => raw,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(medium = %kind, "failed to read cached session: {e}");
                    continue;
                }
            };

            return match decode(&self.key, &raw) {
                Ok(value) => LoadOutcome::Hit {
                    value,
                    medium: kind,
                },
                Err(error) => LoadOutcome::Corrupt {
                    medium: kind,
                    error,
                },
            };
        }
        LoadOutcome::Empty
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded data is `()`, so a poisoned lock carries nothing stale
        self.op_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, f: impl FnOnce(&SessionMetrics)) {
        if let Some(metrics) = &self.metrics {
            f(metrics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psc_crypto::KEY_SIZE;
    use psc_storage::{CookieAttributes, CookieJar, SessionStore};
    use serde_json::json;

    fn cache() -> SessionCache {
        SessionCache::new(
            &PscConfig::default(),
            Arc::new(CookieJar::in_memory(CookieAttributes::default())),
            Arc::new(SessionStore::in_memory()),
        )
        .with_key(SessionKey::from_bytes([7u8; KEY_SIZE]))
    }

    #[test]
    fn test_save_then_load() {
        let cache = cache();
        cache.save(Some(&json!({"id": "u1", "role": "Admin"})), true);

        match cache.load_outcome() {
            LoadOutcome::Hit { value, medium } => {
                assert_eq!(value, json!({"id": "u1", "role": "Admin"}));
                assert_eq!(medium, MediumKind::Cookie);
            }
            other => panic!("expected hit, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_outcome() {
        let cache = cache();
        assert!(matches!(cache.load_outcome(), LoadOutcome::Empty));
        assert_eq!(cache.load(), None);
    }

    #[test]
    fn test_load_as_shape_mismatch_keeps_blob() {
        #[derive(serde::Deserialize)]
        #[allow(dead_code)]
        struct Profile {
            id: String,
            role: String,
        }

        let cache = cache();
        cache.save(Some(&json!({"id": 42})), false);

        assert!(cache.load_as::<Profile>().is_none());
        assert_eq!(cache.load(), Some(json!({"id": 42})));
    }

    /// Medium whose removals always fail, standing in for an unwritable store.
    struct StuckMedium(SessionStore);

    impl StorageMedium for StuckMedium {
        fn kind(&self) -> MediumKind {
            MediumKind::Cookie
        }
        fn get(&self, name: &str) -> psc_core::PscResult<Option<String>> {
            self.0.get(name)
        }
        fn set(
            &self,
            name: &str,
            value: &str,
            expiry: Option<std::time::Duration>,
        ) -> psc_core::PscResult<()> {
            self.0.set(name, value, expiry)
        }
        fn remove(&self, _name: &str) -> psc_core::PscResult<()> {
            Err(psc_core::PscError::Storage("read-only".into()))
        }
    }

    #[test]
    fn test_save_abandoned_when_clear_fails() {
        let cookie = Arc::new(StuckMedium(SessionStore::in_memory()));
        let session = Arc::new(SessionStore::in_memory());
        let cache = SessionCache::new(&PscConfig::default(), cookie.clone(), session.clone())
            .with_key(SessionKey::from_bytes([7u8; KEY_SIZE]));

        cache.save(Some(&json!({"id": "old"})), true);
        cache.save(Some(&json!({"id": "new"})), false);

        assert!(cookie.contains("lms_profile").unwrap());
        assert!(!session.contains("lms_profile").unwrap());
        assert_eq!(cache.load(), Some(json!({"id": "old"})));
    }

    #[test]
    fn test_detached_is_noop() {
        let cache = SessionCache::detached(&PscConfig::default());
        assert!(!cache.is_attached());

        cache.save(Some(&json!({"id": "u1"})), true);
        assert_eq!(cache.load(), None);
        cache.clear();
        assert!(matches!(cache.load_outcome(), LoadOutcome::Empty));
    }
}
