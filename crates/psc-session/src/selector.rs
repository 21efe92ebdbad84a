//! Storage tier selection: which medium a save writes to, and the order loads read in.

use std::sync::Arc;
use std::time::Duration;

use psc_core::{MediumKind, RetentionConfig, RetentionPolicy};
use psc_storage::StorageMedium;

/// Where a save goes
pub struct Selection<'a> {
    pub policy: RetentionPolicy,
    pub medium: &'a dyn StorageMedium,
    pub expiry: Option<Duration>,
}

/// Maps retention tiers onto the two media through an explicit table.
pub struct StorageSelector {
    retention: RetentionConfig,
    cookie: Arc<dyn StorageMedium>,
    session: Arc<dyn StorageMedium>,
}

impl StorageSelector {
    pub fn new(
        retention: RetentionConfig,
        cookie: Arc<dyn StorageMedium>,
        session: Arc<dyn StorageMedium>,
    ) -> Self {
        if cookie.kind() != MediumKind::Cookie || session.kind() != MediumKind::Session {
            tracing::warn!(
                cookie_slot = %cookie.kind(),
                session_slot = %session.kind(),
                "storage media passed in unexpected slots"
            );
        }
        Self {
            retention,
            cookie,
            session,
        }
    }

    pub fn retention(&self) -> &RetentionConfig {
        &self.retention
    }

    pub fn medium(&self, kind: MediumKind) -> &dyn StorageMedium {
        match kind {
            MediumKind::Cookie => self.cookie.as_ref(),
            MediumKind::Session => self.session.as_ref(),
        }
    }

    /// Resolve the "remember me" flag to a tier, its medium and its expiry.
    pub fn select(&self, remember: bool) -> Selection<'_> {
        let policy = RetentionPolicy::from_remember(remember);
        let rule = self.retention.rule(policy);
        Selection {
            policy,
            medium: self.medium(rule.medium),
            expiry: rule.expiry(),
        }
    }

    /// Media in read priority order, each listed once.
    ///
    /// The ephemeral tier's medium comes first: it reflects the current
    /// browsing context more closely than a cookie shared across tabs.
    pub fn load_order(&self) -> Vec<MediumKind> {
        let mut order = Vec::with_capacity(2);
        for kind in [
            self.retention.ephemeral.medium,
            self.retention.persistent.medium,
            MediumKind::Session,
            MediumKind::Cookie,
        ] {
            if !order.contains(&kind) {
                order.push(kind);
            }
        }
        order
    }

    /// Remove `name` from every medium. Keeps going past failures and returns
    /// how many media could not be cleared.
    pub fn clear_all(&self, name: &str) -> usize {
        let mut failed = 0;
        for kind in [MediumKind::Cookie, MediumKind::Session] {
            if let Err(e) = self.medium(kind).remove(name) {
                tracing::warn!(medium = %kind, "failed to clear cached session: {e}");
                failed += 1;
            }
        }
        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use psc_storage::{CookieAttributes, CookieJar, SessionStore};

    fn selector(retention: RetentionConfig) -> StorageSelector {
        StorageSelector::new(
            retention,
            Arc::new(CookieJar::in_memory(CookieAttributes::default())),
            Arc::new(SessionStore::in_memory()),
        )
    }

    #[test]
    fn test_hybrid_selection() {
        let sel = selector(RetentionConfig::hybrid());

        let persistent = sel.select(true);
        assert_eq!(persistent.policy, RetentionPolicy::Persistent);
        assert_eq!(persistent.medium.kind(), MediumKind::Cookie);
        assert_eq!(persistent.expiry, Some(Duration::from_secs(7 * 24 * 3600)));

        let ephemeral = sel.select(false);
        assert_eq!(ephemeral.policy, RetentionPolicy::Ephemeral);
        assert_eq!(ephemeral.medium.kind(), MediumKind::Session);
        assert_eq!(ephemeral.expiry, None);
    }

    #[test]
    fn test_cookie_only_selection() {
        let sel = selector(RetentionConfig::cookie_only());

        assert_eq!(sel.select(true).medium.kind(), MediumKind::Cookie);
        let ephemeral = sel.select(false);
        assert_eq!(ephemeral.medium.kind(), MediumKind::Cookie);
        assert_eq!(ephemeral.expiry, Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_load_order_ephemeral_first() {
        assert_eq!(
            selector(RetentionConfig::hybrid()).load_order(),
            vec![MediumKind::Session, MediumKind::Cookie]
        );
        assert_eq!(
            selector(RetentionConfig::cookie_only()).load_order(),
            vec![MediumKind::Cookie, MediumKind::Session]
        );
    }

    #[test]
    fn test_clear_all_empties_both_media() {
        let sel = selector(RetentionConfig::hybrid());
        sel.medium(MediumKind::Cookie)
            .set("lms_profile", "a", None)
            .unwrap();
        sel.medium(MediumKind::Session)
            .set("lms_profile", "b", None)
            .unwrap();

        assert_eq!(sel.clear_all("lms_profile"), 0);
        assert!(!sel.medium(MediumKind::Cookie).contains("lms_profile").unwrap());
        assert!(!sel.medium(MediumKind::Session).contains("lms_profile").unwrap());

        // nothing left to clear is still fine
        assert_eq!(sel.clear_all("lms_profile"), 0);
    }
}
