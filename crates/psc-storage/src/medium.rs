use std::time::{Duration, SystemTime, UNIX_EPOCH};

use psc_core::{MediumKind, PscResult};

/// A named-entry store the session cache can read, write and evict.
///
/// Implementations use interior mutability so one medium can be shared
/// between the cache and whoever else needs to look at it.
pub trait StorageMedium: Send + Sync {
    /// Which physical location this medium stands for.
    fn kind(&self) -> MediumKind;
    /// Current value of `name`, or `None` if absent or expired.
    fn get(&self, name: &str) -> PscResult<Option<String>>;
    /// Write `value` under `name`; `expiry` of `None` keeps it for the medium's lifetime.
    fn set(&self, name: &str, value: &str, expiry: Option<Duration>) -> PscResult<()>;
    /// Remove `name`. Removing a missing entry is not an error.
    fn remove(&self, name: &str) -> PscResult<()>;

    /// Whether a live entry exists under `name`.
    fn contains(&self, name: &str) -> PscResult<bool> {
        Ok(self.get(name)?.is_some())
    }
}

/// Milliseconds since the Unix epoch
pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Absolute expiry in epoch milliseconds for a relative `expiry`.
///
/// Saturates at `u64::MAX`, so an absurdly long expiry means "never" rather
/// than wrapping into the past.
pub(crate) fn expires_at_ms(expiry: Option<Duration>) -> Option<u64> {
    expiry.map(|d| {
        let millis = u64::try_from(d.as_millis()).unwrap_or(u64::MAX);
        now_ms().saturating_add(millis)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expires_at_relative_to_now() {
        let before = now_ms();
        let at = expires_at_ms(Some(Duration::from_secs(60))).unwrap();
        assert!(at >= before + 60_000);
        assert_eq!(expires_at_ms(None), None);
    }

    #[test]
    fn test_huge_expiry_saturates() {
        let at = expires_at_ms(Some(Duration::from_secs(u64::MAX))).unwrap();
        assert_eq!(at, u64::MAX);
        assert!(at > now_ms());
    }
}
