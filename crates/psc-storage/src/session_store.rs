//! Session-scoped medium: entries end with the browsing context.
//!
//! No expiry is needed for that, but one is honoured when given, so a
//! cookie-less short-lived tier can still be time-bounded.

use std::path::Path;
use std::time::Duration;

use psc_core::{MediumKind, PscResult};

use crate::medium::{expires_at_ms, StorageMedium};
use crate::persist::{Entry, EntryTable};

pub struct SessionStore {
    table: EntryTable,
}

impl SessionStore {
    pub fn in_memory() -> Self {
        Self {
            table: EntryTable::in_memory("session"),
        }
    }

    /// Open a store persisted at `path`. Put it somewhere that does not
    /// outlive the session it stands for (a runtime or temp directory).
    pub fn open(path: &Path) -> Self {
        Self {
            table: EntryTable::open("session", path),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.table.path()
    }

    /// Names of all live entries
    pub fn keys(&self) -> PscResult<Vec<String>> {
        Ok(self
            .table
            .live_entries()?
            .into_iter()
            .map(|(name, _)| name)
            .collect())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl StorageMedium for SessionStore {
    fn kind(&self) -> MediumKind {
        MediumKind::Session
    }

    fn get(&self, name: &str) -> PscResult<Option<String>> {
        Ok(self.table.get(name)?.map(|entry| entry.value))
    }

    fn set(&self, name: &str, value: &str, expiry: Option<Duration>) -> PscResult<()> {
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
