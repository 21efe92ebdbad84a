//! Entry table shared by the concrete media, optionally mirrored to a JSON file.
//!
//! The table is loaded once on open and flushed atomically (temp + rename)
//! after every mutation; a mutation whose flush fails is not applied. A backing file that cannot be read or parsed is
//! treated as empty: a damaged store must not keep failing every later read.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use psc_core::{PscError, PscResult};

use crate::medium::now_ms;

/// A stored value and its absolute expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Entry {
    pub value: String,
    /// Epoch milliseconds after which the entry is gone; `None` = no expiry
    #[serde(default)]
    pub expires_at_ms: Option<u64>,
}

impl Entry {
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms >= at)
    }
}

pub(crate) struct EntryTable {
    label: &'static str,
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, Entry>>,
}

impl EntryTable {
    pub fn in_memory(label: &'static str) -> Self {
        Self {
            label,
            path: None,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn open(label: &'static str, path: &Path) -> Self {
        let entries = load_entries(label, path);
        Self {
            label,
            path: Some(path.to_path_buf()),
            entries: Mutex::new(entries),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Live entry under `name`; an expired one is evicted on the way out.
    pub fn get(&self, name: &str) -> PscResult<Option<Entry>> {
        let mut entries = self.lock()?;
        match entries.get(name) {
            None => return Ok(None),
            Some(entry) if !entry.is_expired_at(now_ms()) => return Ok(Some(entry.clone())),
            Some(_) => {}
        }

        match self.commit(&mut entries, |next| {
            next.remove(name);
        }) {
            Ok(()) => tracing::debug!(medium = self.label, name, "evicted expired entry"),
            // Still expired, so still reads as absent; eviction is retried next time
            Err(e) => tracing::warn!(medium = self.label, name, "failed to evict expired entry: {e}"),
        }
        Ok(None)
    }

    pub fn insert(&self, name: &str, entry: Entry) -> PscResult<()> {
        let mut entries = self.lock()?;
        self.commit(&mut entries, |next| {
            next.insert(name.to_string(), entry);
        })
    }

    pub fn remove(&self, name: &str) -> PscResult<()> {
        let mut entries = self.lock()?;
        if !entries.contains_key(name) {
            return Ok(());
        }
        self.commit(&mut entries, |next| {
            next.remove(name);
        })
    }

    /// All live entries, sorted by name
    pub fn live_entries(&self) -> PscResult<Vec<(String, Entry)>> {
        let entries = self.lock()?;
        let now = now_ms();
        let mut live: Vec<(String, Entry)> = entries
            .iter()
            .filter(|(_, e)| !e.is_expired_at(now))
            .map(|(k, e)| (k.clone(), e.clone()))
            .collect();
        live.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(live)
    }

    fn lock(&self) -> PscResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| PscError::Storage(format!("{} lock poisoned", self.label)))
    }

    /// Apply `mutate` to a copy, persist the copy, then swap it in.
    ///
    /// On a failed write the in-memory table keeps its previous contents,
    /// so memory never claims an entry the backing file does not hold.
    fn commit(
        &self,
        entries: &mut HashMap<String, Entry>,
        mutate: impl FnOnce(&mut HashMap<String, Entry>),
    ) -> PscResult<()> {
        let mut next = entries.clone();
        mutate(&mut next);
        if let Some(path) = &self.path {
            store_entries(path, &next)?;
        }
        *entries = next;
        Ok(())
    }
}

fn load_entries(label: &str, path: &Path) -> HashMap<String, Entry> {
    if !path.exists() {
        return HashMap::new();
    }
    let parsed = std::fs::read_to_string(path)
        .map_err(PscError::from)
        .and_then(|content| serde_json::from_str(&content).map_err(PscError::from));
    match parsed {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(
                medium = label,
                path = %path.display(),
                "discarding unreadable store: {e}"
            );
            HashMap::new()
        }
    }
}

/// Write `entries` to `path` atomically (temp file + rename).
fn store_entries(path: &Path, entries: &HashMap<String, Entry>) -> PscResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_vec_pretty(entries)?;
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, json)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
