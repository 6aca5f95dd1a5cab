//! Entry Table Module
//!
//! In-memory key/value storage. Callers share it as [`SharedTable`]; the
//! table itself is a plain map and relies on the surrounding lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::RwLock;

use crate::cache::CacheEntry;

/// Entry table shared between the cache and its expiry scheduler.
pub type SharedTable = Arc<RwLock<EntryTable>>;

// == Entry Table ==
/// Map from cache key to entry.
#[derive(Debug, Default)]
pub struct EntryTable {
    entries: HashMap<String, CacheEntry>,
}

impl EntryTable {
    // == Constructor ==
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new table for sharing.
    pub fn shared() -> SharedTable {
        Arc::new(RwLock::new(Self::new()))
    }

    // == Insert ==
    /// Stores an entry, returning the one it replaced.
    pub fn insert(&mut self, key: String, entry: CacheEntry) -> Option<CacheEntry> {
        self.entries.insert(key, entry)
    }

    // == Get ==
    /// Returns the entry for `key` whether or not it has expired.
    ///
    /// Expired entries stay visible until a scheduler removes them.
    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    // == Remove ==
    /// Removes an entry by key, returning true if it existed.
    pub fn remove(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    /// Removes `key` only if its current entry has expired at `now`.
    ///
    /// A key rewritten after an expiry record was queued carries a later
    /// deadline and survives.
    pub fn remove_if_expired(&mut self, key: &str, now: Instant) -> bool {
        match self.entries.get(key) {
            Some(entry) if entry.is_expired_at(now) => {
                self.entries.remove(key);
                true
            }
            _ => false,
        }
    }

    // == Cleanup Expired ==
    /// Removes all entries expired at `now`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self, now: Instant) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    // == Length ==
    /// Returns the current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    // == Is Empty ==
    /// Returns true if the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
