//! Cache Store Module
//!
//! Main cache engine: HashMap storage with per-entry TTL expiration.
//!
//! Expiration is lazy: an expired entry is dropped the first time it is looked
//! up. `cleanup_expired` reclaims memory for entries nobody reads again. There
//! is no capacity bound and no LRU/LFU eviction; entries leave the store only
//! by Remove or by expiring.

use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::{CacheEntry, CacheStats, Clock, SystemClock};

// == Cache Store ==
/// Owns every entry of one engine process.
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: HashMap<String, CacheEntry>,
    /// Activity counters
    stats: CacheStats,
    /// Time source for stamping and expiry checks
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store on the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store on the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            clock,
        }
    }

    /// Current time on the store's clock.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    // == Insert ==
    /// Stores a key-value pair stamped with the current time.
    ///
    /// An existing entry under the same key is replaced entirely, including
    /// its timestamp and TTL.
    pub fn insert(&mut self, key: String, value: String, ttl_seconds: u16) {
        let entry = CacheEntry::new(value, self.clock.now(), ttl_seconds);
        self.entries.insert(key, entry);

        self.stats.record_insert();
        self.stats.set_total_entries(self.entries.len());
    }

    // == Get ==
    /// Retrieves a live value by key.
    ///
    /// Returns `None` for absent keys and for expired entries; an expired
    /// entry is removed as part of the lookup.
    pub fn get(&mut self, key: &str) -> Option<String> {
        let now = self.clock.now();

        match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                self.entries.remove(key);
                self.stats.record_expirations(1);
                self.stats.set_total_entries(self.entries.len());
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                let value = entry.value.clone();
                self.stats.record_hit();
                Some(value)
            }
            None => {
                self.stats.record_miss();
                None
            }
        }
    }

    // == Remove ==
    /// Removes an entry by key.
    ///
    /// Idempotent: removing an absent or expired key is not an error.
    /// Returns `true` only when a live entry was deleted.
    pub fn remove(&mut self, key: &str) -> bool {
        let removed_live = match self.entries.remove(key) {
            Some(entry) if entry.is_expired(self.clock.now()) => {
                self.stats.record_expirations(1);
                false
            }
            Some(_) => {
                self.stats.record_removal();
                true
            }
            None => false,
        };

        self.stats.set_total_entries(self.entries.len());
        removed_live
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();

        self.entries.retain(|_, entry| !entry.is_expired(now));

        let removed = before - self.entries.len();
        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    // == Length ==
    /// Returns the number of stored entries, including expired ones not yet reclaimed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;

    fn store_at(start: u64) -> (CacheStore, ManualClock) {
        let clock = ManualClock::new(start);
        (CacheStore::with_clock(Arc::new(clock.clone())), clock)
    }

    #[test]
    fn test_store_new() {
        let store = CacheStore::new();
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_store_insert_and_get() {
        let (mut store, _) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 60);

        assert_eq!(store.get("key1").as_deref(), Some("value1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_get_nonexistent() {
        let (mut store, _) = store_at(0);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_store_overwrite_resets_clock() {
        let (mut store, clock) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 5);
        clock.set(4);
        store.insert("key1".to_string(), "value2".to_string(), 5);

        // The first TTL would have expired at t=5
        clock.set(6);
        assert_eq!(store.get("key1").as_deref(), Some("value2"));
        assert_eq!(store.len(), 1);

        clock.set(9);
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_overwrite_can_shorten_ttl() {
        let (mut store, clock) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 100);
        store.insert("key1".to_string(), "value2".to_string(), 1);

        clock.set(1);
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_lazy_expiration() {
        let (mut store, clock) = store_at(0);

        store.insert("user:1".to_string(), "alice".to_string(), 5);

        clock.set(3);
        assert_eq!(store.get("user:1").as_deref(), Some("alice"));

        clock.set(6);
        assert_eq!(store.get("user:1"), None);
        assert!(store.is_empty(), "Expired entry should be dropped on access");
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_expired_entry_kept_until_accessed() {
        let (mut store, clock) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 1);
        clock.set(10);

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key1"), None);
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_store_remove_is_idempotent() {
        let (mut store, _) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 60);

        assert!(store.remove("key1"));
        assert!(!store.remove("key1"));
        assert!(!store.remove("never-there"));
        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_store_remove_expired_entry() {
        let (mut store, clock) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 5);
        clock.set(6);

        assert!(!store.remove("key1"));
        assert!(store.is_empty());

        let stats = store.stats();
        assert_eq!(stats.expirations, 1);
        assert_eq!(stats.removals, 0);
    }

    #[test]
    fn test_store_stats() {
        let (mut store, _) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 60);
        store.get("key1"); // hit
        store.get("nonexistent"); // miss
        store.remove("key1");

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.inserts, 1);
        assert_eq!(stats.removals, 1);
        assert_eq!(stats.total_entries, 0);
    }

    #[test]
    fn test_store_cleanup_expired() {
        let (mut store, clock) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 1);
        store.insert("key2".to_string(), "value2".to_string(), 10);

        clock.set(2);

        let removed = store.cleanup_expired();
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.get("key2").as_deref(), Some("value2"));
        assert_eq!(store.stats().expirations, 1);
    }

    #[test]
    fn test_store_cleanup_nothing_expired() {
        let (mut store, _) = store_at(0);

        store.insert("key1".to_string(), "value1".to_string(), 10);
        assert_eq!(store.cleanup_expired(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_store_scenario() {
        let (mut store, clock) = store_at(0);

        store.insert("user:1".to_string(), "alice".to_string(), 5);

        clock.set(3);
        assert_eq!(store.get("user:1").as_deref(), Some("alice"));

        clock.set(6);
        assert_eq!(store.get("user:1"), None);
        assert!(!store.remove("user:1"));
        assert!(!store.remove("user:1"));
    }
}
