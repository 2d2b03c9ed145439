//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with TTL support.

// == Cache Entry ==
/// Represents a single cache entry with value and expiration metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored value
    pub value: String,
    /// Insertion timestamp (UNIX seconds, engine clock)
    pub inserted_at: u64,
    /// Lifetime in seconds, counted from `inserted_at`
    pub ttl_seconds: u16,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new cache entry stamped at `inserted_at`.
    pub fn new(value: String, inserted_at: u64, ttl_seconds: u16) -> Self {
        Self {
            value,
            inserted_at,
            ttl_seconds,
        }
    }

    // == Expires At ==
    /// Timestamp at which the entry stops being readable.
    pub fn expires_at(&self) -> u64 {
        self.inserted_at.saturating_add(u64::from(self.ttl_seconds))
    }

    // == Is Expired ==
    /// Checks if the entry has expired at `now`.
    ///
    /// Boundary condition: an entry is expired once `now >= expires_at`, so a
    /// zero TTL is expired immediately.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_expires_at() {
        let entry = CacheEntry::new("alice".to_string(), 1_000, 5);
        assert_eq!(entry.expires_at(), 1_005);
    }

    #[test]
    fn test_entry_live_before_expiry() {
        let entry = CacheEntry::new("alice".to_string(), 0, 5);
        assert!(!entry.is_expired(0));
        assert!(!entry.is_expired(4));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let entry = CacheEntry::new("alice".to_string(), 0, 5);
        assert!(entry.is_expired(5), "Entry should be expired at boundary");
        assert!(entry.is_expired(6));
    }

    #[test]
    fn test_zero_ttl_is_expired_immediately() {
        let entry = CacheEntry::new("v".to_string(), 42, 0);
        assert!(entry.is_expired(42));
    }

    #[test]
    fn test_expires_at_saturates() {
        let entry = CacheEntry::new("v".to_string(), u64::MAX - 1, 10);
        assert_eq!(entry.expires_at(), u64::MAX);
    }
}
