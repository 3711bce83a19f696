//! In-memory TTL cache
//!
//! Provides a `Cache` that stores cloned values with a per-entry time-to-live.
//! Expired entries are dropped lazily when looked up; there is no background
//! eviction.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// A cached value with the time it was stored and how long it stays fresh
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The cached value
    pub value: T,
    /// When the value was stored
    pub stored_at: DateTime<Utc>,
    /// How long the value stays fresh after `stored_at`
    pub ttl: Duration,
}

impl<T> CacheEntry<T> {
    /// Returns true once more than `ttl` has elapsed since `stored_at`
    ///
    /// An entry read exactly at `stored_at + ttl` is still fresh. A `now`
    /// earlier than `stored_at` means the wall clock moved backwards, and the
    /// entry counts as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let age_ms = (now - self.stored_at).num_milliseconds();
        if age_ms < 0 {
            return true;
        }
        let ttl_ms = i64::try_from(self.ttl.as_millis()).unwrap_or(i64::MAX);
        age_ms > ttl_ms
    }
}

/// Key-value store with per-entry expiry
///
/// The map sits behind a mutex so a lookup with its expiry check, or an
/// overwrite, is a single critical section. The lock is never held across an
/// `.await`.
#[derive(Debug)]
pub struct Cache<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for Cache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Cache<T> {
    /// Creates an empty cache
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, CacheEntry<T>>> {
        // Writes only insert or remove whole entries, so a poisoned map is
        // still consistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a value, replacing any previous entry for the key
    pub fn put(&self, key: impl Into<String>, value: T, ttl: Duration) {
        let entry = CacheEntry {
            value,
            stored_at: Utc::now(),
            ttl,
        };
        self.lock().insert(key.into(), entry);
    }

    /// Removes every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, fresh or not
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of stored entries that have not expired yet
    pub fn fresh_len(&self) -> usize {
        let now = Utc::now();
        self.lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }
}

impl<T: Clone> Cache<T> {
    /// Returns a clone of the value if present and fresh
    ///
    /// An expired entry is removed and reported as missing.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = Utc::now();
        let mut entries = self.lock();

        match entries.get(key) {
            Some(entry) if !entry.is_expired(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_get_returns_none_for_missing_key() {
        let cache: Cache<String> = Cache::new();
        assert!(cache.get("nonexistent_key").is_none());
    }

    #[test]
    fn test_put_then_get_returns_value() {
        let cache = Cache::new();
        cache.put("menus:abc", vec!["dashboard".to_string()], Duration::from_secs(60));

        assert_eq!(cache.get("menus:abc"), Some(vec!["dashboard".to_string()]));
    }

    #[test]
    fn test_entry_expires_after_ttl() {
        let cache = Cache::new();
        cache.put("perm", true, Duration::from_millis(100));

        assert_eq!(cache.get("perm"), Some(true));

        thread::sleep(Duration::from_millis(150));

        assert_eq!(cache.get("perm"), None);
    }

    #[test]
    fn test_expired_entry_is_removed_on_lookup() {
        let cache = Cache::new();
        cache.put("stale", 1, Duration::ZERO);
        thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.fresh_len(), 0);
        assert!(cache.get("stale").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_overwrites_existing_entry() {
        let cache = Cache::new();
        cache.put("key", 1, Duration::from_secs(60));
        cache.put("key", 2, Duration::from_secs(60));

        assert_eq!(cache.get("key"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_removes_all_entries() {
        let cache = Cache::new();
        cache.put("a", 1, Duration::from_secs(60));
        cache.put("b", 2, Duration::from_secs(60));
        assert_eq!(cache.len(), 2);

        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_is_expired_boundary() {
        let stored_at = Utc::now();
        let entry = CacheEntry {
            value: (),
            stored_at,
            ttl: Duration::from_millis(100),
        };

        assert!(!entry.is_expired(stored_at));
        assert!(!entry.is_expired(stored_at + chrono::Duration::milliseconds(100)));
        assert!(entry.is_expired(stored_at + chrono::Duration::milliseconds(101)));
    }

    #[test]
    fn test_backward_clock_jump_expires_entry() {
        let stored_at = Utc::now();
        let entry = CacheEntry {
            value: (),
            stored_at,
            ttl: Duration::from_secs(60),
        };

        assert!(entry.is_expired(stored_at - chrono::Duration::hours(1)));
    }

    #[test]
    fn test_fresh_len_counts_only_unexpired() {
        let cache = Cache::new();
        cache.put("fresh", 1, Duration::from_secs(60));
        cache.put("stale", 2, Duration::ZERO);
        thread::sleep(Duration::from_millis(10));

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.fresh_len(), 1);
    }
}
