//! In-memory time-bounded cache for upstream responses.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Expiry used when a TTL reaches past what `Instant` can represent.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// A cached value and the instant after which it must not be served.
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

/// Key/value store where every entry carries its own time-to-live.
///
/// Expired entries are dropped lazily, on the next `get` for their key. There
/// is no size bound and no background sweep.
#[derive(Debug)]
pub struct TtlCache<V> {
    entries: RwLock<HashMap<String, CacheEntry<V>>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    /// Create an empty cache.
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            default_ttl,
        }
    }

    /// Default time-to-live applied when `set` is given none.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Get a live value, evicting the entry if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entries = self.entries.read();
            match entries.get(key) {
                None => return None,
                Some(entry) if now <= entry.expires_at => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write();
        // A concurrent `set` may have refreshed the entry since the read lock
        // was released.
        if entries.get(key).is_some_and(|e| now > e.expires_at) {
            entries.remove(key);
        }
        None
    }

    /// Store a value, overwriting any previous entry for the key.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .or_else(|| now.checked_add(FAR_FUTURE))
            .unwrap_or(now);
        let entry = CacheEntry { value, expires_at };
        self.entries.write().insert(key.into(), entry);
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn get_returns_value_before_expiry() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.set("k", 7, Some(Duration::from_secs(5)));
        assert_eq!(cache.get("k"), Some(7));
        assert_eq!(cache.get("k"), Some(7));
    }

    #[test]
    fn missing_key_is_absent() {
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(30));
        assert_eq!(cache.get("nope"), None);
    }

    #[test]
    fn expired_entry_is_evicted_and_stays_gone() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.set("k", "v".to_string(), Some(Duration::from_millis(20)));
        std::thread::sleep(Duration::from_millis(40));

        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn default_ttl_applies_when_none_given() {
        let cache = TtlCache::new(Duration::from_millis(20));
        cache.set("k", 1, None);
        assert_eq!(cache.get("k"), Some(1));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn huge_ttl_does_not_overflow() {
        let cache = TtlCache::new(Duration::from_secs(u64::MAX));
        cache.set("k", 1, None);
        cache.set("j", 2, Some(Duration::MAX));
        assert_eq!(cache.get("k"), Some(1));
        assert_eq!(cache.get("j"), Some(2));
    }

    #[test]
    fn set_overwrites_and_refreshes() {
        let cache = TtlCache::new(Duration::from_secs(30));
        cache.set("k", 1, Some(Duration::from_millis(20)));
        cache.set("k", 2, Some(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(40));
        assert_eq!(cache.get("k"), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn concurrent_access_is_consistent() {
        let cache = Arc::new(TtlCache::new(Duration::from_secs(30)));
        let handles: Vec<_> = (0..8)
            .map(|n| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..200 {
                        cache.set(format!("key-{}", i % 10), n, None);
                        let _ = cache.get(&format!("key-{}", (i + 3) % 10));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 10);
        for i in 0..10 {
            assert!(cache.get(&format!("key-{}", i)).is_some());
        }
    }
}
