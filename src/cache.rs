//! Time-boxed result cache.
//!
//! Keyed, TTL-bounded memoization in front of the collection/detection
//! pipeline. All state sits behind a single mutex that is held only for
//! the duration of the map operation — callers recompute outside the
//! lock and `set` afterwards, so concurrent misses on the same key may
//! redundantly recompute. Entries expire lazily on read and can be
//! swept eagerly with `cleanup_expired`.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// An opaque cached value with its creation and expiry instants.
/// Owned exclusively by the cache; never handed out by reference.
#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    #[allow(dead_code)]
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Read-only snapshot of cache occupancy.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub default_ttl_secs: i64,
}

/// In-memory TTL cache for pipeline results.
pub struct QuoteCache {
    default_ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QuoteCache {
    /// Create a cache with the given default time-to-live.
    pub fn new(default_ttl: std::time::Duration) -> Self {
        Self {
            default_ttl: Duration::from_std(default_ttl)
                .unwrap_or_else(|_| Duration::seconds(300)),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Build a deterministic cache key from query parameters. Identical
    /// logical queries collide on the same key.
    pub fn key(parts: &[&str]) -> String {
        parts.join(":")
    }

    /// Get a value. Expired entries are treated as absent and removed
    /// as a side effect of the read.
    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Insert a value under the default TTL.
    pub fn set(&self, key: impl Into<String>, value: Value) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert a value with an explicit TTL. The absolute expiry instant
    /// is fixed at insertion time.
    pub fn set_with_ttl(&self, key: impl Into<String>, value: Value, ttl: Duration) {
        let now = Utc::now();
        let entry = CacheEntry {
            value,
            created_at: now,
            expires_at: now + ttl,
        };
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .insert(key.into(), entry);
    }

    /// Remove one key. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries
            .lock()
            .expect("cache lock poisoned")
            .remove(key)
            .is_some()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.lock().expect("cache lock poisoned").clear();
    }

    /// Eagerly remove all expired entries. Returns how many were swept.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        before - entries.len()
    }

    /// Occupancy counts. A read-only scan; expired-but-unread entries
    /// are reported as expired, not active.
    pub fn stats(&self) -> CacheStats {
        let now = Utc::now();
        let entries = self.entries.lock().expect("cache lock poisoned");
        let total = entries.len();
        let expired = entries.values().filter(|e| e.is_expired(now)).count();
        CacheStats {
            total_entries: total,
            active_entries: total - expired,
            expired_entries: expired,
            default_ttl_secs: self.default_ttl.num_seconds(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
