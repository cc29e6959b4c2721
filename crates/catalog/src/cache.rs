//! Time-bounded response cache
//!
//! Entries are stamped on insert and checked on read; an entry older than
//! the TTL is evicted by the read that finds it. There is no sweeper task.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// Default lifetime of a cached catalog response.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

struct Entry<V> {
    value: V,
    stored_at: Instant,
}

/// String-keyed cache whose entries expire `ttl` after they were stored.
///
/// An entry is served while `elapsed <= ttl`.
pub struct TtlCache<V> {
    ttl: Duration,
    entries: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value for `key`, evicting it if it has outlived the TTL.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => entry.stored_at.elapsed() > self.ttl,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store `value`, replacing any entry under `key` and restarting its TTL.
    pub fn set(&self, key: impl Into<String>, value: V) {
        self.lock().insert(
            key.into(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    pub fn remove(&self, key: &str) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Number of stored entries, expired or not.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry<V>>> {
        // A panic while holding the lock cannot leave the map inconsistent
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
