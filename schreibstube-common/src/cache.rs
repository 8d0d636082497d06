//! Time-bounded cache for rendered pages.
//!
//! Entries are served unchanged until their TTL runs out, no matter what happened to the
//! data they were rendered from. Expired entries are dropped lazily, on lookup of their key
//! and on every insert.

use crate::clock::{Clock, SystemClock};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use time::{Duration, OffsetDateTime};
use tracing::warn;

#[derive(Clone, Debug)]
struct CacheEntry<V> {
    value: V,
    expires_at: OffsetDateTime,
}

#[derive(Debug)]
pub struct PageCache<V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> PageCache<V> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    #[must_use]
    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries("get");

        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let now = self.clock.now();
        let mut entries = self.entries("insert");
        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Number of stored entries, expired ones included until they are dropped.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries("len").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn invalidate(&self, key: &str) {
        self.entries("invalidate").remove(key);
    }

    pub fn clear(&self) {
        self.entries("clear").clear();
    }

    fn entries(&self, op: &'static str) -> MutexGuard<'_, HashMap<String, CacheEntry<V>>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!(op, "Recovered from poisoned page cache lock");
            poisoned.into_inner()
        })
    }
}
