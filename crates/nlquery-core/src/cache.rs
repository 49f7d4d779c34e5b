//! Answer cache keyed by normalized question.
//!
//! Lookups are exact-match on the trimmed, lower-cased question. The cache
//! is bounded by entry count: when full, the least recently used entry is
//! evicted before an insert. A capacity of `0` disables eviction.
//!
//! The lock is held only for a single lookup or a single insert, never while
//! an answer is being computed. Two identical questions arriving together
//! may both miss and both compute; the later insert wins.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

use crate::models::AnswerRecord;

/// Default maximum number of cached answers.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Trim and lower-case a question to form its cache key.
pub fn normalize(question: &str) -> String {
    question.trim().to_lowercase()
}

struct CacheEntry {
    record: AnswerRecord,
    /// Access counter value at last use.
    last_access: u64,
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, CacheEntry>,
    clock: u64,
}

impl Entries {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

pub struct AnswerCache {
    entries: Mutex<Entries>,
    stats: Mutex<CacheStats>,
    capacity: usize,
}

impl AnswerCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a cache holding at most `capacity` answers (`0` = unbounded).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            stats: Mutex::new(CacheStats::default()),
            capacity,
        }
    }

    /// Look up the answer stored under `key`.
    pub fn get(&self, key: &str) -> Option<AnswerRecord> {
        let found = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            let now = entries.tick();
            let record = entries.map.get_mut(key).map(|entry| {
                entry.last_access = now;
                entry.record.clone()
            });
            record
        };

        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        if found.is_some() {
            stats.hits += 1;
        } else {
            stats.misses += 1;
        }
        found
    }

    /// Store `record` under `key`, replacing any previous answer.
    pub fn insert(&self, key: String, record: AnswerRecord) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let now = entries.tick();

        if self.capacity > 0 && !entries.map.contains_key(&key) && entries.map.len() >= self.capacity
        {
            let oldest = entries
                .map
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.map.remove(&oldest);
                self.stats
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .evictions += 1;
            }
        }

        entries.map.insert(
            key,
            CacheEntry {
                record,
                last_access: now,
            },
        );
    }

    /// Every cached (normalized) question.
    pub fn keys(&self) -> BTreeSet<String> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.map.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map
            .clear();
    }
}

impl Default for AnswerCache {
    fn default() -> Self {
        Self::new()
    }
}
