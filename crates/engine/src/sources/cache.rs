use std::collections::HashMap;
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use neo_common::types::{QueryResult, SourceId};

/// In-memory TTL cache for remote query results.
///
/// Bounded at `capacity` entries; when an insert would exceed the bound the
/// oldest half (by insertion time) is evicted. Keyed by a digest of the
/// source tag and the normalized (trimmed, lowercased) SQL text — the
/// normalization applies to the key only, never to the transported query.
pub struct QueryCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

struct CacheEntry {
    result: QueryResult,
    inserted_at: Instant,
}

/// Digest key for a (source, sql) pair.
pub fn cache_key(source: SourceId, sql: &str) -> String {
    let normalized = format!("{}:{}", source.as_str(), sql.trim().to_lowercase());
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

impl QueryCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
            capacity,
        }
    }

    /// Get a cached result if present and not expired.
    pub fn get(&self, key: &str) -> Option<QueryResult> {
        if let Some(entry) = self.entries.get(key) {
            if entry.inserted_at.elapsed() < self.ttl {
                metrics::counter!("sql.cache.hit").increment(1);
                return Some(entry.result.clone());
            }
        }
        metrics::counter!("sql.cache.miss").increment(1);
        None
    }

    /// Insert a result, evicting the oldest half when the cache is full.
    pub fn insert(&mut self, key: String, result: QueryResult) {
        if self.entries.len() >= self.capacity {
            self.evict_oldest_half();
        }

        self.entries.insert(
            key,
            CacheEntry {
                result,
                inserted_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn evict_oldest_half(&mut self) {
        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.inserted_at))
            .collect();
        by_age.sort_by_key(|(_, inserted_at)| *inserted_at);

        let evict_count = self.entries.len() / 2;
        for (key, _) in by_age.into_iter().take(evict_count) {
            self.entries.remove(&key);
        }
        metrics::counter!("sql.cache.evictions").increment(evict_count as u64);
    }
}
