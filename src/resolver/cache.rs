//! Cross-request results cache for data connectors
//!
//! Distinct from per-context memoization: the context prevents duplicate
//! work within one request, this cache short-circuits the external call
//! across different requests that fingerprint identically.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::warn;

use crate::attribute::Attribute;

#[derive(Debug, Clone)]
struct CacheEntry {
    attributes: HashMap<String, Attribute>,
    inserted_at: DateTime<Utc>,
}

/// Thread-safe, size- and time-bounded cache of raw connector results,
/// keyed by a connector-specific request fingerprint.
///
/// Owned by a [`super::DataConnector`]; lifetime equals the graph's.
/// Safe for concurrent use across simultaneous resolution contexts.
#[derive(Debug)]
pub struct ResultsCache {
    entries: DashMap<String, CacheEntry>,
    max_entries: usize,
    ttl: Duration,
}

impl ResultsCache {
    /// Create a cache bounded by entry count and time-to-live
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            max_entries,
            ttl,
        }
    }

    /// Look up a fingerprint, dropping the entry if it has expired
    pub fn get(&self, fingerprint: &str) -> Option<HashMap<String, Attribute>> {
        let expired = match self.entries.get(fingerprint) {
            Some(entry) => {
                if Utc::now() - entry.inserted_at < self.ttl {
                    return Some(entry.attributes.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(fingerprint);
        }
        None
    }

    /// Store a result, evicting expired entries first and then the
    /// oldest entry if the cache is still at capacity. A zero-capacity
    /// cache stores nothing.
    pub fn insert(&self, fingerprint: impl Into<String>, attributes: HashMap<String, Attribute>) {
        if self.max_entries == 0 {
            return;
        }
        let fingerprint = fingerprint.into();
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&fingerprint) {
            self.evict();
        }
        self.entries.insert(
            fingerprint,
            CacheEntry {
                attributes,
                inserted_at: Utc::now(),
            },
        );
    }

    /// Number of live entries (expired entries may still be counted
    /// until touched or evicted)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn evict(&self) {
        let now = Utc::now();
        self.entries.retain(|_, entry| now - entry.inserted_at < self.ttl);

        while self.entries.len() >= self.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.inserted_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    warn!(fingerprint = %key, "results cache full; evicting oldest entry");
                    self.entries.remove(&key);
                }
                None => break,
            }
        }
    }
}
