// src/services/cache.rs
//
// In-memory TTL cache keyed by normalized query key. There is no background
// sweep: every read performs the freshness check and drops stale entries, so
// memory is bounded by the distinct keys seen within one TTL window.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use log::debug;

use crate::models::PriceRecord;

/// Cache TTL. Mandi prices move slowly; ten minutes keeps us well under the
/// upstream rate limit without serving visibly stale data.
pub const CACHE_TTL: Duration = Duration::from_secs(600);

struct CacheEntry {
    stored_at: Instant,
    records: Vec<PriceRecord>,
}

pub struct PriceCache {
    ttl: Duration,
    map: Mutex<HashMap<String, CacheEntry>>,
}

impl PriceCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            map: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Fresh hit returns a clone of the stored records; a stale hit is a
    /// miss and evicts the entry in the same locked section.
    pub fn get(&self, key: &str) -> Option<Vec<PriceRecord>> {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(key) {
            Some(entry) if entry.stored_at.elapsed() <= self.ttl => {
                debug!("cache hit for {key}");
                Some(entry.records.clone())
            }
            Some(_) => {
                debug!("cache entry for {key} expired, evicting");
                map.remove(key);
                None
            }
            None => None,
        }
    }

    /// Unconditional overwrite.
    pub fn put(&self, key: &str, records: Vec<PriceRecord>) {
        let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(
            key.to_string(),
            CacheEntry {
                stored_at: Instant::now(),
                records,
            },
        );
    }

    /// Number of live-or-stale entries currently held. Diagnostic only.
    pub fn len(&self) -> usize {
        self.map.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new(CACHE_TTL)
    }
}
