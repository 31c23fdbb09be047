// TTL'd search-response cache sitting in front of the supplier fan-out.
// Keys are the normalized search request; entries expire on read and the
// oldest entry is evicted when the capacity cap is hit.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::RwLock;

use crate::config::CacheConfig;
use crate::model::{FlightOffer, FlightSearchRequest};

#[derive(Debug, Default)]
pub struct CacheStats {
    pub hit_count: AtomicUsize,
    pub miss_count: AtomicUsize,
    pub eviction_count: AtomicUsize,
    pub expired_count: AtomicUsize,
}

/// Plain snapshot of [`CacheStats`] for callers.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStatsReport {
    pub entries: usize,
    pub hit_count: usize,
    pub miss_count: usize,
    pub eviction_count: usize,
    pub expired_count: usize,
}

struct CacheEntry {
    offers: Vec<FlightOffer>,
    stored_at: Instant,
}

pub struct SearchCache {
    entries: DashMap<String, CacheEntry>,
    config: RwLock<CacheConfig>,
    stats: CacheStats,
}

/// Cache key for a search request. Excludes the supplier subset: subset
/// searches bypass the cache entirely.
pub fn cache_key(request: &FlightSearchRequest) -> String {
    format!(
        "{}:{}:{}:{}:{}:{}:{}:{:?}:{}:{}:{:?}:{}:{}",
        request.origin,
        request.destination,
        request.departure_date,
        request
            .return_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string()),
        request.adults,
        request.children,
        request.infants,
        request.cabin_class,
        request.currency,
        request.direct_only,
        request.max_stops,
        request.preferred_airlines.join(","),
        request.excluded_airlines.join(","),
    )
}

impl SearchCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            config: RwLock::new(config),
            stats: CacheStats::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<Vec<FlightOffer>> {
        let ttl = self.config.read().ttl();
        if let Some(entry) = self.entries.get(key) {
            if entry.stored_at.elapsed() <= ttl {
                self.stats.hit_count.fetch_add(1, Ordering::Relaxed);
                return Some(entry.offers.clone());
            }
        } else {
            self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
            return None;
        }
        // Expired: drop the entry outside the read guard.
        self.entries.remove(key);
        self.stats.expired_count.fetch_add(1, Ordering::Relaxed);
        self.stats.miss_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn store(&self, key: String, offers: Vec<FlightOffer>) {
        let max_entries = self.config.read().max_entries;
        if max_entries == 0 {
            return;
        }
        while self.entries.len() >= max_entries && !self.entries.contains_key(&key) {
            self.evict_oldest();
        }
        self.entries.insert(
            key,
            CacheEntry {
                offers,
                stored_at: Instant::now(),
            },
        );
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.value().stored_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            if self.entries.remove(&key).is_some() {
                self.stats.eviction_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Drop every cached search. Returns the number of removed entries.
    pub fn invalidate_all(&self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn set_config(&self, config: CacheConfig) {
        *self.config.write() = config;
        let max_entries = config.max_entries;
        while self.entries.len() > max_entries {
            self.evict_oldest();
        }
    }

    pub fn stats(&self) -> CacheStatsReport {
        CacheStatsReport {
            entries: self.entries.len(),
            hit_count: self.stats.hit_count.load(Ordering::Relaxed),
            miss_count: self.stats.miss_count.load(Ordering::Relaxed),
            eviction_count: self.stats.eviction_count.load(Ordering::Relaxed),
            expired_count: self.stats.expired_count.load(Ordering::Relaxed),
        }
    }
}
