//! Bounded, recency-ordered cache store with time-of-day adaptive TTLs.
//!
//! Freshness and liveness are separate concerns here:
//!
//! - An entry older than its TTL is still returned, flagged stale. Expiry
//!   never deletes anything.
//! - Capacity is enforced on every insert by evicting the least recently
//!   used entry, whether or not it is still fresh.
//!
//! Only fresh reads count as "use". A stale read bumps the hit counter but
//! leaves the entry where it is in the eviction order.

use std::fmt;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use tracing::debug;

use super::clock::Clock;
use super::keys::CacheName;
use super::lock::lock_recovering;
use super::window::PeakWindow;

const METRIC_FRESH_HIT: &str = "pressroom_cache_fresh_hit_total";
const METRIC_STALE_HIT: &str = "pressroom_cache_stale_hit_total";
const METRIC_MISS: &str = "pressroom_cache_miss_total";
const METRIC_EVICT: &str = "pressroom_cache_evict_total";

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    stored_at: Instant,
    ttl: Duration,
    hit_count: u64,
}

impl<V> CacheEntry<V> {
    fn new(value: V, stored_at: Instant, ttl: Duration) -> Self {
        Self {
            value,
            stored_at,
            ttl,
            hit_count: 0,
        }
    }

    fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.stored_at)
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.age(now) > self.ttl
    }
}

/// Result of a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<V> {
    Fresh(V),
    Stale(V),
    Miss,
}

impl<V> Lookup<V> {
    pub fn is_fresh(&self) -> bool {
        matches!(self, Lookup::Fresh(_))
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Lookup::Stale(_))
    }
}

#[derive(Debug, Default)]
struct Counters {
    fresh_hits: AtomicU64,
    stale_hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

/// Point-in-time view of one entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryStats {
    pub key: String,
    pub age_ms: u64,
    pub ttl_ms: u64,
    pub hit_count: u64,
    pub is_stale: bool,
}

/// Point-in-time view of a whole store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub name: CacheName,
    pub size: usize,
    pub capacity: usize,
    pub fresh_hits: u64,
    pub stale_hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub stale_entries: usize,
    /// Ordered from most to least recently used.
    pub entries: Vec<EntryStats>,
}

pub struct CacheStore<K: Hash + Eq, V> {
    name: CacheName,
    capacity: NonZeroUsize,
    window: PeakWindow,
    clock: Arc<dyn Clock>,
    entries: Mutex<LruCache<K, CacheEntry<V>>>,
    counters: Counters,
}

impl<K, V> CacheStore<K, V>
where
    K: Hash + Eq + Clone + fmt::Display,
    V: Clone,
{
    pub fn new(
        name: CacheName,
        capacity: NonZeroUsize,
        window: PeakWindow,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name,
            capacity,
            window,
            clock,
            entries: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    pub fn name(&self) -> CacheName {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    pub fn len(&self) -> usize {
        lock_recovering(&self.entries, self.name.as_str(), "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert `value` with `base_ttl` scaled by the current time-of-day
    /// multiplier. Returns the key evicted to make room, if any.
    pub fn set(&self, key: K, value: V, base_ttl: Duration) -> Option<K> {
        let now = self.clock.now();
        let ttl = self.window.effective_ttl(base_ttl, self.clock.local_hour());
        let entry = CacheEntry::new(value, now, ttl);

        let displaced =
            lock_recovering(&self.entries, self.name.as_str(), "set").push(key.clone(), entry);

        // `push` hands back the previous value when the key was already present.
        let evicted = displaced
            .map(|(displaced_key, _)| displaced_key)
            .filter(|displaced_key| *displaced_key != key)?;

        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_EVICT, "cache" => self.name.as_str()).increment(1);
        debug!(
            cache = self.name.as_str(),
            evicted = %evicted,
            inserted = %key,
            "Evicted least recently used entry"
        );
        Some(evicted)
    }

    /// Read `key`, counting the hit and judging freshness against its TTL.
    pub fn get(&self, key: &K) -> Lookup<V> {
        let now = self.clock.now();
        let mut entries = lock_recovering(&self.entries, self.name.as_str(), "get");

        let Some(entry) = entries.peek_mut(key) else {
            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_MISS, "cache" => self.name.as_str()).increment(1);
            return Lookup::Miss;
        };

        entry.hit_count += 1;
        let value = entry.value.clone();

        if entry.is_stale(now) {
            self.counters.stale_hits.fetch_add(1, Ordering::Relaxed);
            counter!(METRIC_STALE_HIT, "cache" => self.name.as_str()).increment(1);
            return Lookup::Stale(value);
        }

        entries.promote(key);
        self.counters.fresh_hits.fetch_add(1, Ordering::Relaxed);
        counter!(METRIC_FRESH_HIT, "cache" => self.name.as_str()).increment(1);
        Lookup::Fresh(value)
    }

    /// Whether `key` is present, without counting a hit or reordering.
    pub fn contains(&self, key: &K) -> bool {
        lock_recovering(&self.entries, self.name.as_str(), "contains").contains(key)
    }

    pub fn invalidate(&self, key: &K) -> bool {
        lock_recovering(&self.entries, self.name.as_str(), "invalidate")
            .pop(key)
            .is_some()
    }

    /// Drop every entry, returning how many were removed.
    pub fn invalidate_all(&self) -> usize {
        let mut entries = lock_recovering(&self.entries, self.name.as_str(), "invalidate_all");
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn entry_stats(&self, key: &K) -> Option<EntryStats> {
        let now = self.clock.now();
        lock_recovering(&self.entries, self.name.as_str(), "entry_stats")
            .peek(key)
            .map(|entry| entry_stats(key, entry, now))
    }

    pub fn stats(&self) -> StoreStats {
        let now = self.clock.now();
        let entries: Vec<EntryStats> = lock_recovering(&self.entries, self.name.as_str(), "stats")
            .iter()
            .map(|(key, entry)| entry_stats(key, entry, now))
            .collect();

        StoreStats {
            name: self.name,
            size: entries.len(),
            capacity: self.capacity.get(),
            fresh_hits: self.counters.fresh_hits.load(Ordering::Relaxed),
            stale_hits: self.counters.stale_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            stale_entries: entries.iter().filter(|entry| entry.is_stale).count(),
            entries,
        }
    }
}

fn entry_stats<K: fmt::Display, V>(key: &K, entry: &CacheEntry<V>, now: Instant) -> EntryStats {
    EntryStats {
        key: key.to_string(),
        age_ms: millis(entry.age(now)),
        ttl_ms: millis(entry.ttl),
        hit_count: entry.hit_count,
        is_stale: entry.is_stale(now),
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Type-erased view of a store, used by the admin surface to address the
/// three differently-typed caches uniformly.
pub trait NamedCache: Send + Sync {
    fn name(&self) -> CacheName;

    fn invalidate_all(&self) -> usize;

    fn stats(&self) -> StoreStats;
}

impl<K, V> NamedCache for CacheStore<K, V>
where
    K: Hash + Eq + Clone + fmt::Display + Send,
    V: Clone + Send,
{
    fn name(&self) -> CacheName {
        CacheStore::name(self)
    }

    fn invalidate_all(&self) -> usize {
        CacheStore::invalidate_all(self)
    }

    fn stats(&self) -> StoreStats {
        CacheStore::stats(self)
    }
}
