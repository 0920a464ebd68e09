//! # Least Recently Used (LRU) Cache
//!
//! Bounded key→value store backing every cache group.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                          LruCore<K, V>                               │
//!   │                                                                      │
//!   │   ┌──────────────────────────────────────────────────────────────┐   │
//!   │   │  FxHashMap<K, SlotId>                                        │   │
//!   │   │    "Tom"  ──────────────────────────────┐                    │   │
//!   │   │    "Jack" ────────────────────────┐     │                    │   │
//!   │   │    "Sam"  ──────────────────┐     │     │                    │   │
//!   │   └─────────────────────────────┼─────┼─────┼────────────────────┘   │
//!   │                                 ▼     ▼     ▼                        │
//!   │   ┌──────────────────────────────────────────────────────────────┐   │
//!   │   │  IntrusiveList<Entry<K, V>>  (SlotArena-backed)              │   │
//!   │   │                                                              │   │
//!   │   │  head ──► [Sam] ◄──► [Jack] ◄──► [Tom] ◄── tail              │   │
//!   │   │           MRU                      LRU                       │   │
//!   │   └──────────────────────────────────────────────────────────────┘   │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Entries live in an arena and are linked by integer [`SlotId`]s, so the
//! core is safe Rust with no raw pointers or reference cycles.
//!
//! ## Operations
//!
//! | Method           | Complexity | Description                               |
//! |------------------|------------|-------------------------------------------|
//! | `get(&k)`        | O(1)       | Get value, moves to MRU position          |
//! | `peek(&k)`       | O(1)       | Get value without affecting order         |
//! | `insert(k, v)`   | O(1)       | Insert or update, evicts LRU when full    |
//! | `remove(&k)`     | O(1)       | Remove entry by key                       |
//! | `pop_lru()`      | O(1)       | Remove and return least recently used     |
//! | `iter()`         | O(n)       | Entries from MRU to LRU                   |
//!
//! ## Concurrency
//!
//! ```text
//!   ConcurrentLruCache<V>                 ShardedLruCache<V>
//!   ┌──────────────────────────┐          ┌────────────┬────────────┬───┐
//!   │ Mutex<LruCore<String,V>> │          │ Mutex<Core>│ Mutex<Core>│ … │
//!   └──────────────────────────┘          └────────────┴────────────┴───┘
//!   one lock per cache                    ShardSelector picks the shard
//! ```
//!
//! `get` reorders the recency list, so even reads take the lock exclusively.
//! Every operation is O(1), which bounds the critical section; when a single
//! lock becomes the bottleneck, `ShardedLruCache` splits the key space into
//! independently locked partitions with the same per-shard semantics.
//!
//! ## Example Usage
//!
//! ```
//! use peercache::policy::lru::LruCore;
//!
//! let mut cache = LruCore::new(2);
//! cache.insert("a".to_string(), 1);
//! cache.insert("b".to_string(), 2);
//!
//! // Reading "a" makes "b" the eviction candidate.
//! assert_eq!(cache.get("a"), Some(&1));
//! cache.insert("c".to_string(), 3);
//! assert!(!cache.contains("b"));
//! ```

use std::borrow::Borrow;
use std::fmt;
use std::hash::Hash;
use std::mem;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::ds::{IntrusiveList, ShardSelector, SlotId};
use crate::error::{ConfigError, InvariantError};
#[cfg(feature = "metrics")]
use crate::metrics::metrics_impl::LruMetrics;
#[cfg(feature = "metrics")]
use crate::metrics::snapshot::LruMetricsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::{CoreMetricsRecorder, MetricsSnapshotProvider};
use crate::traits::ConcurrentCache;

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
}

/// Single-threaded LRU core.
///
/// Invariants: `len() <= capacity()`, and the index and the recency list
/// always hold exactly the same keys.
pub struct LruCore<K, V> {
    index: FxHashMap<K, SlotId>,
    list: IntrusiveList<Entry<K, V>>,
    capacity: usize,
    #[cfg(feature = "metrics")]
    metrics: LruMetrics,
}

impl<K, V> LruCore<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Creates a cache holding at most `capacity` entries.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. Use [`try_new`](Self::try_new) for
    /// capacities that come from configuration.
    pub fn new(capacity: usize) -> Self {
        match Self::try_new(capacity) {
            Ok(cache) => cache,
            Err(err) => panic!("{err}"),
        }
    }

    /// Fallible constructor: rejects a zero capacity.
    ///
    /// ```
    /// use peercache::policy::lru::LruCore;
    ///
    /// assert!(LruCore::<String, u8>::try_new(8).is_ok());
    /// assert!(LruCore::<String, u8>::try_new(0).is_err());
    /// ```
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("cache capacity must be at least 1"));
        }
        Ok(Self {
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            list: IntrusiveList::with_capacity(capacity),
            capacity,
            #[cfg(feature = "metrics")]
            metrics: LruMetrics::default(),
        })
    }

    pub fn len(&self) -> usize {
        self.list.len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns `true` if the key is cached. Does not update recency.
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.index.contains_key(key)
    }

    /// Looks up `key` and moves it to the MRU position.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let Some(&id) = self.index.get(key) else {
            #[cfg(feature = "metrics")]
            self.metrics.record_get_miss();
            return None;
        };

        #[cfg(feature = "metrics")]
        self.metrics.record_get_hit();

        self.list.move_to_front(id);
        self.list.get(id).map(|entry| &entry.value)
    }

    /// Looks up `key` without touching recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let &id = self.index.get(key)?;
        self.list.get(id).map(|entry| &entry.value)
    }

    /// Inserts `key`, returning the previous value if it was present.
    ///
    /// An existing key has its value replaced and becomes MRU. A new key is
    /// pushed at the MRU end, then entries are evicted from the LRU end while
    /// the cache is over capacity.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&id) = self.index.get(&key) {
            self.list.move_to_front(id);
            if let Some(entry) = self.list.get_mut(id) {
                #[cfg(feature = "metrics")]
                self.metrics.record_insert_update();
                return Some(mem::replace(&mut entry.value, value));
            }
        }

        #[cfg(feature = "metrics")]
        self.metrics.record_insert_new();

        let id = self.list.push_front(Entry {
            key: key.clone(),
            value,
        });
        self.index.insert(key, id);

        while self.list.len() > self.capacity {
            if self.pop_lru().is_none() {
                break;
            }
            #[cfg(feature = "metrics")]
            self.metrics.record_evicted_entry();
        }

        None
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let id = self.index.remove(key)?;
        self.list.remove(id).map(|entry| entry.value)
    }

    /// Removes and returns the least recently used entry.
    pub fn pop_lru(&mut self) -> Option<(K, V)> {
        let entry = self.list.pop_back()?;
        self.index.remove(&entry.key);
        Some((entry.key, entry.value))
    }

    /// Returns the least recently used entry without removing it.
    pub fn peek_lru(&self) -> Option<(&K, &V)> {
        self.list.back().map(|entry| (&entry.key, &entry.value))
    }

    /// Iterates entries from most to least recently used.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.list.iter().map(|entry| (&entry.key, &entry.value))
    }

    pub fn clear(&mut self) {
        #[cfg(feature = "metrics")]
        self.metrics.record_clear();

        self.index.clear();
        self.list.clear();
    }

    /// Verifies that the index and the recency list agree.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.list.len() > self.capacity {
            return Err(InvariantError::new(format!(
                "len {} exceeds capacity {}",
                self.list.len(),
                self.capacity
            )));
        }
        if self.index.len() != self.list.len() {
            return Err(InvariantError::new(format!(
                "index holds {} keys but list holds {}",
                self.index.len(),
                self.list.len()
            )));
        }
        for (key, &id) in &self.index {
            match self.list.get(id) {
                Some(entry) if entry.key == *key => {},
                Some(_) => return Err(InvariantError::new("index points at a different key")),
                None => return Err(InvariantError::new("index points at a freed slot")),
            }
        }
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub fn debug_validate_invariants(&self) {
        self.list.debug_validate_invariants();
        if let Err(err) = self.check_invariants() {
            panic!("lru invariant violated: {err}");
        }
    }
}

#[cfg(feature = "metrics")]
impl<K, V> LruCore<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn metrics_snapshot(&self) -> LruMetricsSnapshot {
        LruMetricsSnapshot {
            get_calls: self.metrics.get_calls,
            get_hits: self.metrics.get_hits,
            get_misses: self.metrics.get_misses,
            insert_new: self.metrics.insert_new,
            insert_updates: self.metrics.insert_updates,
            evicted_entries: self.metrics.evicted_entries,
            clears: self.metrics.clears,
            cache_len: self.list.len(),
            capacity: self.capacity,
        }
    }
}

#[cfg(feature = "metrics")]
impl<K, V> MetricsSnapshotProvider<LruMetricsSnapshot> for LruCore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn snapshot(&self) -> LruMetricsSnapshot {
        self.metrics_snapshot()
    }
}

impl<K, V> fmt::Debug for LruCore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LruCore")
            .field("len", &self.list.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

impl<K, V> Extend<(K, V)> for LruCore<K, V>
where
    K: Eq + Hash + Clone,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

/// Thread-safe LRU cache: one `parking_lot::Mutex` around an [`LruCore`].
pub struct ConcurrentLruCache<V> {
    inner: Mutex<LruCore<String, V>>,
}

impl<V> ConcurrentLruCache<V> {
    pub fn try_new(capacity: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            inner: Mutex::new(LruCore::try_new(capacity)?),
        })
    }

    /// Runs `f` with the core locked.
    pub fn with_core<R>(&self, f: impl FnOnce(&mut LruCore<String, V>) -> R) -> R {
        let mut core = self.inner.lock();
        f(&mut core)
    }

    #[cfg(feature = "metrics")]
    pub fn metrics_snapshot(&self) -> LruMetricsSnapshot {
        self.inner.lock().metrics_snapshot()
    }
}

impl<V> ConcurrentCache<V> for ConcurrentLruCache<V>
where
    V: Clone + Send,
{
    fn get(&self, key: &str) -> Option<V> {
        self.inner.lock().get(key).cloned()
    }

    fn insert(&self, key: &str, value: V) -> Option<V> {
        self.inner.lock().insert(key.to_owned(), value)
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.inner.lock().remove(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.inner.lock().contains(key)
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }

    fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    fn clear(&self) {
        self.inner.lock().clear();
    }
}

impl<V> fmt::Debug for ConcurrentLruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.inner.lock();
        f.debug_struct("ConcurrentLruCache")
            .field("len", &core.len())
            .field("capacity", &core.capacity())
            .finish_non_exhaustive()
    }
}

/// LRU cache split into independently locked shards.
///
/// Recency is tracked per shard, so eviction picks the least recently used
/// entry of the shard being inserted into rather than of the whole cache.
/// The shard count is clamped to `[1, capacity]` and shard capacities sum to
/// exactly `capacity`.
pub struct ShardedLruCache<V> {
    shards: Vec<Mutex<LruCore<String, V>>>,
    selector: ShardSelector,
    capacity: usize,
}

impl<V> ShardedLruCache<V> {
    pub fn try_new(capacity: usize, shards: usize) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::new("cache capacity must be at least 1"));
        }
        let count = shards.clamp(1, capacity);
        let base = capacity / count;
        let extra = capacity % count;
        let shards = (0..count)
            .map(|i| {
                let shard_capacity = base + usize::from(i < extra);
                LruCore::try_new(shard_capacity).map(Mutex::new)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            shards,
            selector: ShardSelector::new(count, 0),
            capacity,
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Capacity of each shard, in shard order.
    pub fn shard_capacities(&self) -> Vec<usize> {
        self.shards.iter().map(|s| s.lock().capacity()).collect()
    }

    fn shard(&self, key: &str) -> &Mutex<LruCore<String, V>> {
        &self.shards[self.selector.shard_for_key(key)]
    }
}

impl<V> ConcurrentCache<V> for ShardedLruCache<V>
where
    V: Clone + Send,
{
    fn get(&self, key: &str) -> Option<V> {
        self.shard(key).lock().get(key).cloned()
    }

    fn insert(&self, key: &str, value: V) -> Option<V> {
        self.shard(key).lock().insert(key.to_owned(), value)
    }

    fn remove(&self, key: &str) -> Option<V> {
        self.shard(key).lock().remove(key)
    }

    fn contains(&self, key: &str) -> bool {
        self.shard(key).lock().contains(key)
    }

    fn len(&self) -> usize {
        self.shards.iter().map(|s| s.lock().len()).sum()
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn clear(&self) {
        for shard in &self.shards {
            shard.lock().clear();
        }
    }
}

impl<V> fmt::Debug for ShardedLruCache<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardedLruCache")
            .field("shards", &self.shards.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys<V>(cache: &LruCore<String, V>) -> Vec<&str> {
        cache.iter().map(|(k, _)| k.as_str()).collect()
    }

    #[test]
    fn inserting_past_capacity_evicts_oldest() {
        let capacity = 3;
        let mut cache = LruCore::new(capacity);
        for i in 1..=capacity + 1 {
            cache.insert(format!("k{i}"), i);
        }

        assert_eq!(cache.len(), capacity);
        assert_eq!(cache.get("k1"), None);
        assert_eq!(cache.get("k4"), Some(&4));
        cache.debug_validate_invariants();
    }

    #[test]
    fn reading_refreshes_recency() {
        let capacity = 3;
        let mut cache = LruCore::new(capacity);
        for i in 1..=capacity {
            cache.insert(format!("k{i}"), i);
        }

        assert_eq!(cache.get("k1"), Some(&1));
        for i in 0..capacity - 1 {
            cache.insert(format!("new{i}"), 100 + i);
        }

        assert!(cache.contains("k1"));
        assert!(!cache.contains("k2"));
        assert!(!cache.contains("k3"));
        cache.debug_validate_invariants();
    }

    #[test]
    fn update_replaces_value_and_refreshes() {
        let mut cache = LruCore::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        assert_eq!(cache.insert("a".to_string(), 10), Some(1));
        assert_eq!(cache.len(), 2);
        assert_eq!(keys(&cache), vec!["a", "b"]);

        cache.insert("c".to_string(), 3);
        assert_eq!(cache.peek("a"), Some(&10));
        assert!(!cache.contains("b"));
    }

    #[test]
    fn peek_does_not_refresh() {
        let mut cache = LruCore::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);

        assert_eq!(cache.peek("a"), Some(&1));
        cache.insert("c".to_string(), 3);
        assert!(!cache.contains("a"));
    }

    #[test]
    fn remove_and_pop_lru() {
        let mut cache = LruCore::new(4);
        cache.extend([("a".to_string(), 1), ("b".to_string(), 2), ("c".to_string(), 3)]);

        assert_eq!(cache.remove("b"), Some(2));
        assert_eq!(cache.remove("b"), None);
        assert_eq!(cache.peek_lru(), Some((&"a".to_string(), &1)));
        assert_eq!(cache.pop_lru(), Some(("a".to_string(), 1)));
        assert_eq!(keys(&cache), vec!["c"]);
        cache.debug_validate_invariants();

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.pop_lru(), None);
    }

    #[test]
    fn capacity_one_keeps_latest() {
        let mut cache = LruCore::new(1);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("b"), Some(&2));
        assert_eq!(cache.get("a"), None);
    }

    #[test]
    fn zero_capacity_is_a_config_error() {
        let err = LruCore::<String, u8>::try_new(0).unwrap_err();
        assert!(err.message().contains("capacity"));
        assert!(ConcurrentLruCache::<u8>::try_new(0).is_err());
        assert!(ShardedLruCache::<u8>::try_new(0, 4).is_err());
    }

    #[test]
    #[should_panic(expected = "capacity")]
    fn new_panics_on_zero_capacity() {
        let _ = LruCore::<String, u8>::new(0);
    }

    #[test]
    fn concurrent_cache_clones_values_out() {
        let cache = ConcurrentLruCache::try_new(2).unwrap();
        assert!(cache.is_empty());
        cache.insert("a", String::from("1"));
        cache.insert("b", String::from("2"));
        assert_eq!(cache.get("a").as_deref(), Some("1"));
        cache.insert("c", String::from("3"));

        assert!(!cache.contains("b"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.remove("a").as_deref(), Some("1"));
        cache.with_core(|core| core.debug_validate_invariants());
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn sharded_capacity_is_split_exactly() {
        let cache = ShardedLruCache::<u32>::try_new(10, 4).unwrap();
        assert_eq!(cache.shard_count(), 4);
        assert_eq!(cache.shard_capacities(), vec![3, 3, 2, 2]);
        assert_eq!(cache.capacity(), 10);

        let clamped = ShardedLruCache::<u32>::try_new(2, 16).unwrap();
        assert_eq!(clamped.shard_count(), 2);
        assert_eq!(clamped.shard_capacities(), vec![1, 1]);
    }

    #[test]
    fn sharded_cache_never_exceeds_capacity() {
        let cache = ShardedLruCache::try_new(16, 4).unwrap();
        for i in 0..200u32 {
            cache.insert(&format!("key-{i}"), i);
            assert!(cache.len() <= 16);
        }
        assert_eq!(cache.get("key-199"), Some(199));
        cache.clear();
        assert!(cache.is_empty());
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn metrics_track_hits_misses_and_evictions() {
        let mut cache = LruCore::new(1);
        cache.insert("a".to_string(), 1);
        cache.get("a");
        cache.get("zzz");
        cache.insert("a".to_string(), 2);
        cache.insert("b".to_string(), 3);

        let snap = cache.metrics_snapshot();
        assert_eq!(snap.get_hits, 1);
        assert_eq!(snap.get_misses, 1);
        assert_eq!(snap.insert_new, 2);
        assert_eq!(snap.insert_updates, 1);
        assert_eq!(snap.evicted_entries, 1);
        assert_eq!(snap.cache_len, 1);
    }
}
