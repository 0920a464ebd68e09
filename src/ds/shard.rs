//! Deterministic key-to-shard mapping.
//!
//! Used by [`ShardedLruCache`](crate::policy::lru::ShardedLruCache) to split a
//! group's cache into independently locked partitions.
//!
//! ## Architecture
//!
//! ```text
//!   Input Key ("user:42")
//!       │
//!       ▼
//!   ┌───────────────────────────────────────────────────┐
//!   │  ShardSelector { shards: 4, seed: 42 }            │
//!   │                                                   │
//!   │  1. Hash seed into a fresh DefaultHasher          │
//!   │  2. Hash the key                                  │
//!   │  3. hasher.finish() % 4                           │
//!   └───────────────────────────────────────────────────┘
//!       │
//!       ▼
//!   ┌─────────┬─────────┬─────────┬─────────┐
//!   │ Shard 0 │ Shard 1 │ Shard 2 │ Shard 3 │
//!   └─────────┴─────────┴─────────┴─────────┘
//! ```
//!
//! ## Example Usage
//!
//! ```
//! use peercache::ds::ShardSelector;
//!
//! let selector = ShardSelector::new(4, 0);
//! let shard = selector.shard_for_key("user:123");
//! assert!(shard < 4);
//! assert_eq!(selector.shard_for_key("user:123"), shard);
//! ```
//!
//! Unlike [`HashRing`](crate::ds::HashRing), changing the shard count
//! remaps most keys; it is only meant for partitions inside one process.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Deterministic shard selector using a seeded hash.
///
/// The same `(key, seed, shards)` tuple always produces the same shard index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardSelector {
    shards: usize,
    seed: u64,
}

impl ShardSelector {
    /// Creates a selector for `shards` shards with the given `seed`.
    ///
    /// The shard count is clamped to at least 1.
    ///
    /// ```
    /// use peercache::ds::ShardSelector;
    ///
    /// assert_eq!(ShardSelector::new(16, 0).shard_count(), 16);
    /// assert_eq!(ShardSelector::new(0, 0).shard_count(), 1);
    /// ```
    pub fn new(shards: usize, seed: u64) -> Self {
        Self {
            shards: shards.max(1),
            seed,
        }
    }

    pub fn shard_count(&self) -> usize {
        self.shards
    }

    /// Maps a key to a shard index in `[0, shards)`.
    pub fn shard_for_key<K: Hash + ?Sized>(&self, key: &K) -> usize {
        if self.shards == 1 {
            return 0;
        }
        let mut hasher = DefaultHasher::new();
        self.seed.hash(&mut hasher);
        key.hash(&mut hasher);
        (hasher.finish() as usize) % self.shards
    }
}

impl Default for ShardSelector {
    /// Creates a single-shard selector with seed 0.
    fn default() -> Self {
        Self::new(1, 0)
    }
}
