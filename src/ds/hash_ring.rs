//! Consistent-hash ring with virtual replicas.
//!
//! Maps string keys to node names so that changing the node set only moves
//! the keys that land on the added or removed node's arcs.
//!
//! ## Architecture
//!
//! ```text
//!   set(["A", "B"]) with replicas = 3
//!
//!   hash("0A") hash("1A") hash("2A") hash("0B") hash("1B") hash("2B")
//!        │          │          │          │          │          │
//!        └──────────┴──────────┴────┬─────┴──────────┴──────────┘
//!                                   ▼  sort ascending
//!   ring: [(12, B) (97, A) (310, A) (415, B) (802, B) (990, A)]
//!
//!   get(key): h = hash(key)
//!     h = 300  → first entry ≥ 300 is (310, A)   → "A"
//!     h = 995  → past the end, wrap to (12, B)   → "B"
//! ```
//!
//! ## Performance
//! - `get`: O(log(N·R)) binary search
//! - `set`: O(N·R·log(N·R)) full rebuild
//!
//! The ring is rebuilt wholesale on every [`HashRing::set`]; there is no
//! incremental add/remove.

use std::hash::Hasher;

use rustc_hash::{FxHashSet, FxHasher};

/// Virtual replicas per physical node when none is configured.
pub const DEFAULT_REPLICAS: usize = 50;

/// Hash function mapping bytes onto the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// Default ring hash: `FxHasher` folded to 32 bits.
pub fn fx_hash32(data: &[u8]) -> u32 {
    let mut hasher = FxHasher::default();
    hasher.write(data);
    let hash = hasher.finish();
    (hash ^ (hash >> 32)) as u32
}

/// Consistent-hash ring.
///
/// # Example
///
/// ```
/// use peercache::ds::HashRing;
///
/// let mut ring = HashRing::new(50, None);
/// assert_eq!(ring.get("user:1"), None);
///
/// ring.set(["http://10.0.0.1:8000", "http://10.0.0.2:8000"]);
/// let owner = ring.get("user:1").unwrap().to_owned();
/// assert_eq!(ring.get("user:1"), Some(owner.as_str()));
/// ```
#[derive(Debug, Clone)]
pub struct HashRing {
    hash: HashFn,
    replicas: usize,
    // (position, index into `nodes`), ascending by position
    ring: Vec<(u32, usize)>,
    nodes: Vec<String>,
}

impl HashRing {
    /// Creates an empty ring.
    ///
    /// `replicas` is clamped to at least 1. `None` selects [`fx_hash32`].
    pub fn new(replicas: usize, hash: Option<HashFn>) -> Self {
        Self {
            hash: hash.unwrap_or(fx_hash32),
            replicas: replicas.max(1),
            ring: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// Replaces the node set and rebuilds the ring.
    ///
    /// Duplicate node names are ignored after their first occurrence.
    pub fn set<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = FxHashSet::default();
        self.nodes = nodes
            .into_iter()
            .map(Into::into)
            .filter(|node: &String| seen.insert(node.clone()))
            .collect();

        self.ring = Vec::with_capacity(self.nodes.len() * self.replicas);
        for (idx, node) in self.nodes.iter().enumerate() {
            for replica in 0..self.replicas {
                let position = (self.hash)(format!("{replica}{node}").as_bytes());
                self.ring.push((position, idx));
            }
        }
        self.ring.sort_unstable();
    }

    /// Returns the node owning `key`, or `None` when the ring is empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.ring.is_empty() {
            return None;
        }
        let hash = (self.hash)(key.as_bytes());
        let idx = self.ring.partition_point(|&(position, _)| position < hash);
        let (_, node) = self.ring[idx % self.ring.len()];
        Some(self.nodes[node].as_str())
    }

    /// Physical nodes in insertion order.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Number of physical nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Number of virtual positions on the ring.
    pub fn positions(&self) -> usize {
        self.ring.len()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS, None)
    }
}
