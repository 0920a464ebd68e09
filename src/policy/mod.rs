//! Eviction policies.
//!
//! Groups store values in an LRU; [`lru::ConcurrentLruCache`] and
//! [`lru::ShardedLruCache`] wrap the single-threaded [`lru::LruCore`].

pub mod lru;

pub use lru::{ConcurrentLruCache, LruCore, ShardedLruCache};
