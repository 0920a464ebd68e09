//! # Trait Seams
//!
//! The traits a [`CacheGroup`](crate::group::CacheGroup) is assembled from.
//! Each one is a capability supplied from outside the group: the cache it
//! stores into, the origin it loads from, and the peers it may delegate to.
//!
//! ## Architecture
//!
//! ```text
//!                       ┌─────────────────────────────┐
//!                       │        CacheGroup           │
//!                       └──┬──────────┬───────────┬───┘
//!                          │          │           │
//!            ┌─────────────▼──┐  ┌────▼─────┐  ┌──▼──────────────┐
//!            │ConcurrentCache │  │  Loader  │  │   PeerPicker    │
//!            │ get/insert/    │  │ load(key)│  │ pick_peer(key)  │
//!            │ remove/len     │  │ (origin) │  └──┬──────────────┘
//!            └───────┬────────┘  └──────────┘     │ Some(getter)
//!                    │                            ▼
//!     ┌──────────────┴─────────────┐      ┌──────────────────┐
//!     │ ConcurrentLruCache (1 lock)│      │    PeerGetter    │
//!     │ ShardedLruCache (N locks)  │      │ get(group, key)  │
//!     └────────────────────────────┘      └──────────────────┘
//! ```
//!
//! ## Trait Summary
//!
//! | Trait             | Sync/Async | Implemented by                          |
//! |-------------------|------------|-----------------------------------------|
//! | `ConcurrentCache` | sync       | `ConcurrentLruCache`, `ShardedLruCache` |
//! | `Loader`          | async      | `LoaderFn`, caller types                |
//! | `PeerPicker`      | sync       | `PeerPool`                              |
//! | `PeerGetter`      | async      | `HttpPeerGetter`                        |
//!
//! Cache operations never await, so `ConcurrentCache` is synchronous and its
//! locks are never held across an `.await`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{BoxError, Result};

/// Thread-safe bounded cache keyed by string.
///
/// Every method takes `&self`; implementations serialize access internally.
pub trait ConcurrentCache<V>: Send + Sync {
    /// Returns a clone of the value and marks it most recently used.
    fn get(&self, key: &str) -> Option<V>;

    /// Inserts or replaces `key`, evicting as needed. Returns the old value.
    fn insert(&self, key: &str, value: V) -> Option<V>;

    fn remove(&self, key: &str) -> Option<V>;

    /// Membership test without touching recency.
    fn contains(&self, key: &str) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn capacity(&self) -> usize;

    fn clear(&self);
}

/// Origin data source for one cache group.
///
/// The loader serializes origin data into bytes; callers of
/// [`CacheGroup::get`](crate::group::CacheGroup::get) deserialize it.
#[async_trait]
pub trait Loader: Send + Sync {
    async fn load(&self, key: &str) -> std::result::Result<Bytes, BoxError>;
}

/// Adapts a synchronous closure into a [`Loader`].
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use peercache::traits::LoaderFn;
///
/// let loader = LoaderFn::new(|key: &str| Ok(Bytes::from(key.to_uppercase())));
/// # let _ = loader;
/// ```
pub struct LoaderFn<F>(F);

impl<F> LoaderFn<F>
where
    F: Fn(&str) -> std::result::Result<Bytes, BoxError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

#[async_trait]
impl<F> Loader for LoaderFn<F>
where
    F: Fn(&str) -> std::result::Result<Bytes, BoxError> + Send + Sync,
{
    async fn load(&self, key: &str) -> std::result::Result<Bytes, BoxError> {
        (self.0)(key)
    }
}

impl<F> fmt::Debug for LoaderFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderFn").finish_non_exhaustive()
    }
}

/// Client handle for one remote peer.
#[async_trait]
pub trait PeerGetter: Send + Sync + fmt::Debug {
    /// Fetches `key` from the peer's copy of `group`.
    async fn get(&self, group: &str, key: &str) -> Result<Bytes>;

    /// Address used in logs and errors.
    fn addr(&self) -> &str;
}

/// Chooses the peer that owns a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the owning peer, or `None` when this process owns `key`.
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>>;
}
