//! # Cache Groups
//!
//! A [`CacheGroup`] is one named, read-through cache namespace. It owns a
//! bounded LRU, an origin [`Loader`], a [`SingleFlight`] that collapses
//! concurrent misses, and optionally a [`PeerPicker`] that routes keys to the
//! process owning them.
//!
//! ## Lookup Flow
//!
//! ```text
//!   get_with(key, ctx)
//!     │
//!     ├─ key empty ──────────────────────────────► Err(InvalidKey)
//!     │
//!     ├─ cache hit ──────────────────────────────► Ok(value)
//!     │
//!     └─ miss: ctx.run(flight.work(key, load))
//!                 │
//!                 ├─ cache re-check (an earlier flight may have filled it)
//!                 │
//!                 ├─ picker.pick_peer(key) = Some(peer)
//!                 │      peer.get(group, key)  (bounded by ctx deadline)
//!                 │        ├─ Ok  ──────────────► Ok(value)   not cached here
//!                 │        └─ Err ── warn!, fall through
//!                 │
//!                 └─ loader.load(key)
//!                        ├─ Ok  ── cache.insert ─► Ok(value)
//!                        └─ Err ────────────────► Err(OriginLoad)
//! ```
//!
//! Values fetched from a peer are not stored locally: the owner caches them,
//! and keeping a single copy per key is what lets the cluster hold more
//! distinct keys than any one process.
//!
//! [`get_local`](CacheGroup::get_local) runs the same flow without the peer
//! step, in a flight map of its own so it never joins a load that is waiting
//! on a peer. The protocol server uses it so a request forwarded by a peer is
//! never forwarded again.

pub mod registry;

use std::fmt;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::builder::GroupBuilder;
use crate::context::RequestContext;
use crate::error::{ConfigError, Error, Result};
use crate::metrics::{GroupStats, GroupStatsSnapshot, MetricsSnapshotProvider};
use crate::singleflight::SingleFlight;
use crate::traits::{ConcurrentCache, Loader, PeerGetter, PeerPicker};

pub use registry::GroupRegistry;

/// A named read-through cache namespace.
pub struct CacheGroup {
    name: String,
    loader: Arc<dyn Loader>,
    cache: Box<dyn ConcurrentCache<Bytes>>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    // Peer-delegating and local-only loads never share a flight.
    flight: SingleFlight<Bytes, Error>,
    local_flight: SingleFlight<Bytes, Error>,
    stats: GroupStats,
}

impl CacheGroup {
    /// Starts a [`GroupBuilder`] for a group called `name`.
    pub fn builder(name: impl Into<String>) -> GroupBuilder {
        GroupBuilder::new(name)
    }

    pub(crate) fn from_parts(
        name: String,
        loader: Arc<dyn Loader>,
        cache: Box<dyn ConcurrentCache<Bytes>>,
    ) -> Self {
        Self {
            name,
            loader,
            cache,
            peers: OnceLock::new(),
            flight: SingleFlight::new(),
            local_flight: SingleFlight::new(),
            stats: GroupStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Maximum number of cached entries.
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    /// Number of entries currently cached.
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub fn stats(&self) -> GroupStatsSnapshot {
        self.stats.snapshot()
    }

    pub(crate) fn record_server_request(&self) {
        self.stats.record_server_request();
    }

    /// Installs the peer picker. Can only be done once per group.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) -> Result<(), ConfigError> {
        self.peers.set(picker).map_err(|_| {
            ConfigError::new(format!("peers already registered for group {:?}", self.name))
        })
    }

    pub fn has_peers(&self) -> bool {
        self.peers.get().is_some()
    }

    /// Looks up `key` with no deadline.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        self.get_with(key, &RequestContext::default()).await
    }

    /// Looks up `key`, delegating to the owning peer when one is registered.
    pub async fn get_with(&self, key: &str, ctx: &RequestContext) -> Result<Bytes> {
        self.lookup(key, ctx, true).await
    }

    /// Looks up `key` using only the local cache and loader.
    pub async fn get_local(&self, key: &str, ctx: &RequestContext) -> Result<Bytes> {
        self.lookup(key, ctx, false).await
    }

    async fn lookup(&self, key: &str, ctx: &RequestContext, use_peers: bool) -> Result<Bytes> {
        self.stats.record_get();
        if key.is_empty() {
            return Err(Error::InvalidKey);
        }

        if let Some(value) = self.cache.get(key) {
            self.stats.record_cache_hit();
            debug!(group = %self.name, key, "cache hit");
            return Ok(value);
        }

        ctx.run(self.load(key, ctx, use_peers)).await
    }

    async fn load(&self, key: &str, ctx: &RequestContext, use_peers: bool) -> Result<Bytes> {
        self.stats.record_load();

        let flight = if use_peers {
            &self.flight
        } else {
            &self.local_flight
        };
        let (result, shared) = flight
            .work_shared(key, || async {
                if let Some(value) = self.cache.get(key) {
                    return Ok(value);
                }

                let peer = if use_peers {
                    self.peers.get().and_then(|picker| picker.pick_peer(key))
                } else {
                    None
                };
                if let Some(peer) = peer {
                    match self.fetch_from_peer(peer.as_ref(), key, ctx).await {
                        Ok(value) => {
                            self.stats.record_peer_load();
                            return Ok(value);
                        },
                        Err(err) => {
                            self.stats.record_peer_error();
                            warn!(
                                group = %self.name,
                                key,
                                peer = peer.addr(),
                                error = %err,
                                "peer fetch failed, loading locally"
                            );
                        },
                    }
                }

                self.load_locally(key).await
            })
            .await;

        if shared {
            self.stats.record_load_deduped();
        }
        result
    }

    async fn fetch_from_peer(
        &self,
        peer: &dyn PeerGetter,
        key: &str,
        ctx: &RequestContext,
    ) -> Result<Bytes> {
        match ctx.remaining() {
            Some(left) => tokio::time::timeout(left, peer.get(&self.name, key))
                .await
                .map_err(|_| Error::peer_fetch(peer.addr(), "deadline exceeded"))?,
            None => peer.get(&self.name, key).await,
        }
    }

    async fn load_locally(&self, key: &str) -> Result<Bytes> {
        match self.loader.load(key).await {
            Ok(value) => {
                self.stats.record_local_load();
                self.cache.insert(key, value.clone());
                Ok(value)
            },
            Err(cause) => {
                self.stats.record_local_load_error();
                Err(Error::origin_load(key, cause))
            },
        }
    }
}

impl fmt::Debug for CacheGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheGroup")
            .field("name", &self.name)
            .field("capacity", &self.cache.capacity())
            .field("cached_len", &self.cache.len())
            .field("has_peers", &self.has_peers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::traits::LoaderFn;

    fn counting_group(capacity: usize) -> (CacheGroup, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let group = CacheGroup::builder("test")
            .capacity(capacity)
            .loader(LoaderFn::new(move |key: &str| {
                counter.fetch_add(1, Ordering::SeqCst);
                if key == "missing" {
                    Err("not found".into())
                } else {
                    Ok(Bytes::from(format!("value:{key}")))
                }
            }))
            .build()
            .unwrap();
        (group, calls)
    }

    #[tokio::test]
    async fn miss_loads_once_then_hits() {
        let (group, calls) = counting_group(4);

        assert_eq!(group.get("a").await.unwrap(), Bytes::from("value:a"));
        assert_eq!(group.get("a").await.unwrap(), Bytes::from("value:a"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let stats = group.stats();
        assert_eq!(stats.gets, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.local_loads, 1);
        assert_eq!(group.cached_len(), 1);
    }

    #[tokio::test]
    async fn empty_key_is_rejected_before_loading() {
        let (group, calls) = counting_group(4);
        assert!(matches!(group.get("").await, Err(Error::InvalidKey)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn loader_failures_are_not_cached() {
        let (group, calls) = counting_group(4);
        for _ in 0..2 {
            let err = group.get("missing").await.unwrap_err();
            assert!(matches!(err, Error::OriginLoad { ref key, .. } if key == "missing"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(group.cached_len(), 0);
        assert_eq!(group.stats().local_load_errors, 2);
    }

    #[tokio::test]
    async fn eviction_forces_reload() {
        let (group, calls) = counting_group(1);
        group.get("a").await.unwrap();
        group.get("b").await.unwrap();
        group.get("a").await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(group.cached_len(), 1);
    }

    #[test]
    fn peers_register_once() {
        struct NoPeers;
        impl PeerPicker for NoPeers {
            fn pick_peer(&self, _key: &str) -> Option<Arc<dyn PeerGetter>> {
                None
            }
        }

        let (group, _) = counting_group(2);
        assert!(!group.has_peers());
        group.register_peers(Arc::new(NoPeers)).unwrap();
        let err = group.register_peers(Arc::new(NoPeers)).unwrap_err();
        assert!(err.message().contains("already registered"));
    }
}
