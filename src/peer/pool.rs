//! Peer pool: ring-based peer selection plus the protocol endpoints.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::ds::{HashFn, HashRing, DEFAULT_REPLICAS};
use crate::error::ConfigError;
use crate::group::GroupRegistry;
use crate::peer::client::HttpPeerGetter;
use crate::peer::server;
use crate::traits::{PeerGetter, PeerPicker};

/// Default URL prefix of the peer protocol.
pub const DEFAULT_BASE_PATH: &str = "/_mycache/";

/// Default per-request timeout for peer fetches.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunables for a [`PeerPool`].
#[derive(Clone)]
pub struct PoolOptions {
    /// URL prefix; must start and end with `/`.
    pub base_path: String,
    /// Virtual replicas per peer on the ring.
    pub replicas: usize,
    /// Ring hash; `None` uses [`fx_hash32`](crate::ds::fx_hash32).
    pub hash: Option<HashFn>,
    /// Client timeout for peer fetches, also the server-side budget for
    /// answering one protocol request.
    pub timeout: Duration,
}

impl PoolOptions {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.base_path.starts_with('/') || !self.base_path.ends_with('/') {
            return Err(ConfigError::new(format!(
                "base path must start and end with '/': {:?}",
                self.base_path
            )));
        }
        // axum treats these as route parameters or wildcards.
        if self.base_path.contains(['{', '}', '*']) {
            return Err(ConfigError::new(format!(
                "base path must not contain '{{', '}}' or '*': {:?}",
                self.base_path
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::new("peer timeout must be non-zero"));
        }
        Ok(())
    }
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base_path: DEFAULT_BASE_PATH.to_owned(),
            replicas: DEFAULT_REPLICAS,
            hash: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl fmt::Debug for PoolOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolOptions")
            .field("base_path", &self.base_path)
            .field("replicas", &self.replicas)
            .field("custom_hash", &self.hash.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

struct PeerState {
    ring: HashRing,
    getters: FxHashMap<String, Arc<HttpPeerGetter>>,
}

/// The peer set of one process.
///
/// Implements [`PeerPicker`] for every group registered with it and serves
/// the protocol through [`router`](Self::router). The ring and getters sit
/// behind their own lock, independent of any cache.
///
/// ```
/// use peercache::peer::PeerPool;
/// use peercache::traits::PeerPicker;
///
/// let pool = PeerPool::new("http://10.0.0.1:8000").unwrap();
/// pool.set_peers(["http://10.0.0.1:8000"]);
/// // The only peer is this process: nothing is remote.
/// assert!(pool.pick_peer("Tom").is_none());
/// ```
pub struct PeerPool {
    self_addr: String,
    options: PoolOptions,
    client: reqwest::Client,
    state: RwLock<PeerState>,
}

impl PeerPool {
    pub fn new(self_addr: impl Into<String>) -> Result<Self, ConfigError> {
        Self::with_options(self_addr, PoolOptions::default())
    }

    pub fn with_options(
        self_addr: impl Into<String>,
        options: PoolOptions,
    ) -> Result<Self, ConfigError> {
        options.validate()?;
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| ConfigError::new(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            self_addr: self_addr.into(),
            state: RwLock::new(PeerState {
                ring: HashRing::new(options.replicas, options.hash),
                getters: FxHashMap::default(),
            }),
            options,
            client,
        })
    }

    /// This process's own address as it appears in the peer list.
    pub fn self_addr(&self) -> &str {
        &self.self_addr
    }

    pub fn options(&self) -> &PoolOptions {
        &self.options
    }

    /// Replaces the peer set. The list should include this process.
    pub fn set_peers<I, S>(&self, peers: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut ring = HashRing::new(self.options.replicas, self.options.hash);
        ring.set(peers);

        let getters = ring
            .nodes()
            .iter()
            .map(|peer| {
                let getter =
                    HttpPeerGetter::new(peer.as_str(), &self.options.base_path, self.client.clone());
                (peer.clone(), Arc::new(getter))
            })
            .collect();

        info!(self_addr = %self.self_addr, peers = ?ring.nodes(), "peer set updated");
        *self.state.write() = PeerState { ring, getters };
    }

    /// Current peers in the order they were set.
    pub fn peers(&self) -> Vec<String> {
        self.state.read().ring.nodes().to_vec()
    }

    /// Peer owning `key` on the ring, including this process.
    pub fn owner_of(&self, key: &str) -> Option<String> {
        self.state.read().ring.get(key).map(str::to_owned)
    }

    /// Protocol endpoints serving the groups in `registry`.
    pub fn router(&self, registry: Arc<GroupRegistry>) -> Router {
        server::router(registry, &self.options.base_path, self.options.timeout)
    }
}

impl PeerPicker for PeerPool {
    fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerGetter>> {
        let state = self.state.read();
        let owner = state.ring.get(key)?;
        if owner == self.self_addr {
            return None;
        }
        debug!(peer = owner, key, "pick peer");
        let getter: Arc<dyn PeerGetter> = state.getters.get(owner)?.clone();
        Some(getter)
    }
}

impl fmt::Debug for PeerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerPool")
            .field("self_addr", &self.self_addr)
            .field("options", &self.options)
            .field("peers", &self.peers())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Decimal hash so ownership is predictable: peers "2", "4", "6" with one
    // replica own the arcs ending at 2, 4 and 6 ("0" + node name).
    fn decimal(data: &[u8]) -> u32 {
        std::str::from_utf8(data)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0)
    }

    fn pool(self_addr: &str) -> PeerPool {
        let options = PoolOptions {
            replicas: 1,
            hash: Some(decimal),
            ..PoolOptions::default()
        };
        PeerPool::with_options(self_addr, options).unwrap()
    }

    #[test]
    fn picks_remote_owner_only() {
        let pool = pool("4");
        pool.set_peers(["2", "4", "6"]);

        assert_eq!(pool.pick_peer("1").map(|p| p.addr().to_owned()), Some("2".into()));
        assert!(pool.pick_peer("3").is_none());
        assert_eq!(pool.pick_peer("5").map(|p| p.addr().to_owned()), Some("6".into()));
        // wraps past the last position
        assert_eq!(pool.owner_of("7").as_deref(), Some("2"));
    }

    #[test]
    fn empty_pool_picks_nobody() {
        let pool = pool("4");
        assert!(pool.peers().is_empty());
        assert!(pool.pick_peer("1").is_none());
    }

    #[test]
    fn set_peers_replaces_the_set() {
        let pool = pool("4");
        pool.set_peers(["2", "4"]);
        pool.set_peers(["4", "6"]);
        assert_eq!(pool.peers(), vec!["4", "6"]);
        assert_eq!(pool.pick_peer("1").map(|p| p.addr().to_owned()), None);
        assert_eq!(pool.pick_peer("5").map(|p| p.addr().to_owned()), Some("6".into()));
    }

    #[test]
    fn base_path_must_be_slash_delimited() {
        for base_path in ["_mycache/", "/_mycache", ""] {
            let options = PoolOptions {
                base_path: base_path.to_owned(),
                ..PoolOptions::default()
            };
            assert!(PeerPool::with_options("a", options).is_err(), "{base_path:?}");
        }
        assert!(PeerPool::new("a").is_ok());
    }

    #[test]
    fn base_path_rejects_route_syntax() {
        for base_path in ["/{group}/", "/cache/*/", "/_my}cache/"] {
            let options = PoolOptions {
                base_path: base_path.to_owned(),
                ..PoolOptions::default()
            };
            let err = PeerPool::with_options("a", options).unwrap_err();
            assert!(err.message().contains("must not contain"), "{base_path:?}: {err}");
        }

        let options = PoolOptions {
            base_path: "/peer-cache/v1/".to_owned(),
            ..PoolOptions::default()
        };
        let pool = PeerPool::with_options("a", options).unwrap();
        let _router = pool.router(Arc::new(GroupRegistry::new()));
    }
}
