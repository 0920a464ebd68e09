//! Node configuration.
//!
//! Sources are merged in this order, later ones overriding earlier ones:
//!
//! 1. [`NodeConfig::default()`]
//! 2. A TOML file, when one is given and exists
//! 3. `PEERCACHE_*` environment variables (`PEERCACHE_ADDR`,
//!    `PEERCACHE_PEER_TIMEOUT_MS`, `PEERCACHE_PEERS=[...]`)
//! 4. Explicit overrides, e.g. command-line flags
//!
//! ```toml
//! addr = "127.0.0.1:8001"
//! peers = ["http://127.0.0.1:8001", "http://127.0.0.1:8002"]
//! data_dir = "./data"
//!
//! [[groups]]
//! name = "scores"
//! capacity = 4096
//! shards = 4
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ds::DEFAULT_REPLICAS;
use crate::error::ConfigError;
use crate::peer::{PoolOptions, DEFAULT_BASE_PATH};

/// Prefix of the environment variables read by [`ConfigLoader`].
pub const ENV_PREFIX: &str = "PEERCACHE_";

/// Settings for one cache group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub capacity: usize,
    #[serde(default = "default_shards")]
    pub shards: usize,
}

fn default_shards() -> usize {
    1
}

/// Settings for one cache node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Socket address the protocol server binds.
    pub addr: String,
    /// This node's URL as listed in `peers`. Defaults to `http://{addr}`.
    pub self_url: Option<String>,
    /// Every node in the cluster, this one included.
    pub peers: Vec<String>,
    pub base_path: String,
    pub replicas: usize,
    pub peer_timeout_ms: u64,
    /// Root of the file-backed origin: `{data_dir}/{group}/{key}`.
    pub data_dir: PathBuf,
    pub groups: Vec<GroupConfig>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8000".to_owned(),
            self_url: None,
            peers: Vec::new(),
            base_path: DEFAULT_BASE_PATH.to_owned(),
            replicas: DEFAULT_REPLICAS,
            peer_timeout_ms: 5_000,
            data_dir: PathBuf::from("data"),
            groups: vec![GroupConfig {
                name: "scores".to_owned(),
                capacity: 1024,
                shards: 1,
            }],
        }
    }
}

impl NodeConfig {
    /// URL other peers use to reach this node.
    pub fn self_url(&self) -> String {
        self.self_url
            .clone()
            .unwrap_or_else(|| format!("http://{}", self.addr))
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.peer_timeout_ms)
    }

    pub fn pool_options(&self) -> PoolOptions {
        PoolOptions {
            base_path: self.base_path.clone(),
            replicas: self.replicas,
            hash: None,
            timeout: self.peer_timeout(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.addr.is_empty() {
            return Err(ConfigError::new("addr must not be empty"));
        }
        if self.groups.is_empty() {
            return Err(ConfigError::new("at least one group must be configured"));
        }
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(ConfigError::new("group name must not be empty"));
            }
            if group.capacity == 0 {
                return Err(ConfigError::new(format!(
                    "group {:?}: capacity must be at least 1",
                    group.name
                )));
            }
        }
        self.pool_options().validate()?;

        let self_url = self.self_url();
        if !self.peers.is_empty() && !self.peers.contains(&self_url) {
            warn!(%self_url, peers = ?self.peers, "peer list does not include this node");
        }
        Ok(())
    }
}

/// Merges the configuration sources into a [`NodeConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn load(&self) -> Result<NodeConfig, ConfigError> {
        self.extract(self.figment())
    }

    /// Like [`load`](Self::load), with `overrides` merged last. Fields the
    /// overrides skip during serialization keep their merged value.
    pub fn load_with<T: Serialize>(&self, overrides: T) -> Result<NodeConfig, ConfigError> {
        self.extract(self.figment().merge(Serialized::defaults(overrides)))
    }

    fn figment(&self) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(NodeConfig::default()));

        if let Some(path) = &self.config_path {
            if path.exists() {
                debug!(path = %path.display(), "loading config file");
                figment = figment.merge(Toml::file(path));
            } else {
                warn!(path = %path.display(), "config file not found, using defaults");
            }
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    fn extract(&self, figment: Figment) -> Result<NodeConfig, ConfigError> {
        let config: NodeConfig = figment
            .extract()
            .map_err(|e| ConfigError::new(format!("invalid configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }
}
