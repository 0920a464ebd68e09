//! Name → group lookup shared by a process.
//!
//! The registry is an ordinary value rather than a global: a node builds one,
//! registers its groups, and hands it to the protocol server. Lookups take a
//! shared lock; registration takes it exclusively.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{info, warn};

use crate::builder::GroupBuilder;
use crate::context::RequestContext;
use crate::error::{ConfigError, Error};
use crate::group::CacheGroup;
use crate::traits::Loader;

#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<FxHashMap<String, Arc<CacheGroup>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a single-lock group and registers it.
    pub fn new_group<L>(
        &self,
        name: impl Into<String>,
        capacity: usize,
        loader: L,
    ) -> Result<Arc<CacheGroup>, ConfigError>
    where
        L: Loader + 'static,
    {
        let group = GroupBuilder::new(name)
            .capacity(capacity)
            .loader(loader)
            .build()?;
        Ok(self.register(group))
    }

    /// Registers `group` under its name.
    ///
    /// A group already registered under that name is replaced; handles to
    /// the old group stay valid but it is no longer reachable by name.
    pub fn register(&self, group: CacheGroup) -> Arc<CacheGroup> {
        let group = Arc::new(group);
        let name = group.name().to_owned();
        let previous = self.groups.write().insert(name.clone(), group.clone());
        if previous.is_some() {
            warn!(group = %name, "replaced existing cache group");
        } else {
            info!(group = %name, capacity = group.capacity(), "registered cache group");
        }
        group
    }

    pub fn get_group(&self, name: &str) -> Option<Arc<CacheGroup>> {
        self.groups.read().get(name).cloned()
    }

    pub fn remove(&self, name: &str) -> Option<Arc<CacheGroup>> {
        self.groups.write().remove(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }

    /// Fetches `key` from group `name`, bypassing peers.
    pub(crate) async fn get_local(
        &self,
        name: &str,
        key: &str,
        ctx: &RequestContext,
    ) -> crate::error::Result<Bytes> {
        let group = self
            .get_group(name)
            .ok_or_else(|| Error::NoSuchGroup(name.to_owned()))?;
        group.record_server_request();
        group.get_local(key, ctx).await
    }
}

impl fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.names())
            .finish()
    }
}
