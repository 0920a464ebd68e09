//! Builder for cache groups.
//!
//! Collects a group's name, capacity, cache layout and loader, validates
//! them, and picks the LRU backing the group.
//!
//! ## Example
//!
//! ```rust
//! use bytes::Bytes;
//! use peercache::builder::GroupBuilder;
//! use peercache::traits::LoaderFn;
//!
//! let group = GroupBuilder::new("scores")
//!     .capacity(1024)
//!     .shards(4)
//!     .loader(LoaderFn::new(|key: &str| Ok(Bytes::from(key.len().to_string()))))
//!     .build()
//!     .unwrap();
//! assert_eq!(group.name(), "scores");
//! assert_eq!(group.capacity(), 1024);
//! ```

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::ConfigError;
use crate::group::CacheGroup;
use crate::policy::lru::{ConcurrentLruCache, ShardedLruCache};
use crate::traits::{ConcurrentCache, Loader};

/// Validating builder for [`CacheGroup`].
pub struct GroupBuilder {
    name: String,
    capacity: usize,
    shards: usize,
    loader: Option<Arc<dyn Loader>>,
}

impl GroupBuilder {
    /// Starts a builder. Capacity and loader must be set before `build`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: 0,
            shards: 1,
            loader: None,
        }
    }

    /// Maximum number of cached entries.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Number of independently locked LRU shards. `1` (the default) uses a
    /// single lock; larger values are clamped to the capacity.
    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn loader<L>(self, loader: L) -> Self
    where
        L: Loader + 'static,
    {
        self.shared_loader(Arc::new(loader))
    }

    /// Uses a loader that is shared with other groups.
    pub fn shared_loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    pub fn build(self) -> Result<CacheGroup, ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::new("group name must not be empty"));
        }
        if self.capacity == 0 {
            return Err(ConfigError::new(format!(
                "cache capacity must be at least 1 (group {:?})",
                self.name
            )));
        }
        let loader = self
            .loader
            .ok_or_else(|| ConfigError::new("loader is required"))?;

        let cache: Box<dyn ConcurrentCache<Bytes>> = if self.shards > 1 {
            Box::new(ShardedLruCache::try_new(self.capacity, self.shards)?)
        } else {
            Box::new(ConcurrentLruCache::try_new(self.capacity)?)
        };

        Ok(CacheGroup::from_parts(self.name, loader, cache))
    }
}

impl fmt::Debug for GroupBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("shards", &self.shards)
            .field("has_loader", &self.loader.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::traits::LoaderFn;

    fn echo() -> LoaderFn<impl Fn(&str) -> Result<Bytes, BoxError> + Send + Sync> {
        LoaderFn::new(|key: &str| Ok(Bytes::copy_from_slice(key.as_bytes())))
    }

    #[tokio::test]
    async fn test_single_and_sharded_layouts() {
        for shards in [1, 4] {
            let group = GroupBuilder::new("g")
                .capacity(2)
                .shards(shards)
                .loader(echo())
                .build()
                .unwrap();

            assert_eq!(group.get("k").await.unwrap(), Bytes::from("k"));
            assert_eq!(group.capacity(), 2);
            assert_eq!(group.cached_len(), 1);
        }
    }

    #[test]
    fn test_missing_loader() {
        let err = GroupBuilder::new("g").capacity(8).build().unwrap_err();
        assert_eq!(err.message(), "loader is required");
    }

    #[test]
    fn test_invalid_name_and_capacity() {
        let err = GroupBuilder::new("").capacity(8).loader(echo()).build().unwrap_err();
        assert!(err.message().contains("name"));

        let err = GroupBuilder::new("g").loader(echo()).build().unwrap_err();
        assert!(err.message().contains("capacity"));
    }
}
