pub use crate::builder::GroupBuilder;
pub use crate::context::RequestContext;
pub use crate::ds::{HashRing, ShardSelector};
pub use crate::error::{BoxError, ConfigError, Error};
pub use crate::group::{CacheGroup, GroupRegistry};
#[cfg(feature = "metrics")]
pub use crate::metrics::LruMetricsSnapshot;
pub use crate::metrics::GroupStatsSnapshot;
pub use crate::peer::{HttpPeerGetter, PeerPool, PoolOptions};
pub use crate::policy::lru::{ConcurrentLruCache, LruCore, ShardedLruCache};
pub use crate::singleflight::SingleFlight;
pub use crate::traits::{ConcurrentCache, Loader, LoaderFn, PeerGetter, PeerPicker};
