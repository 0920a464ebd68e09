//! Counters for cache groups and LRU cores.
//!
//! [`GroupStats`](metrics_impl::GroupStats) is always compiled in: it counts
//! the request flow through a [`CacheGroup`](crate::group::CacheGroup) with
//! relaxed atomics. Per-core LRU counters are opt-in through the `metrics`
//! cargo feature because they sit on the hottest path.

pub mod metrics_impl;
pub mod snapshot;
pub mod traits;

pub use metrics_impl::GroupStats;
#[cfg(feature = "metrics")]
pub use metrics_impl::LruMetrics;
#[cfg(feature = "metrics")]
pub use snapshot::LruMetricsSnapshot;
pub use snapshot::GroupStatsSnapshot;
pub use traits::{CoreMetricsRecorder, MetricsSnapshotProvider};
