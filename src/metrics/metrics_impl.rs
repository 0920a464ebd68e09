use std::sync::atomic::{AtomicU64, Ordering};

use crate::metrics::snapshot::GroupStatsSnapshot;
#[cfg(feature = "metrics")]
use crate::metrics::traits::CoreMetricsRecorder;
use crate::metrics::traits::MetricsSnapshotProvider;

/// LRU counters. Owned by the core, so plain integers behind `&mut self`.
#[cfg(feature = "metrics")]
#[derive(Debug, Default, Clone)]
pub struct LruMetrics {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub insert_new: u64,
    pub insert_updates: u64,
    pub evicted_entries: u64,
    pub clears: u64,
}

#[cfg(feature = "metrics")]
impl CoreMetricsRecorder for LruMetrics {
    #[inline]
    fn record_get_hit(&mut self) {
        self.get_calls += 1;
        self.get_hits += 1;
    }

    #[inline]
    fn record_get_miss(&mut self) {
        self.get_calls += 1;
        self.get_misses += 1;
    }

    #[inline]
    fn record_insert_new(&mut self) {
        self.insert_new += 1;
    }

    #[inline]
    fn record_insert_update(&mut self) {
        self.insert_updates += 1;
    }

    #[inline]
    fn record_evicted_entry(&mut self) {
        self.evicted_entries += 1;
    }

    #[inline]
    fn record_clear(&mut self) {
        self.clears += 1;
    }
}

/// Request-flow counters for one cache group.
///
/// Shared across tasks, so every counter is a relaxed atomic; the values are
/// observational and never drive control flow.
#[derive(Debug, Default)]
pub struct GroupStats {
    gets: AtomicU64,
    cache_hits: AtomicU64,
    loads: AtomicU64,
    loads_deduped: AtomicU64,
    peer_loads: AtomicU64,
    peer_errors: AtomicU64,
    local_loads: AtomicU64,
    local_load_errors: AtomicU64,
    server_requests: AtomicU64,
}

impl GroupStats {
    #[inline]
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_get(&self) {
        Self::bump(&self.gets);
    }

    pub fn record_cache_hit(&self) {
        Self::bump(&self.cache_hits);
    }

    pub fn record_load(&self) {
        Self::bump(&self.loads);
    }

    pub fn record_load_deduped(&self) {
        Self::bump(&self.loads_deduped);
    }

    pub fn record_peer_load(&self) {
        Self::bump(&self.peer_loads);
    }

    pub fn record_peer_error(&self) {
        Self::bump(&self.peer_errors);
    }

    pub fn record_local_load(&self) {
        Self::bump(&self.local_loads);
    }

    pub fn record_local_load_error(&self) {
        Self::bump(&self.local_load_errors);
    }

    pub fn record_server_request(&self) {
        Self::bump(&self.server_requests);
    }
}

impl MetricsSnapshotProvider<GroupStatsSnapshot> for GroupStats {
    fn snapshot(&self) -> GroupStatsSnapshot {
        let read = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        GroupStatsSnapshot {
            gets: read(&self.gets),
            cache_hits: read(&self.cache_hits),
            loads: read(&self.loads),
            loads_deduped: read(&self.loads_deduped),
            peer_loads: read(&self.peer_loads),
            peer_errors: read(&self.peer_errors),
            local_loads: read(&self.local_loads),
            local_load_errors: read(&self.local_load_errors),
            server_requests: read(&self.server_requests),
        }
    }
}
