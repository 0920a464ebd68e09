/// Point-in-time copy of a group's request counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GroupStatsSnapshot {
    /// Calls to `get`, including invalid keys.
    pub gets: u64,
    pub cache_hits: u64,
    /// Loads that went through the singleflight (cache misses).
    pub loads: u64,
    /// Loads that joined an in-flight call instead of running their own.
    pub loads_deduped: u64,
    pub peer_loads: u64,
    pub peer_errors: u64,
    pub local_loads: u64,
    pub local_load_errors: u64,
    /// Requests received from peers over the protocol.
    pub server_requests: u64,
}

#[cfg(feature = "metrics")]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LruMetricsSnapshot {
    pub get_calls: u64,
    pub get_hits: u64,
    pub get_misses: u64,

    pub insert_new: u64,
    pub insert_updates: u64,
    pub evicted_entries: u64,
    pub clears: u64,

    // gauges captured at snapshot time
    pub cache_len: usize,
    pub capacity: usize,
}
