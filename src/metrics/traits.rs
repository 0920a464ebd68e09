//! # Metrics Traits
//!
//! Recording and snapshotting are split so cache code only ever writes
//! counters, and tests/benches only ever read them.
//!
//! ```text
//!   ┌─────────────────────────────┐      ┌─────────────────────────────┐
//!   │     CoreMetricsRecorder     │      │ MetricsSnapshotProvider<S>  │
//!   │  get_hit/get_miss/insert    │      │  snapshot() -> S            │
//!   │  evict/clear                │      │  (bench/test/export)        │
//!   └─────────────────────────────┘      └─────────────────────────────┘
//! ```

/// Common counters for an LRU core.
pub trait CoreMetricsRecorder {
    fn record_get_hit(&mut self);
    fn record_get_miss(&mut self);
    fn record_insert_new(&mut self);
    fn record_insert_update(&mut self);
    fn record_evicted_entry(&mut self);
    fn record_clear(&mut self);
}

/// Snapshot provider for bench/testing.
pub trait MetricsSnapshotProvider<S> {
    fn snapshot(&self) -> S;
}
