//! # Peer Protocol
//!
//! How processes in a cluster find and ask each other for values.
//!
//! ```text
//!   process A (self = http://a:8000)               process B (http://b:8000)
//!   ┌───────────────────────────────┐              ┌──────────────────────────┐
//!   │ CacheGroup "scores"           │              │ axum Router              │
//!   │   pick_peer("Tom")            │              │  GET /_mycache/{*rest}   │
//!   │     │                         │              │    │                     │
//!   │     ▼                         │   HTTP GET   │    ▼                     │
//!   │ PeerPool ── HashRing ─► "b" ──┼──────────────┼► registry["scores"]      │
//!   │     │                         │              │    .get_local("Tom")     │
//!   │     └─ HttpPeerGetter(b) ◄────┼──────────────┼── 200 octet-stream       │
//!   └───────────────────────────────┘              └──────────────────────────┘
//! ```
//!
//! - [`PeerPool`] implements [`PeerPicker`](crate::traits::PeerPicker) with a
//!   consistent-hash ring and keeps one [`HttpPeerGetter`] per peer.
//! - [`server::router`] exposes the groups of a
//!   [`GroupRegistry`](crate::group::GroupRegistry) to other peers.

pub mod client;
pub mod pool;
pub mod server;

pub use client::HttpPeerGetter;
pub use pool::{PeerPool, PoolOptions, DEFAULT_BASE_PATH, DEFAULT_TIMEOUT};
