//! peercache: an embeddable peer-to-peer read-through cache.
//!
//! Each process holds bounded LRU caches organised into named groups. A miss
//! is loaded once per key (singleflight), either from the peer that owns the
//! key on a consistent-hash ring or from a caller-supplied origin loader.
//!
//! ```text
//!   GroupRegistry ──► CacheGroup ──► ConcurrentCache (LRU, optionally sharded)
//!                         │
//!                         ├──► SingleFlight (one load per key)
//!                         ├──► PeerPicker  (PeerPool + HashRing) ──► HTTP peer
//!                         └──► Loader      (origin)
//! ```
//!
//! See `DESIGN.md` for internal architecture and decisions.

pub mod builder;
pub mod config;
pub mod context;
pub mod ds;
pub mod error;
pub mod group;
pub mod loader;
pub mod metrics;
pub mod peer;
pub mod policy;
pub mod prelude;
pub mod singleflight;
pub mod traits;

pub use crate::builder::GroupBuilder;
pub use crate::context::RequestContext;
pub use crate::error::{ConfigError, Error, Result};
pub use crate::group::{CacheGroup, GroupRegistry};
pub use crate::peer::{PeerPool, PoolOptions};
