//! Error types for peercache.
//!
//! ## Key Components
//!
//! - [`Error`]: Returned by [`CacheGroup::get`](crate::group::CacheGroup::get)
//!   and the peer protocol. Cloneable, so one load result can be handed to
//!   every caller collapsed onto it.
//! - [`ConfigError`]: Returned when group, pool or node configuration is
//!   invalid (zero capacity, missing loader, peers registered twice). These
//!   are startup errors; callers are expected to abort on them.
//! - [`InvariantError`]: Returned when internal data-structure invariants are
//!   violated (`check_invariants` methods).
//!
//! ## Example Usage
//!
//! ```
//! use peercache::error::ConfigError;
//! use peercache::policy::lru::LruCore;
//!
//! let err = LruCore::<String, u32>::try_new(0).unwrap_err();
//! assert!(err.to_string().contains("capacity"));
//! ```

use std::error::Error as StdError;
use std::fmt;
use std::sync::Arc;

/// Boxed error produced by caller-supplied loaders.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Errors surfaced by cache lookups and the peer protocol.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// The requested key was empty.
    #[error("key is required")]
    InvalidKey,

    /// The origin loader failed for `key`.
    #[error("loading {key:?} from origin failed: {cause}")]
    OriginLoad {
        key: String,
        #[source]
        cause: Arc<dyn StdError + Send + Sync>,
    },

    /// A peer answered with a non-ok status or could not be reached.
    #[error("fetch from peer {peer} failed: {reason}")]
    PeerFetch { peer: String, reason: String },

    #[error("no such group: {0}")]
    NoSuchGroup(String),

    /// A protocol request path did not split into `{group}/{key}`.
    #[error("malformed request path: {0}")]
    MalformedPath(String),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl Error {
    /// Wraps a loader failure for `key`.
    pub fn origin_load(key: impl Into<String>, cause: BoxError) -> Self {
        Error::OriginLoad {
            key: key.into(),
            cause: Arc::from(cause),
        }
    }

    pub fn peer_fetch(peer: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::PeerFetch {
            peer: peer.into(),
            reason: reason.to_string(),
        }
    }

    /// Returns `true` for errors caused by the request itself rather than by
    /// this process: the protocol reports these as "bad request".
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidKey
                | Error::OriginLoad { .. }
                | Error::NoSuchGroup(_)
                | Error::MalformedPath(_)
        )
    }
}

// ---------------------------------------------------------------------------
// InvariantError
// ---------------------------------------------------------------------------

/// Error returned when internal cache invariants are violated.
///
/// Produced by `check_invariants` methods such as
/// [`LruCore::check_invariants`](crate::policy::lru::LruCore::check_invariants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantError(String);

impl InvariantError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvariantError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for InvariantError {}

// ---------------------------------------------------------------------------
// ConfigError
// ---------------------------------------------------------------------------

/// Error returned when configuration is invalid.
///
/// Produced by fallible constructors such as
/// [`LruCore::try_new`](crate::policy::lru::LruCore::try_new),
/// [`GroupBuilder::build`](crate::builder::GroupBuilder::build) and
/// [`CacheGroup::register_peers`](crate::group::CacheGroup::register_peers).
/// Carries a human-readable description of what failed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    #[inline]
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    #[inline]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl StdError for ConfigError {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
