//! Protocol server: answers `GET {base_path}{group}/{key}` from the local
//! group registry.
//!
//! ```text
//!   GET /_mycache/scores/Tom
//!        └──base──┘└grp─┘└key┘
//!
//!   200  application/octet-stream   raw value bytes
//!   400  text/plain                 malformed path, unknown group,
//!                                   empty key, origin load failure
//!   504  text/plain                 server-side deadline passed
//!   500  text/plain                 anything else
//! ```
//!
//! Both segments are percent-decoded after the raw path is split at the
//! first `/`, so an escaped `%2F` inside a key stays part of the key.
//! Requests are resolved with [`CacheGroup::get_local`], never forwarded.
//!
//! [`CacheGroup::get_local`]: crate::group::CacheGroup::get_local

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use percent_encoding::percent_decode_str;
use tracing::{debug, info};

use crate::context::RequestContext;
use crate::error::{Error, Result};
use crate::group::GroupRegistry;

#[derive(Clone)]
struct ServerState {
    registry: Arc<GroupRegistry>,
    base_path: Arc<str>,
    timeout: Duration,
}

/// Builds the protocol router for `registry`.
///
/// `base_path` must start and end with `/`; [`PoolOptions`] validates it.
///
/// [`PoolOptions`]: crate::peer::PoolOptions
pub fn router(registry: Arc<GroupRegistry>, base_path: &str, timeout: Duration) -> Router {
    let state = ServerState {
        registry,
        base_path: Arc::from(base_path),
        timeout,
    };

    Router::new()
        .route(base_path, get(serve_value))
        .route(&format!("{base_path}{{*rest}}"), get(serve_value))
        .fallback(unexpected_path)
        .with_state(state)
}

async fn serve_value(State(state): State<ServerState>, uri: Uri) -> Response {
    match resolve(&state, &uri).await {
        Ok(value) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            value,
        )
            .into_response(),
        Err(err) => err.into_response(),
    }
}

async fn resolve(state: &ServerState, uri: &Uri) -> Result<Bytes> {
    let (group, key) = split_path(uri.path(), &state.base_path)?;
    info!(%group, %key, "serving peer request");
    let ctx = RequestContext::with_timeout(state.timeout);
    state.registry.get_local(&group, &key, &ctx).await
}

async fn unexpected_path(uri: Uri) -> Response {
    debug!(path = %uri.path(), "request outside the protocol base path");
    (StatusCode::NOT_FOUND, "not found").into_response()
}

/// Splits a raw request path into decoded `(group, key)`.
pub(crate) fn split_path(path: &str, base_path: &str) -> Result<(String, String)> {
    let malformed = || Error::MalformedPath(path.to_owned());

    let rest = path.strip_prefix(base_path).ok_or_else(malformed)?;
    let (group, key) = rest.split_once('/').ok_or_else(malformed)?;
    let group = percent_decode_str(group)
        .decode_utf8()
        .map_err(|_| malformed())?;
    let key = percent_decode_str(key)
        .decode_utf8()
        .map_err(|_| malformed())?;

    Ok((group.into_owned(), key.into_owned()))
}

/// HTTP status reported for an error on the protocol path.
pub fn status_for(err: &Error) -> StatusCode {
    match err {
        err if err.is_client_error() => StatusCode::BAD_REQUEST,
        Error::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        debug!(%status, error = %self, "peer request failed");
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;

    #[test]
    fn splits_group_and_key() {
        let (group, key) = split_path("/_mycache/scores/Tom", "/_mycache/").unwrap();
        assert_eq!((group.as_str(), key.as_str()), ("scores", "Tom"));
    }

    #[test]
    fn key_may_contain_escaped_and_raw_slashes() {
        let (group, key) = split_path("/_mycache/a%20b/x%2Fy", "/_mycache/").unwrap();
        assert_eq!((group.as_str(), key.as_str()), ("a b", "x/y"));

        let (_, key) = split_path("/_mycache/g/x/y", "/_mycache/").unwrap();
        assert_eq!(key, "x/y");
    }

    #[test]
    fn missing_key_segment_is_malformed() {
        for path in ["/_mycache/scores", "/_mycache/", "/other/g/k", "/_mycache/g/%FF"] {
            let err = split_path(path, "/_mycache/").unwrap_err();
            assert!(matches!(err, Error::MalformedPath(_)), "{path}");
        }
    }

    #[test]
    fn empty_key_segment_is_passed_through() {
        let (group, key) = split_path("/_mycache/g/", "/_mycache/").unwrap();
        assert_eq!((group.as_str(), key.as_str()), ("g", ""));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(status_for(&Error::InvalidKey), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&Error::NoSuchGroup("x".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::origin_load("k", "gone".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&Error::DeadlineExceeded),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            status_for(&Error::Config(ConfigError::new("x"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
