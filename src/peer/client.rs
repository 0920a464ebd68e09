//! Protocol client for one remote peer.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::StatusCode;
use tracing::debug;

use crate::error::{Error, Result};
use crate::traits::PeerGetter;

// Everything but RFC 3986 unreserved characters is escaped, so `/` inside a
// group or key never splits the path.
pub(crate) const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Fetches values from one peer over HTTP.
///
/// Requests `GET {peer}{base_path}{group}/{key}` with both segments
/// percent-encoded. Any status other than `200 OK` is an error.
#[derive(Clone)]
pub struct HttpPeerGetter {
    addr: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpPeerGetter {
    /// `addr` is the peer's base URL, e.g. `http://10.0.0.2:8000`.
    pub fn new(addr: impl Into<String>, base_path: &str, client: reqwest::Client) -> Self {
        let addr = addr.into();
        let base_url = format!("{}{}", addr.trim_end_matches('/'), base_path);
        Self {
            addr,
            base_url,
            client,
        }
    }

    /// Full request URL for `group`/`key`.
    pub fn url_for(&self, group: &str, key: &str) -> String {
        format!(
            "{}{}/{}",
            self.base_url,
            utf8_percent_encode(group, SEGMENT),
            utf8_percent_encode(key, SEGMENT)
        )
    }
}

#[async_trait]
impl PeerGetter for HttpPeerGetter {
    async fn get(&self, group: &str, key: &str) -> Result<Bytes> {
        let url = self.url_for(group, key);
        debug!(peer = %self.addr, %url, "fetching from peer");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::peer_fetch(&self.addr, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::peer_fetch(
                &self.addr,
                format!("server returned {status}: {}", body.trim()),
            ));
        }

        response
            .bytes()
            .await
            .map_err(|e| Error::peer_fetch(&self.addr, format!("reading response body: {e}")))
    }

    fn addr(&self) -> &str {
        &self.addr
    }
}

impl fmt::Debug for HttpPeerGetter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPeerGetter")
            .field("addr", &self.addr)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_escapes_each_segment() {
        let getter = HttpPeerGetter::new("http://10.0.0.2:8000", "/_mycache/", reqwest::Client::new());
        assert_eq!(
            getter.url_for("scores", "Tom"),
            "http://10.0.0.2:8000/_mycache/scores/Tom"
        );
        assert_eq!(
            getter.url_for("a b", "x/y?z"),
            "http://10.0.0.2:8000/_mycache/a%20b/x%2Fy%3Fz"
        );
        assert_eq!(getter.url_for("g", "v1.2_~-"), "http://10.0.0.2:8000/_mycache/g/v1.2_~-");
    }

    #[test]
    fn trailing_slash_on_addr_is_ignored() {
        let getter = HttpPeerGetter::new("http://h:1/", "/_mycache/", reqwest::Client::new());
        assert_eq!(getter.url_for("g", "k"), "http://h:1/_mycache/g/k");
        assert_eq!(getter.addr(), "http://h:1/");
    }

    #[tokio::test]
    async fn unreachable_peer_is_a_fetch_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let addr = format!("http://127.0.0.1:{port}");
        let getter = HttpPeerGetter::new(addr, "/_mycache/", reqwest::Client::new());
        let err = getter.get("g", "k").await.unwrap_err();
        assert!(matches!(err, Error::PeerFetch { .. }));
    }
}
