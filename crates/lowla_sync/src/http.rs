//! HTTP transport.
//!
//! The HTTP library is abstracted behind [`HttpClient`] so tests can route
//! requests to an in-process adapter. [`ReqwestClient`] is the production
//! client (feature `reqwest`, on by default).

use crate::error::{SyncError, SyncResult};
use crate::transport::SyncTransport;
use lowla_sync_protocol::{
    parse_adapter_payload, AdapterRecord, ChangesResponse, ProtocolError, PullRequest, PushRequest,
};
use serde_json::Value as Json;

/// Minimal JSON-over-HTTP client.
pub trait HttpClient: Send + Sync {
    /// `GET url`, returning the decoded JSON body.
    fn get_json(&self, url: &str) -> SyncResult<Json>;

    /// `POST url` with a JSON body, returning the decoded JSON body.
    fn post_json(&self, url: &str, body: &Json) -> SyncResult<Json>;
}

impl<C: HttpClient + ?Sized> HttpClient for std::sync::Arc<C> {
    fn get_json(&self, url: &str) -> SyncResult<Json> {
        (**self).get_json(url)
    }

    fn post_json(&self, url: &str, body: &Json) -> SyncResult<Json> {
        (**self).post_json(url, body)
    }
}

/// Adapter endpoint URLs derived from a base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    changes: String,
    pull: String,
    push: String,
}

impl Endpoints {
    /// Derives the endpoints under `base_url`, adding a trailing slash when
    /// missing.
    ///
    /// # Errors
    ///
    /// Rejects an empty URL.
    pub fn new(base_url: &str) -> SyncResult<Self> {
        let base = base_url.trim();
        if base.is_empty() {
            return Err(SyncError::InvalidUrl(base_url.to_string()));
        }
        let base = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        Ok(Self {
            changes: format!("{base}_lowla/changes"),
            pull: format!("{base}_lowla/pull"),
            push: format!("{base}_lowla/push"),
        })
    }

    /// `GET` URL listing changes since `sequence`.
    pub fn changes(&self, sequence: u64) -> String {
        format!("{}?seq={sequence}", self.changes)
    }

    /// `POST` URL for pulls.
    pub fn pull(&self) -> &str {
        &self.pull
    }

    /// `POST` URL for pushes.
    pub fn push(&self) -> &str {
        &self.push
    }
}

/// [`SyncTransport`] speaking JSON to an adapter through an [`HttpClient`].
pub struct HttpTransport<C: HttpClient> {
    endpoints: Endpoints,
    client: C,
}

impl<C: HttpClient> std::fmt::Debug for HttpTransport<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoints", &self.endpoints)
            .finish_non_exhaustive()
    }
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport for the adapter at `base_url`.
    ///
    /// # Errors
    ///
    /// Rejects an empty URL.
    pub fn new(base_url: &str, client: C) -> SyncResult<Self> {
        Ok(Self {
            endpoints: Endpoints::new(base_url)?,
            client,
        })
    }

    /// The derived endpoint URLs.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// The underlying client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn post_records<T: serde::Serialize>(&self, url: &str, request: &T) -> SyncResult<Vec<AdapterRecord>> {
        let body = serde_json::to_value(request).map_err(ProtocolError::from)?;
        let response = self.client.post_json(url, &body)?;
        Ok(parse_adapter_payload(&response)?)
    }
}

impl<C: HttpClient> SyncTransport for HttpTransport<C> {
    fn changes(&self, sequence: u64) -> SyncResult<ChangesResponse> {
        let body = self.client.get_json(&self.endpoints.changes(sequence))?;
        Ok(serde_json::from_value(body).map_err(ProtocolError::from)?)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<Vec<AdapterRecord>> {
        self.post_records(self.endpoints.pull(), request)
    }

    fn push(&self, request: &PushRequest) -> SyncResult<Vec<AdapterRecord>> {
        self.post_records(self.endpoints.push(), request)
    }
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_client::ReqwestClient;

#[cfg(feature = "reqwest")]
mod reqwest_client {
    use super::HttpClient;
    use crate::error::{SyncError, SyncResult};
    use serde_json::Value as Json;
    use std::time::Duration;

    /// Blocking [`HttpClient`] backed by `reqwest`.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        client: reqwest::blocking::Client,
    }

    impl ReqwestClient {
        /// Creates a client with the given per-request timeout.
        ///
        /// # Errors
        ///
        /// Fails if the TLS backend cannot be initialised.
        pub fn new(timeout: Duration) -> SyncResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SyncError::transport_fatal(e.to_string()))?;
            Ok(Self { client })
        }

        fn finish(url: &str, response: reqwest::Result<reqwest::blocking::Response>) -> SyncResult<Json> {
            let response = response.map_err(convert)?;
            let status = response.status();
            if !status.is_success() {
                return Err(SyncError::Server {
                    status: status.as_u16(),
                    url: url.to_string(),
                });
            }
            response.json::<Json>().map_err(convert)
        }
    }

    fn convert(err: reqwest::Error) -> SyncError {
        if err.is_timeout() {
            SyncError::Timeout
        } else if err.is_decode() {
            SyncError::transport_fatal(format!("invalid JSON response: {err}"))
        } else if err.is_builder() {
            SyncError::InvalidUrl(err.url().map(|u| u.to_string()).unwrap_or_default())
        } else {
            SyncError::transport_retryable(err.to_string())
        }
    }

    impl HttpClient for ReqwestClient {
        fn get_json(&self, url: &str) -> SyncResult<Json> {
            tracing::debug!(url, "GET");
            Self::finish(url, self.client.get(url).send())
        }

        fn post_json(&self, url: &str, body: &Json) -> SyncResult<Json> {
            tracing::debug!(url, "POST");
            Self::finish(url, self.client.post(url).json(body).send())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    #[derive(Default)]
    struct CannedClient {
        calls: Mutex<Vec<(String, Option<Json>)>>,
        response: Json,
    }

    impl HttpClient for CannedClient {
        fn get_json(&self, url: &str) -> SyncResult<Json> {
            self.calls.lock().push((url.to_string(), None));
            Ok(self.response.clone())
        }

        fn post_json(&self, url: &str, body: &Json) -> SyncResult<Json> {
            self.calls.lock().push((url.to_string(), Some(body.clone())));
            Ok(self.response.clone())
        }
    }

    #[test]
    fn endpoints_normalise_trailing_slash() {
        let a = Endpoints::new("http://host/base").unwrap();
        let b = Endpoints::new("http://host/base/").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.changes(7), "http://host/base/_lowla/changes?seq=7");
        assert_eq!(a.pull(), "http://host/base/_lowla/pull");
        assert_eq!(a.push(), "http://host/base/_lowla/push");
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(matches!(Endpoints::new(""), Err(SyncError::InvalidUrl(_))));
        assert!(matches!(Endpoints::new("  "), Err(SyncError::InvalidUrl(_))));
    }

    #[test]
    fn pull_posts_ids_and_parses_records() {
        let client = CannedClient {
            response: json!([{"id": "d.c$1", "clientNs": "d.c"}, {"_id": "1"}]),
            ..CannedClient::default()
        };
        let transport = HttpTransport::new("http://h", client).unwrap();
        let records = transport
            .pull(&PullRequest::new(vec!["d.c$1".into()]))
            .unwrap();
        assert_eq!(records.len(), 1);

        let calls = transport.client().calls.lock();
        assert_eq!(calls[0].0, "http://h/_lowla/pull");
        assert_eq!(calls[0].1, Some(json!({"ids": ["d.c$1"]})));
    }

    #[test]
    fn malformed_changes_are_protocol_errors() {
        let client = CannedClient {
            response: json!({"atoms": "nope"}),
            ..CannedClient::default()
        };
        let transport = HttpTransport::new("http://h", client).unwrap();
        assert!(matches!(transport.changes(0), Err(SyncError::Protocol(_))));
    }
}
