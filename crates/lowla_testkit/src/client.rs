//! HTTP client answering from a queue.

use lowla_sync::{HttpClient, SyncError, SyncResult};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::VecDeque;

/// One request made through a [`ScriptedClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    /// `GET` or `POST`.
    pub method: &'static str,
    /// Full URL.
    pub url: String,
    /// JSON body of a `POST`.
    pub body: Option<Json>,
}

/// An [`HttpClient`] that hands out queued responses in order and records
/// every request. An empty queue answers with a fatal transport error.
#[derive(Debug, Default)]
pub struct ScriptedClient {
    responses: Mutex<VecDeque<SyncResult<Json>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedClient {
    /// A client with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful response body.
    #[must_use]
    pub fn respond(self, body: Json) -> Self {
        self.responses.lock().push_back(Ok(body));
        self
    }

    /// Queues a failure.
    #[must_use]
    pub fn fail(self, error: SyncError) -> Self {
        self.responses.lock().push_back(Err(error));
        self
    }

    /// Requests made so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    /// Responses not yet handed out.
    pub fn remaining(&self) -> usize {
        self.responses.lock().len()
    }

    fn next(&self, method: &'static str, url: &str, body: Option<&Json>) -> SyncResult<Json> {
        self.requests.lock().push(RecordedRequest {
            method,
            url: url.to_string(),
            body: body.cloned(),
        });
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(SyncError::transport_fatal(format!("no response scripted for {url}"))))
    }
}

impl HttpClient for ScriptedClient {
    fn get_json(&self, url: &str) -> SyncResult<Json> {
        self.next("GET", url, None)
    }

    fn post_json(&self, url: &str, body: &Json) -> SyncResult<Json> {
        self.next("POST", url, Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn answers_in_order_then_runs_dry() {
        let client = ScriptedClient::new()
            .respond(json!({"atoms": []}))
            .fail(SyncError::Timeout);

        assert_eq!(client.get_json("u1").unwrap(), json!({"atoms": []}));
        assert!(matches!(
            client.post_json("u2", &json!({"ids": []})),
            Err(SyncError::Timeout)
        ));
        assert!(client.get_json("u3").is_err());
        assert_eq!(client.remaining(), 0);

        let requests = client.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1].method, "POST");
        assert_eq!(requests[1].body, Some(json!({"ids": []})));
    }
}
