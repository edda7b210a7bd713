//! Transport abstraction for the adapter endpoints.

use crate::error::SyncResult;
use lowla_sync_protocol::{AdapterRecord, ChangesResponse, PullRequest, PushRequest};

/// The three adapter calls a sync cycle makes.
///
/// Implementations return parsed payloads; [`HttpTransport`](crate::HttpTransport)
/// is the HTTP one, test doubles implement it directly.
pub trait SyncTransport: Send + Sync {
    /// Lists documents changed since `sequence`.
    fn changes(&self, sequence: u64) -> SyncResult<ChangesResponse>;

    /// Fetches full documents for one chunk of ids.
    fn pull(&self, request: &PullRequest) -> SyncResult<Vec<AdapterRecord>>;

    /// Sends one chunk of local edits and returns the server's versions.
    fn push(&self, request: &PushRequest) -> SyncResult<Vec<AdapterRecord>>;
}

impl<T: SyncTransport + ?Sized> SyncTransport for std::sync::Arc<T> {
    fn changes(&self, sequence: u64) -> SyncResult<ChangesResponse> {
        (**self).changes(sequence)
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<Vec<AdapterRecord>> {
        (**self).pull(request)
    }

    fn push(&self, request: &PushRequest) -> SyncResult<Vec<AdapterRecord>> {
        (**self).push(request)
    }
}
