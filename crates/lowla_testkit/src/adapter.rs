//! In-process sync adapter.
//!
//! Keeps every document with a monotonically increasing version and server
//! sequence, answers the three adapter endpoints, and exposes knobs for the
//! awkward cases a real adapter produces: unacknowledged pushes, pulls that
//! leave documents out, server-assigned ids and outages.

use lowla_codec::JsonDocument;
use lowla_sync::{HttpClient, SyncError, SyncResult, SyncTransport};
use lowla_sync_protocol::{
    to_adapter_payload, AdapterRecord, Atom, ChangesResponse, LoadPayload, ProtocolError,
    PullRequest, PushDocument, PushRequest, RecordHeader,
};
use parking_lot::Mutex;
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap, HashSet};

/// One request seen by a [`FakeAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterCall {
    /// `changes` with the client's sequence.
    Changes(u64),
    /// `pull` with the requested ids.
    Pull(Vec<String>),
    /// `push` with the pushed ids, in order.
    Push(Vec<String>),
}

#[derive(Debug, Clone)]
struct ServerDoc {
    client_ns: String,
    document: JsonDocument,
    version: u64,
    sequence: u64,
    deleted: bool,
}

#[derive(Default)]
struct Inner {
    docs: BTreeMap<String, ServerDoc>,
    sequence: u64,
    unacknowledged: HashSet<String>,
    withheld: HashSet<String>,
    renames: HashMap<String, String>,
    failures: usize,
    calls: Vec<AdapterCall>,
}

impl Inner {
    fn bump(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn check_outage(&mut self) -> SyncResult<()> {
        if self.failures > 0 {
            self.failures -= 1;
            return Err(SyncError::transport_retryable("adapter unavailable"));
        }
        Ok(())
    }

    fn write(&mut self, lowla_id: &str, mut document: JsonDocument) -> &ServerDoc {
        let sequence = self.bump();
        let client_ns = namespace_of(lowla_id).to_string();
        let version = self.docs.get(lowla_id).map_or(0, |d| d.version) + 1;
        document.insert("_version".into(), Json::from(version));
        self.docs.insert(
            lowla_id.to_string(),
            ServerDoc {
                client_ns,
                document,
                version,
                sequence,
                deleted: false,
            },
        );
        &self.docs[lowla_id]
    }

    fn tombstone(&mut self, lowla_id: &str) -> u64 {
        let sequence = self.bump();
        let entry = self
            .docs
            .entry(lowla_id.to_string())
            .or_insert_with(|| ServerDoc {
                client_ns: namespace_of(lowla_id).to_string(),
                document: JsonDocument::new(),
                version: 0,
                sequence,
                deleted: true,
            });
        entry.version += 1;
        entry.sequence = sequence;
        entry.deleted = true;
        entry.document.clear();
        sequence
    }

    fn apply_push(&mut self, pushed: &PushDocument) -> AdapterRecord {
        let client_id = pushed.id().to_string();
        let client_ns = namespace_of(&client_id).to_string();

        if pushed.lowla.deleted {
            let sequence = self.tombstone(&client_id);
            return AdapterRecord::delete(RecordHeader::new(client_id, client_ns).with_sequence(sequence));
        }

        let mut document = self
            .docs
            .get(&client_id)
            .filter(|d| !d.deleted)
            .map(|d| d.document.clone())
            .unwrap_or_default();
        if let Some(ops) = &pushed.ops {
            for (field, value) in ops.set.iter().flatten() {
                document.insert(field.clone(), value.clone());
            }
            for field in ops.unset.iter().flat_map(|u| u.keys()) {
                document.remove(field);
            }
        }

        let server_id = self.renames.remove(&client_id).unwrap_or_else(|| client_id.clone());
        document.insert("_id".into(), Json::from(local_part(&server_id)));
        if server_id != client_id {
            self.docs.remove(&client_id);
        }

        let stored = self.write(&server_id, document);
        let mut header = RecordHeader::new(server_id.clone(), client_ns).with_sequence(stored.sequence);
        if server_id != client_id {
            header = header.with_client_id(client_id);
        }
        AdapterRecord::upsert(header, stored.document.clone())
    }

    fn record_for(&self, lowla_id: &str) -> Option<AdapterRecord> {
        let doc = self.docs.get(lowla_id)?;
        let header = RecordHeader::new(lowla_id, doc.client_ns.clone()).with_sequence(doc.sequence);
        Some(if doc.deleted {
            AdapterRecord::delete(header)
        } else {
            AdapterRecord::upsert(header, doc.document.clone())
        })
    }
}

fn namespace_of(lowla_id: &str) -> &str {
    lowla_id.split_once('$').map_or(lowla_id, |(ns, _)| ns)
}

fn local_part(lowla_id: &str) -> &str {
    lowla_id.split_once('$').map_or(lowla_id, |(_, id)| id)
}

/// An in-memory adapter.
///
/// Server documents carry an integer `_version` that grows with every
/// write. Pushed edits are applied as `$set`/`$unset` on top of the
/// current server document, last writer wins.
#[derive(Default)]
pub struct FakeAdapter {
    inner: Mutex<Inner>,
}

impl std::fmt::Debug for FakeAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("FakeAdapter")
            .field("documents", &inner.docs.len())
            .field("sequence", &inner.sequence)
            .finish_non_exhaustive()
    }
}

impl FakeAdapter {
    /// An empty adapter at sequence 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes `document` under `lowla_id` as if another client had pushed
    /// it. Returns the new server sequence.
    ///
    /// # Panics
    ///
    /// Panics if `document` is not a JSON object.
    pub fn put(&self, lowla_id: &str, document: Json) -> u64 {
        let Json::Object(mut document) = document else {
            panic!("server documents must be objects")
        };
        document
            .entry("_id")
            .or_insert_with(|| Json::from(local_part(lowla_id)));
        self.inner.lock().write(lowla_id, document).sequence
    }

    /// Deletes `lowla_id` on the server. Returns the new server sequence.
    pub fn delete(&self, lowla_id: &str) -> u64 {
        self.inner.lock().tombstone(lowla_id)
    }

    /// The live server document under `lowla_id`.
    pub fn document(&self, lowla_id: &str) -> Option<JsonDocument> {
        self.inner
            .lock()
            .docs
            .get(lowla_id)
            .filter(|d| !d.deleted)
            .map(|d| d.document.clone())
    }

    /// Whether `lowla_id` is known and deleted.
    pub fn is_deleted(&self, lowla_id: &str) -> bool {
        self.inner.lock().docs.get(lowla_id).is_some_and(|d| d.deleted)
    }

    /// Every live lowlaId, sorted.
    pub fn live_ids(&self) -> Vec<String> {
        self.inner
            .lock()
            .docs
            .iter()
            .filter(|(_, d)| !d.deleted)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Current server sequence.
    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// Accepts the next push of `lowla_id` but leaves it out of the answer.
    pub fn skip_ack(&self, lowla_id: &str) {
        self.inner.lock().unacknowledged.insert(lowla_id.to_string());
    }

    /// Leaves `lowla_id` out of every pull answer until
    /// [`FakeAdapter::release`] is called.
    pub fn withhold(&self, lowla_id: &str) {
        self.inner.lock().withheld.insert(lowla_id.to_string());
    }

    /// Stops withholding `lowla_id`.
    pub fn release(&self, lowla_id: &str) {
        self.inner.lock().withheld.remove(lowla_id);
    }

    /// Stores the next push of `client_id` under `server_id` instead and
    /// reports the rename through `clientId`.
    pub fn rename_on_push(&self, client_id: &str, server_id: &str) {
        self.inner
            .lock()
            .renames
            .insert(client_id.to_string(), server_id.to_string());
    }

    /// Fails the next `count` requests with a retryable transport error.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failures = count;
    }

    /// Requests seen so far, in order.
    pub fn calls(&self) -> Vec<AdapterCall> {
        self.inner.lock().calls.clone()
    }

    /// Forgets recorded requests.
    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Every live document as a bootstrap payload, `chunk_size` records per
    /// chunk.
    pub fn load_payload(&self, chunk_size: usize) -> LoadPayload {
        let inner = self.inner.lock();
        let records: Vec<AdapterRecord> = inner
            .docs
            .iter()
            .filter(|(_, d)| !d.deleted)
            .filter_map(|(id, _)| inner.record_for(id))
            .collect();
        LoadPayload {
            documents: records
                .chunks(chunk_size.max(1))
                .map(<[AdapterRecord]>::to_vec)
                .collect(),
            sequence: inner.sequence,
        }
    }
}

impl SyncTransport for FakeAdapter {
    fn changes(&self, sequence: u64) -> SyncResult<ChangesResponse> {
        let mut inner = self.inner.lock();
        inner.calls.push(AdapterCall::Changes(sequence));
        inner.check_outage()?;

        let mut atoms: Vec<Atom> = inner
            .docs
            .iter()
            .filter(|(_, d)| d.sequence > sequence)
            .map(|(id, d)| Atom {
                id: id.clone(),
                sequence: d.sequence,
                version: Some(Json::from(d.version)),
                client_ns: d.client_ns.clone(),
                deleted: d.deleted,
            })
            .collect();
        atoms.sort_by_key(|a| a.sequence);
        Ok(ChangesResponse {
            atoms,
            sequence: inner.sequence,
        })
    }

    fn pull(&self, request: &PullRequest) -> SyncResult<Vec<AdapterRecord>> {
        let mut inner = self.inner.lock();
        inner.calls.push(AdapterCall::Pull(request.ids.clone()));
        inner.check_outage()?;

        Ok(request
            .ids
            .iter()
            .filter(|id| !inner.withheld.contains(id.as_str()))
            .filter_map(|id| inner.record_for(id))
            .collect())
    }

    fn push(&self, request: &PushRequest) -> SyncResult<Vec<AdapterRecord>> {
        let mut inner = self.inner.lock();
        inner.calls.push(AdapterCall::Push(
            request.documents.iter().map(|d| d.id().to_string()).collect(),
        ));
        inner.check_outage()?;

        let mut answer = Vec::with_capacity(request.documents.len());
        for pushed in &request.documents {
            let record = inner.apply_push(pushed);
            if inner.unacknowledged.remove(pushed.id()) {
                tracing::debug!(id = pushed.id(), "push accepted without acknowledgement");
                continue;
            }
            answer.push(record);
        }
        Ok(answer)
    }
}

/// Routes adapter URLs to the [`SyncTransport`] implementation, so the
/// adapter can sit behind an [`HttpTransport`](lowla_sync::HttpTransport).
/// `GET .../_lowla/load` answers [`FakeAdapter::load_payload`] in chunks of
/// ten.
impl HttpClient for FakeAdapter {
    fn get_json(&self, url: &str) -> SyncResult<Json> {
        if let Some((_, query)) = url.split_once("_lowla/changes?seq=") {
            let sequence = query.parse().map_err(|_| SyncError::Server {
                status: 400,
                url: url.to_string(),
            })?;
            let changes = self.changes(sequence)?;
            return Ok(serde_json::to_value(changes).map_err(ProtocolError::from)?);
        }
        if url.ends_with("_lowla/load") {
            return Ok(self.load_payload(10).to_json());
        }
        Err(SyncError::Server {
            status: 404,
            url: url.to_string(),
        })
    }

    fn post_json(&self, url: &str, body: &Json) -> SyncResult<Json> {
        if url.ends_with("_lowla/pull") {
            let request: PullRequest =
                serde_json::from_value(body.clone()).map_err(ProtocolError::from)?;
            return Ok(to_adapter_payload(&self.pull(&request)?));
        }
        if url.ends_with("_lowla/push") {
            let request: PushRequest =
                serde_json::from_value(body.clone()).map_err(ProtocolError::from)?;
            return Ok(to_adapter_payload(&self.push(&request)?));
        }
        Err(SyncError::Server {
            status: 404,
            url: url.to_string(),
        })
    }
}
