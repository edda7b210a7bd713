//! Push: sending ledger entries to the adapter.
//!
//! One push runs in chunks. Each chunk takes up to `chunk_size` ledger
//! entries not yet seen in this push, diffs each document against its
//! snapshot and sends the result. The server's answer is written back and
//! the acknowledged entries leave the ledger, both in one transaction, and
//! the next chunk is collected. Entries whose document no longer exists are
//! sent as tombstones once the live documents are exhausted.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::transport::SyncTransport;
use lowla_codec::{json_equal, validate_document, JsonDocument};
use lowla_core::{LowlaDb, LowlaEvent, Metadata, SaveCapture, METADATA_NS};
use lowla_storage::ScanOptions;
use lowla_sync_protocol::{AdapterRecord, PushDocument, PushOps, PushRequest};
use serde_json::Value as Json;
use std::collections::{BTreeSet, HashSet};

/// Which ledger entries [`clear_push_data`] drops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearScope {
    /// The whole ledger.
    All,
    /// One lowlaId.
    One(String),
    /// Several lowlaIds.
    Ids(Vec<String>),
}

/// Builds the next push chunk, or `None` when nothing is left to send.
///
/// `already_seen` carries the ids handled by earlier chunks of the same
/// push and is extended with every id this call looks at, including those
/// whose diff turned out empty.
///
/// # Errors
///
/// Fails if the store cannot be read or a document holds a malformed
/// tagged value.
pub fn collect_push_data(
    db: &LowlaDb,
    already_seen: &mut HashSet<String>,
    chunk_size: usize,
) -> SyncResult<Option<PushRequest>> {
    let chunk_size = chunk_size.max(1);
    let documents = db.transact(|tx| {
        let meta = Metadata::load(tx)?;
        let mut docs = Vec::new();
        if meta.changes.is_empty() {
            return Ok(docs);
        }

        for record in tx.scan(&ScanOptions::all())? {
            if docs.len() >= chunk_size {
                break;
            }
            if record.client_ns == METADATA_NS || already_seen.contains(&record.lowla_id) {
                continue;
            }
            already_seen.insert(record.lowla_id.clone());

            let Some(snapshot) = meta.changes.get(&record.lowla_id) else {
                continue;
            };
            let mut ops = diff(snapshot, &record.document);
            if ops.is_empty() && snapshot.is_empty() {
                // a new document holding nothing but its `_id`
                ops.set = record
                    .document
                    .get("_id")
                    .map(|id| JsonDocument::from_iter([("_id".to_string(), id.clone())]));
            }
            if !ops.is_empty() {
                docs.push(PushDocument::modified(
                    record.lowla_id,
                    snapshot.get("_version").cloned(),
                    ops,
                ));
            }
        }

        for (lowla_id, snapshot) in &meta.changes {
            if docs.len() >= chunk_size {
                break;
            }
            if already_seen.insert(lowla_id.clone()) {
                docs.push(PushDocument::tombstone(
                    lowla_id.clone(),
                    snapshot.get("_version").cloned(),
                ));
            }
        }
        Ok(docs)
    })?;

    for doc in &documents {
        if let Some(set) = doc.ops.as_ref().and_then(|ops| ops.set.as_ref()) {
            validate_document(set)?;
        }
    }

    if documents.is_empty() {
        Ok(None)
    } else {
        Ok(Some(PushRequest { documents }))
    }
}

/// Field-level difference from `snapshot` to `current`, ignoring `_id`.
fn diff(snapshot: &JsonDocument, current: &JsonDocument) -> PushOps {
    let set: JsonDocument = current
        .iter()
        .filter(|(k, v)| {
            k.as_str() != "_id" && !snapshot.get(k.as_str()).is_some_and(|old| json_equal(old, v))
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    let unset: JsonDocument = snapshot
        .keys()
        .filter(|k| k.as_str() != "_id" && !current.contains_key(k.as_str()))
        .map(|k| (k.clone(), Json::from(1)))
        .collect();

    PushOps {
        set: (!set.is_empty()).then_some(set),
        unset: (!unset.is_empty()).then_some(unset),
    }
}

/// Writes the server's answer to a push back into the store.
///
/// Records whose id was written locally while the push was in flight are
/// skipped, so they stay pending and the newer edit is pushed later. For
/// every other record the server's version is stored (or removed), the
/// client-side id is replaced when the server reports a `clientId`, and
/// the ledger entry is cleared. All of it commits together.
///
/// Returns the acknowledged client-side ids.
///
/// # Errors
///
/// Fails, writing nothing, if a returned document holds a malformed
/// tagged value or the store fails.
pub fn process_push_response(
    db: &LowlaDb,
    records: &[AdapterRecord],
    saved_during_push: &SaveCapture,
) -> SyncResult<Vec<String>> {
    let mut namespaces = BTreeSet::new();
    let acknowledged = db.transact(|tx| {
        let mut meta = Metadata::load(tx)?;
        let mut acknowledged = Vec::new();

        for record in records {
            let header = &record.header;
            let client_id = header.acknowledged_id();
            if saved_during_push.contains(&header.id) || saved_during_push.contains(client_id) {
                tracing::debug!(id = %header.id, "edited during push; keeping local version");
                continue;
            }

            let collection = db.collection_ns(&header.client_ns);
            let previous = header.client_id.as_deref().filter(|prev| *prev != header.id);
            match &record.document {
                Some(doc) if !header.deleted => {
                    collection.save_from_server(tx, &header.id, doc.clone(), previous)?;
                }
                _ => {
                    collection.remove_from_server(tx, &header.id)?;
                    if let Some(prev) = previous {
                        collection.remove_from_server(tx, prev)?;
                    }
                }
            }

            meta.changes.remove(client_id);
            meta.changes.remove(&header.id);
            namespaces.insert(header.client_ns.clone());
            acknowledged.push(client_id.to_string());
        }

        meta.store(tx)?;
        Ok(acknowledged)
    })?;

    for ns in &namespaces {
        db.live().notify(ns);
    }
    Ok(acknowledged)
}

/// Drops ledger entries without pushing them.
///
/// # Errors
///
/// Fails if the store cannot be written.
pub fn clear_push_data(db: &LowlaDb, scope: ClearScope) -> SyncResult<()> {
    db.transact(|tx| {
        let mut meta = Metadata::load(tx)?;
        match scope {
            ClearScope::All => meta.changes.clear(),
            ClearScope::One(id) => {
                meta.changes.remove(&id);
            }
            ClearScope::Ids(ids) => {
                for id in &ids {
                    meta.changes.remove(id);
                }
            }
        }
        meta.store(tx)
    })?;
    Ok(())
}

/// Pushes every pending local edit, chunk by chunk.
///
/// Emits `PushBegin` and `PushEnd` around the exchange when there is
/// anything to send. Returns the number of documents sent.
///
/// # Errors
///
/// Stops at the first failed request or write-back. Chunks already
/// acknowledged stay applied.
pub fn push_changes(
    db: &LowlaDb,
    transport: &dyn SyncTransport,
    config: &SyncConfig,
) -> SyncResult<usize> {
    // open before the first collect, held until the last write-back
    let capture = db.capture_saves();
    let mut seen = HashSet::new();
    let Some(first) = collect_push_data(db, &mut seen, config.chunk_size)? else {
        return Ok(0);
    };

    db.events().emit(LowlaEvent::PushBegin);
    let result = push_chunks(db, transport, config, first, &mut seen, &capture);
    drop(capture);
    db.events().emit(LowlaEvent::PushEnd);
    result
}

fn push_chunks(
    db: &LowlaDb,
    transport: &dyn SyncTransport,
    config: &SyncConfig,
    first: PushRequest,
    seen: &mut HashSet<String>,
    capture: &SaveCapture,
) -> SyncResult<usize> {
    let mut sent = 0;
    let mut next = Some(first);
    while let Some(request) = next {
        tracing::debug!(documents = request.documents.len(), "pushing chunk");
        let response = transport.push(&request)?;
        let acknowledged = process_push_response(db, &response, capture)?;
        tracing::debug!(
            sent = request.documents.len(),
            acknowledged = acknowledged.len(),
            "push chunk applied"
        );
        sent += request.documents.len();
        next = collect_push_data(db, seen, config.chunk_size)?;
    }
    Ok(sent)
}
