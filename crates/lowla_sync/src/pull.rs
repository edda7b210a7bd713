//! Pull: applying server changes locally.
//!
//! A pull asks the adapter which documents changed since the stored
//! sequence, then fetches them in chunks. A server version never replaces a
//! document with a pending local edit; that conflict is left for the next
//! push to settle. The stored sequence advances only after every advertised
//! document has come back, so a partial pull is repeated in full next time.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::transport::SyncTransport;
use lowla_core::{LowlaDb, LowlaEvent, Metadata};
use lowla_sync_protocol::{AdapterRecord, ChangesResponse, PullRequest};
use std::collections::{BTreeSet, HashSet};

/// What one pull payload did to the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullOutcome {
    /// Records written or removed.
    pub applied: usize,
    /// Records dropped because the document has a pending local edit.
    pub skipped: usize,
    /// Largest header sequence in the payload.
    pub max_sequence: u64,
    /// Namespaces named by the payload.
    pub namespaces: BTreeSet<String>,
}

/// Applies one pull-shaped payload in a single transaction, then notifies
/// live cursors of every namespace it names.
///
/// # Errors
///
/// Fails, writing nothing, if any document holds a malformed tagged value
/// or the store fails.
pub fn process_pull_payload(db: &LowlaDb, records: &[AdapterRecord]) -> SyncResult<PullOutcome> {
    let mut outcome = PullOutcome::default();
    db.transact(|tx| {
        let meta = Metadata::load(tx)?;
        for record in records {
            let header = &record.header;
            outcome.namespaces.insert(header.client_ns.clone());
            outcome.max_sequence = outcome.max_sequence.max(header.sequence.unwrap_or(0));

            if meta.is_pending(&header.id) {
                tracing::debug!(id = %header.id, "pending local edit; server version ignored");
                outcome.skipped += 1;
                continue;
            }

            let collection = db.collection_ns(&header.client_ns);
            match &record.document {
                Some(doc) if !header.deleted => {
                    collection.save_from_server(tx, &header.id, doc.clone(), None)?;
                }
                _ => collection.remove_from_server(tx, &header.id)?,
            }
            outcome.applied += 1;
        }
        Ok(())
    })?;

    for ns in &outcome.namespaces {
        db.live().notify(ns);
    }
    Ok(outcome)
}

/// Stores `sequence` as the last fully applied server sequence.
///
/// # Errors
///
/// Fails if the store cannot be written.
pub fn update_sequence(db: &LowlaDb, sequence: u64) -> SyncResult<()> {
    db.transact(|tx| {
        let mut meta = Metadata::load(tx)?;
        meta.sequence = sequence;
        meta.store(tx)
    })?;
    tracing::debug!(sequence, "sequence updated");
    Ok(())
}

/// Asks the adapter what changed since the stored sequence.
///
/// # Errors
///
/// Fails if the store cannot be read or the request fails.
pub fn fetch_changes(db: &LowlaDb, transport: &dyn SyncTransport) -> SyncResult<ChangesResponse> {
    let sequence = db.metadata()?.sequence;
    transport.changes(sequence)
}

/// Pulls every document advertised by `changes`.
///
/// Emits `PullBegin` and `PullEnd` around the exchange when there is
/// anything to fetch. Returns the number of records applied.
///
/// # Errors
///
/// Stops at the first failed request or write. Chunks already applied stay
/// applied; the sequence is left untouched.
pub fn process_changes(
    db: &LowlaDb,
    transport: &dyn SyncTransport,
    changes: &ChangesResponse,
    config: &SyncConfig,
) -> SyncResult<usize> {
    if changes.atoms.is_empty() {
        return Ok(0);
    }

    db.events().emit(LowlaEvent::PullBegin);
    let result = pull_chunks(db, transport, changes, config.chunk_size.max(1));
    db.events().emit(LowlaEvent::PullEnd);
    result
}

fn pull_chunks(
    db: &LowlaDb,
    transport: &dyn SyncTransport,
    changes: &ChangesResponse,
    chunk_size: usize,
) -> SyncResult<usize> {
    let mut outstanding: Vec<String> = Vec::with_capacity(changes.atoms.len());
    for atom in &changes.atoms {
        if !outstanding.contains(&atom.id) {
            outstanding.push(atom.id.clone());
        }
    }

    let mut complete = true;
    let mut applied = 0;
    while !outstanding.is_empty() {
        let take = chunk_size.min(outstanding.len());
        let requested: Vec<String> = outstanding.drain(..take).collect();
        let records = transport.pull(&PullRequest::new(requested.clone()))?;

        let returned: HashSet<&str> = records.iter().map(|r| r.header.id.as_str()).collect();
        let missing = requested
            .iter()
            .filter(|id| !returned.contains(id.as_str()))
            .count();
        if missing > 0 {
            tracing::debug!(missing, "adapter did not return every requested document");
            complete = false;
        }
        outstanding.retain(|id| !returned.contains(id.as_str()));

        applied += process_pull_payload(db, &records)?.applied;
    }

    if complete {
        update_sequence(db, changes.target_sequence())?;
    } else {
        tracing::info!("pull incomplete; sequence not advanced");
    }
    Ok(applied)
}

/// Fetches and applies everything changed since the stored sequence.
///
/// # Errors
///
/// See [`fetch_changes`] and [`process_changes`].
pub fn pull_changes(
    db: &LowlaDb,
    transport: &dyn SyncTransport,
    config: &SyncConfig,
) -> SyncResult<usize> {
    let changes = fetch_changes(db, transport)?;
    process_changes(db, transport, &changes, config)
}
