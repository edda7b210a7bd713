//! Seeding a store from a prepared dataset.

use crate::error::SyncResult;
use crate::http::HttpClient;
use crate::pull::{process_pull_payload, update_sequence};
use lowla_core::LowlaDb;
use lowla_sync_protocol::LoadPayload;

/// Applies every chunk of `payload` as if it had been pulled, then stores
/// its sequence. Documents with pending local edits are left alone.
///
/// Returns the number of records applied.
///
/// # Errors
///
/// Stops at the first chunk that fails to apply. Earlier chunks stay
/// applied and the sequence is not stored.
pub fn load_payload(db: &LowlaDb, payload: &LoadPayload) -> SyncResult<usize> {
    let mut applied = 0;
    for chunk in &payload.documents {
        applied += process_pull_payload(db, chunk)?.applied;
    }
    update_sequence(db, payload.sequence)?;
    tracing::info!(applied, sequence = payload.sequence, "bootstrap data loaded");
    Ok(applied)
}

/// Fetches a load payload with `GET url` and applies it.
///
/// # Errors
///
/// Fails if the request fails, the body is not a load payload, or applying
/// it fails.
pub fn load_from_url(db: &LowlaDb, client: &dyn HttpClient, url: &str) -> SyncResult<usize> {
    tracing::debug!(url, "fetching bootstrap data");
    let body = client.get_json(url)?;
    let payload = LoadPayload::from_json(&body)?;
    load_payload(db, &payload)
}
