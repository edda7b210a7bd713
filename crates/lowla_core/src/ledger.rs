//! Change ledger capture on local writes.
//!
//! Before a local write touches a document, the ledger records what the
//! document looked like before its first unsynced edit. Later edits in the
//! same dirty episode leave that snapshot alone, except that an edit which
//! restores the snapshot exactly removes the entry again.

use crate::error::CoreResult;
use crate::metadata::Metadata;
use lowla_codec::{json_equal, JsonDocument};
use lowla_storage::Transaction;

/// Updates the ledger for a local write of `lowla_id` inside `tx`.
///
/// `next` is the document about to be saved, or `None` for a removal.
/// Must run before the write itself so the snapshot sees the old value.
pub(crate) fn record_local_write(
    tx: &mut dyn Transaction,
    client_ns: &str,
    lowla_id: &str,
    next: Option<&JsonDocument>,
) -> CoreResult<()> {
    let mut meta = Metadata::load(&*tx)?;

    match meta.changes.get(lowla_id) {
        None => {
            let current = tx.load(client_ns, lowla_id)?;
            if let (Some(cur), Some(next)) = (&current, next) {
                if same_document(cur, next) {
                    // A write that leaves a clean document unchanged takes no
                    // snapshot, so it never becomes pending.
                    return Ok(());
                }
            }
            tracing::trace!(lowla_id, "ledger snapshot taken");
            meta.changes
                .insert(lowla_id.to_string(), current.unwrap_or_default());
            meta.store(tx)
        }
        Some(snapshot) => {
            if next.is_some_and(|doc| same_document(snapshot, doc)) {
                tracing::trace!(lowla_id, "edit reverted to snapshot; ledger entry dropped");
                meta.changes.remove(lowla_id);
                meta.store(tx)
            } else {
                Ok(())
            }
        }
    }
}

fn same_document(a: &JsonDocument, b: &JsonDocument) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .all(|(k, v)| b.get(k).is_some_and(|w| json_equal(v, w)))
}
