//! Uncommitted writes of one transaction.

use crate::record::{RecordKey, ScanOptions, StoredRecord};
use lowla_codec::JsonDocument;
use std::collections::BTreeMap;

/// Pending writes layered over committed state so a transaction reads its
/// own writes. `None` marks a removal.
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    writes: BTreeMap<RecordKey, Option<JsonDocument>>,
}

impl WriteSet {
    /// `Some(None)` if removed in this transaction, `None` if untouched.
    pub(crate) fn get(&self, key: &RecordKey) -> Option<Option<&JsonDocument>> {
        self.writes.get(key).map(Option::as_ref)
    }

    pub(crate) fn put(&mut self, key: RecordKey, document: JsonDocument) {
        self.writes.insert(key, Some(document));
    }

    pub(crate) fn delete(&mut self, key: RecordKey) {
        self.writes.insert(key, None);
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub(crate) fn into_inner(self) -> BTreeMap<RecordKey, Option<JsonDocument>> {
        self.writes
    }

    /// Applies pending writes to an already-filtered committed scan result,
    /// keeping key order.
    pub(crate) fn merge_scan(
        &self,
        committed: Vec<StoredRecord>,
        options: &ScanOptions,
    ) -> Vec<StoredRecord> {
        if self.writes.is_empty() {
            return committed;
        }

        let mut merged: BTreeMap<RecordKey, JsonDocument> = committed
            .into_iter()
            .map(|r| (r.key(), r.document))
            .collect();

        for (key, write) in &self.writes {
            match write {
                Some(doc) if options.matches(&key.client_ns, doc) => {
                    merged.insert(key.clone(), doc.clone());
                }
                _ => {
                    merged.remove(key);
                }
            }
        }

        merged
            .into_iter()
            .map(|(key, document)| StoredRecord {
                client_ns: key.client_ns,
                lowla_id: key.lowla_id,
                document,
            })
            .collect()
    }
}
