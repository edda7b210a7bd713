//! Volatile engine for tests and ephemeral sessions.

use crate::datastore::{Datastore, Transaction};
use crate::error::{StorageError, StorageResult};
use crate::overlay::WriteSet;
use crate::record::{RecordKey, ScanOptions, StoredRecord};
use lowla_codec::JsonDocument;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// A document store held entirely in memory.
///
/// There is no secondary index; scans by `_id` walk the namespace.
#[derive(Debug, Default)]
pub struct MemoryDatastore {
    records: RwLock<BTreeMap<RecordKey, JsonDocument>>,
    writer: Mutex<()>,
    closed: AtomicBool,
}

impl MemoryDatastore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }
}

impl Datastore for MemoryDatastore {
    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>> {
        self.ensure_open()?;
        let guard = self.writer.lock();
        Ok(Box::new(MemoryTransaction {
            store: self,
            _guard: guard,
            writes: WriteSet::default(),
        }))
    }

    fn count(&self, client_ns: &str) -> StorageResult<usize> {
        self.ensure_open()?;
        let records = self.records.read();
        Ok(records.keys().filter(|k| k.client_ns == client_ns).count())
    }

    fn close(&self) -> StorageResult<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn engine_name(&self) -> &'static str {
        "memory"
    }
}

struct MemoryTransaction<'a> {
    store: &'a MemoryDatastore,
    _guard: MutexGuard<'a, ()>,
    writes: WriteSet,
}

impl Transaction for MemoryTransaction<'_> {
    fn load(&self, client_ns: &str, lowla_id: &str) -> StorageResult<Option<JsonDocument>> {
        let key = RecordKey::new(client_ns, lowla_id);
        if let Some(pending) = self.writes.get(&key) {
            return Ok(pending.cloned());
        }
        Ok(self.store.records.read().get(&key).cloned())
    }

    fn save(
        &mut self,
        client_ns: &str,
        lowla_id: &str,
        document: JsonDocument,
    ) -> StorageResult<()> {
        self.writes.put(RecordKey::new(client_ns, lowla_id), document);
        Ok(())
    }

    fn remove(&mut self, client_ns: &str, lowla_id: &str) -> StorageResult<()> {
        self.writes.delete(RecordKey::new(client_ns, lowla_id));
        Ok(())
    }

    fn scan(&self, options: &ScanOptions) -> StorageResult<Vec<StoredRecord>> {
        let committed = self
            .store
            .records
            .read()
            .iter()
            .filter(|(key, doc)| options.matches(&key.client_ns, doc))
            .map(|(key, doc)| StoredRecord {
                client_ns: key.client_ns.clone(),
                lowla_id: key.lowla_id.clone(),
                document: doc.clone(),
            })
            .collect();
        Ok(self.writes.merge_scan(committed, options))
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.store.ensure_open()?;
        if this.writes.is_empty() {
            return Ok(());
        }
        let mut records = this.store.records.write();
        for (key, write) in this.writes.into_inner() {
            match write {
                Some(doc) => {
                    records.insert(key, doc);
                }
                None => {
                    records.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn abort(self: Box<Self>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: serde_json::Value) -> JsonDocument {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn reads_own_writes_before_commit() {
        let store = MemoryDatastore::new();
        let mut tx = store.begin().unwrap();
        tx.save("a.b", "a.b$1", doc(json!({"_id": 1}))).unwrap();
        assert!(tx.load("a.b", "a.b$1").unwrap().is_some());
        assert_eq!(tx.scan(&ScanOptions::namespace("a.b")).unwrap().len(), 1);
        tx.abort();

        let tx = store.begin().unwrap();
        assert!(tx.load("a.b", "a.b$1").unwrap().is_none());
    }

    #[test]
    fn closed_store_rejects_work() {
        let store = MemoryDatastore::new();
        store.close().unwrap();
        assert!(matches!(store.begin(), Err(StorageError::Closed)));
        assert!(matches!(store.count("a.b"), Err(StorageError::Closed)));
    }
}
