//! Durable engine: an append-only frame log replayed into memory on open.

mod dir;
mod frame;

use crate::backend::{FileBackend, StorageBackend};
use crate::datastore::{Datastore, Transaction};
use crate::error::{StorageError, StorageResult};
use crate::overlay::WriteSet;
use crate::record::{RecordKey, ScanOptions, StoredRecord};
use dir::StoreDir;
use frame::{Frame, FrameKind, FrameRead, LogOp};
use lowla_codec::JsonDocument;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde_json::Value as Json;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Options for opening a [`LogDatastore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogOptions {
    /// Create the store directory if it does not exist.
    pub create_if_missing: bool,
    /// Call `sync` on the backend after every commit.
    pub sync_on_commit: bool,
}

impl Default for LogOptions {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
        }
    }
}

impl LogOptions {
    /// Sets whether a missing directory is created.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether each commit is synced to disk.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }
}

/// Committed records plus the `(clientNs, _id)` index.
#[derive(Debug, Default)]
struct LogState {
    records: BTreeMap<RecordKey, JsonDocument>,
    by_id: HashMap<(String, String), BTreeSet<RecordKey>>,
}

impl LogState {
    fn put(&mut self, key: RecordKey, document: JsonDocument) {
        self.unindex(&key);
        if let Some(id) = document.get("_id") {
            self.by_id
                .entry((key.client_ns.clone(), index_key(id)))
                .or_default()
                .insert(key.clone());
        }
        self.records.insert(key, document);
    }

    fn delete(&mut self, key: &RecordKey) {
        self.unindex(key);
        self.records.remove(key);
    }

    fn unindex(&mut self, key: &RecordKey) {
        let Some(id) = self.records.get(key).and_then(|d| d.get("_id")) else {
            return;
        };
        let slot = (key.client_ns.clone(), index_key(id));
        if let Some(keys) = self.by_id.get_mut(&slot) {
            keys.remove(key);
            if keys.is_empty() {
                self.by_id.remove(&slot);
            }
        }
    }

    fn apply(&mut self, frame: Frame) {
        if frame.kind == FrameKind::Snapshot {
            *self = Self::default();
        }
        for op in frame.ops {
            match op {
                LogOp::Put { key, document } => self.put(key, document),
                LogOp::Delete { key } => self.delete(&key),
            }
        }
    }

    fn scan(&self, options: &ScanOptions) -> Vec<StoredRecord> {
        let to_record = |key: &RecordKey, doc: &JsonDocument| StoredRecord {
            client_ns: key.client_ns.clone(),
            lowla_id: key.lowla_id.clone(),
            document: doc.clone(),
        };

        match (&options.client_ns, &options.id) {
            (Some(ns), Some(id)) => self
                .by_id
                .get(&(ns.clone(), index_key(id)))
                .into_iter()
                .flatten()
                .filter_map(|key| self.records.get(key).map(|doc| (key, doc)))
                .filter(|(key, doc)| options.matches(&key.client_ns, doc))
                .map(|(key, doc)| to_record(key, doc))
                .collect(),
            (Some(ns), None) => self
                .records
                .range(RecordKey::new(ns.as_str(), "")..)
                .take_while(|(key, _)| key.client_ns == *ns)
                .map(|(key, doc)| to_record(key, doc))
                .collect(),
            (None, _) => self
                .records
                .iter()
                .filter(|(key, doc)| options.matches(&key.client_ns, doc))
                .map(|(key, doc)| to_record(key, doc))
                .collect(),
        }
    }

    fn count(&self, client_ns: &str) -> usize {
        self.records
            .range(RecordKey::new(client_ns, "")..)
            .take_while(|(key, _)| key.client_ns == client_ns)
            .count()
    }

    fn snapshot(&self) -> Frame {
        Frame {
            kind: FrameKind::Snapshot,
            ops: self
                .records
                .iter()
                .map(|(key, document)| LogOp::Put {
                    key: key.clone(),
                    document: document.clone(),
                })
                .collect(),
        }
    }
}

/// Index slot for an `_id` value. Integral numbers share a slot regardless
/// of representation so that `1` and `1.0` find each other.
fn index_key(id: &Json) -> String {
    if let Json::Number(n) = id {
        if n.as_i64().is_none() {
            if let Some(f) = n.as_f64() {
                if f.fract() == 0.0 && f.abs() < 9.0e15 {
                    return format!("{}", f as i64);
                }
            }
        }
    }
    id.to_string()
}

/// A durable document store.
///
/// Every commit appends one checksummed frame holding the transaction's
/// writes. On open the log is replayed into memory; a frame cut short by a
/// crash at the tail is truncated away and the store opens with every
/// earlier commit intact.
///
/// A secondary index on `(clientNs, _id)` serves scans that carry an `_id`.
pub struct LogDatastore<B: StorageBackend> {
    backend: Mutex<B>,
    state: RwLock<LogState>,
    writer: Mutex<()>,
    options: LogOptions,
    dir: Option<StoreDir>,
    closed: AtomicBool,
}

impl<B: StorageBackend> std::fmt::Debug for LogDatastore<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogDatastore")
            .field("records", &self.state.read().records.len())
            .field("options", &self.options)
            .field("dir", &self.dir.as_ref().map(StoreDir::path))
            .finish()
    }
}

impl<B: StorageBackend> LogDatastore<B> {
    /// Opens a store over `backend`, replaying whatever it holds.
    ///
    /// # Errors
    ///
    /// Fails if the log is damaged anywhere other than its final frame.
    pub fn open(backend: B, options: LogOptions) -> StorageResult<Self> {
        Self::open_with_dir(backend, options, None)
    }

    fn open_with_dir(mut backend: B, options: LogOptions, dir: Option<StoreDir>) -> StorageResult<Self> {
        let state = replay(&mut backend)?;
        tracing::info!(
            records = state.records.len(),
            bytes = backend.size()?,
            "opened log store"
        );
        Ok(Self {
            backend: Mutex::new(backend),
            state: RwLock::new(state),
            writer: Mutex::new(()),
            options,
            dir,
            closed: AtomicBool::new(false),
        })
    }

    /// Size of the log in bytes.
    ///
    /// # Errors
    ///
    /// Fails if the backend cannot report its size.
    pub fn log_size(&self) -> StorageResult<u64> {
        self.backend.lock().size()
    }

    fn ensure_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed);
        }
        Ok(())
    }

    fn append_frame(backend: &mut B, frame: &Frame, sync: bool) -> StorageResult<()> {
        let bytes = frame.encode()?;
        let start = backend.size()?;
        if let Err(err) = write_bytes(backend, &bytes, sync) {
            // Leave no partial frame behind for the next append to follow.
            if let Err(cleanup) = backend.truncate(start) {
                tracing::warn!(error = %cleanup, "failed to roll back partial frame");
            }
            return Err(err);
        }
        Ok(())
    }
}

impl LogDatastore<FileBackend> {
    /// Opens the store kept in directory `path`.
    ///
    /// # Errors
    ///
    /// Fails if the directory is missing and `create_if_missing` is off, if
    /// another process holds it, or if the log is damaged.
    pub fn open_dir(path: &Path, options: LogOptions) -> StorageResult<Self> {
        let dir = StoreDir::open(path, options.create_if_missing)?;
        let backend = FileBackend::open(&dir.log_path())?;
        Self::open_with_dir(backend, options, Some(dir))
    }

    /// Rewrites the log as a single snapshot frame.
    ///
    /// The snapshot is written to a side file and renamed over the log, so
    /// a crash leaves either the old log or the new one.
    ///
    /// # Errors
    ///
    /// Fails on I/O error; the existing log is then left untouched.
    pub fn compact(&self) -> StorageResult<()> {
        self.ensure_open()?;
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let _guard = self.writer.lock();
        let frame = self.state.read().snapshot();

        let tmp_path = dir.compact_path();
        if tmp_path.exists() {
            std::fs::remove_file(&tmp_path)?;
        }
        let mut tmp = FileBackend::open(&tmp_path)?;
        Self::append_frame(&mut tmp, &frame, true)?;
        drop(tmp);

        let mut backend = self.backend.lock();
        let before = backend.size()?;
        std::fs::rename(&tmp_path, dir.log_path())?;
        *backend = FileBackend::open(&dir.log_path())?;
        tracing::info!(before, after = backend.size()?, "compacted log");
        Ok(())
    }
}

fn write_bytes<B: StorageBackend>(backend: &mut B, bytes: &[u8], sync: bool) -> StorageResult<()> {
    backend.append(bytes)?;
    backend.flush()?;
    if sync {
        backend.sync()?;
    }
    Ok(())
}

fn replay<B: StorageBackend>(backend: &mut B) -> StorageResult<LogState> {
    let bytes = backend.read_all()?;
    let mut state = LogState::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        match Frame::read(&bytes[offset..], offset as u64)? {
            FrameRead::Complete { frame, len } => {
                state.apply(frame);
                offset += len;
            }
            FrameRead::Incomplete => {
                tracing::warn!(offset, size = bytes.len(), "truncating torn log tail");
                backend.truncate(offset as u64)?;
                break;
            }
            FrameRead::Damaged { len, error } => {
                if offset + len == bytes.len() {
                    tracing::warn!(offset, %error, "truncating damaged final frame");
                    backend.truncate(offset as u64)?;
                    break;
                }
                return Err(error);
            }
        }
    }

    Ok(state)
}

impl<B: StorageBackend> Datastore for LogDatastore<B> {
    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>> {
        self.ensure_open()?;
        let guard = self.writer.lock();
        Ok(Box::new(LogTransaction {
            store: self,
            _guard: guard,
            writes: WriteSet::default(),
        }))
    }

    fn count(&self, client_ns: &str) -> StorageResult<usize> {
        self.ensure_open()?;
        Ok(self.state.read().count(client_ns))
    }

    fn close(&self) -> StorageResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let _guard = self.writer.lock();
        let mut backend = self.backend.lock();
        backend.flush()?;
        backend.sync()?;
        tracing::debug!("closed log store");
        Ok(())
    }

    fn engine_name(&self) -> &'static str {
        "log"
    }
}

struct LogTransaction<'a, B: StorageBackend> {
    store: &'a LogDatastore<B>,
    _guard: MutexGuard<'a, ()>,
    writes: WriteSet,
}

impl<B: StorageBackend> Transaction for LogTransaction<'_, B> {
    fn load(&self, client_ns: &str, lowla_id: &str) -> StorageResult<Option<JsonDocument>> {
        let key = RecordKey::new(client_ns, lowla_id);
        if let Some(pending) = self.writes.get(&key) {
            return Ok(pending.cloned());
        }
        Ok(self.store.state.read().records.get(&key).cloned())
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
        let committed = self.store.state.read().scan(options);
        Ok(self.writes.merge_scan(committed, options))
    }

    fn commit(self: Box<Self>) -> StorageResult<()> {
        let this = *self;
        this.store.ensure_open()?;
        if this.writes.is_empty() {
            return Ok(());
        }

        let frame = Frame {
            kind: FrameKind::Batch,
            ops: this
                .writes
                .into_inner()
                .into_iter()
                .map(|(key, write)| match write {
                    Some(document) => LogOp::Put { key, document },
                    None => LogOp::Delete { key },
                })
                .collect(),
        };

        {
            let mut backend = this.store.backend.lock();
            LogDatastore::append_frame(&mut *backend, &frame, this.store.options.sync_on_commit)?;
        }
        tracing::debug!(ops = frame.ops.len(), "committed log frame");
        this.store.state.write().apply(frame);
        Ok(())
    }

    fn abort(self: Box<Self>) {}
}
