//! The document store contract shared by every engine.

use crate::error::{StorageError, StorageResult};
use crate::record::{ScanOptions, StoredRecord};
use lowla_codec::JsonDocument;

/// One atomic unit of work against a [`Datastore`].
///
/// Reads observe the transaction's own uncommitted writes. Nothing is
/// visible to other transactions until [`Transaction::commit`] succeeds;
/// dropping or aborting discards every write.
pub trait Transaction {
    /// Loads the document stored under `(client_ns, lowla_id)`.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot read the record.
    fn load(&self, client_ns: &str, lowla_id: &str) -> StorageResult<Option<JsonDocument>>;

    /// Stores `document` under `(client_ns, lowla_id)`, replacing any
    /// previous value.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the write.
    fn save(&mut self, client_ns: &str, lowla_id: &str, document: JsonDocument)
        -> StorageResult<()>;

    /// Removes the record under `(client_ns, lowla_id)` if present.
    ///
    /// # Errors
    ///
    /// Fails if the engine rejects the write.
    fn remove(&mut self, client_ns: &str, lowla_id: &str) -> StorageResult<()>;

    /// Returns every record in range, ordered by key.
    ///
    /// # Errors
    ///
    /// Fails if the engine cannot read.
    fn scan(&self, options: &ScanOptions) -> StorageResult<Vec<StoredRecord>>;

    /// Makes all writes durable and visible.
    ///
    /// # Errors
    ///
    /// On failure none of the writes take effect.
    fn commit(self: Box<Self>) -> StorageResult<()>;

    /// Discards all writes.
    fn abort(self: Box<Self>);
}

/// A transactional `(clientNs, lowlaId) -> document` store.
///
/// Engines serialize transactions: [`Datastore::begin`] blocks while
/// another transaction is open on the same store.
pub trait Datastore: Send + Sync {
    /// Opens a transaction.
    ///
    /// # Errors
    ///
    /// Fails with [`StorageError::Closed`] after [`Datastore::close`].
    fn begin(&self) -> StorageResult<Box<dyn Transaction + '_>>;

    /// Number of committed records in `client_ns`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    fn count(&self, client_ns: &str) -> StorageResult<usize>;

    /// Releases the engine. Later calls fail with [`StorageError::Closed`].
    ///
    /// # Errors
    ///
    /// Fails if buffered data cannot be written out.
    fn close(&self) -> StorageResult<()>;

    /// Short engine name for diagnostics.
    fn engine_name(&self) -> &'static str;
}

impl<'s> dyn Datastore + 's {
    /// Runs `body` inside one transaction.
    ///
    /// Commits when `body` returns `Ok`, aborts when it returns `Err`. The
    /// body chains as many loads and writes as it needs against the same
    /// handle; a failure at any step discards them all.
    ///
    /// # Errors
    ///
    /// Returns the body's error, or a storage error from begin or commit.
    pub fn transact<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut tx = self.begin()?;
        match body(tx.as_mut()) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                tx.abort();
                Err(err)
            }
        }
    }
}
