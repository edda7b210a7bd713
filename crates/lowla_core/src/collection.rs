//! Collections: the local write path.
//!
//! Every local write runs in one transaction that notes the lowlaId in any
//! open [`SaveCapture`](crate::SaveCapture), updates the change ledger and
//! then writes the document. Live cursors and `_pending` listeners are told
//! after the commit.
//!
//! Server-origin writes ([`Collection::save_from_server`],
//! [`Collection::remove_from_server`]) skip both capture and ledger. They
//! run inside a transaction owned by the caller, who notifies live cursors
//! once it has committed.

use crate::cursor::Cursor;
use crate::db::LowlaDb;
use crate::error::{CoreError, CoreResult};
use crate::events::LowlaEvent;
use crate::id::generate_id;
use crate::ledger::record_local_write;
use crate::update::{check_insert_fields, Update};
use lowla_codec::{decode_document, encode_document, validate_document, Document, JsonDocument, Value};
use lowla_storage::Transaction;

/// A named collection within a database.
#[derive(Clone)]
pub struct Collection {
    db: LowlaDb,
    client_ns: String,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Collection").field(&self.client_ns).finish()
    }
}

impl Collection {
    pub(crate) fn new(db: LowlaDb, client_ns: String) -> Self {
        Self { db, client_ns }
    }

    /// The `<db>.<collection>` namespace.
    pub fn client_ns(&self) -> &str {
        &self.client_ns
    }

    /// Inserts one document, assigning an `_id` when it has none.
    ///
    /// Returns the stored document.
    ///
    /// # Errors
    ///
    /// Rejects top-level `$` fields. Fails if the store is closed.
    pub fn insert(&self, doc: Document) -> CoreResult<Document> {
        self.insert_many(vec![doc])?
            .pop()
            .ok_or_else(|| CoreError::invalid_document("insert produced no document"))
    }

    /// Inserts several documents in one transaction.
    ///
    /// Either all are stored or none is.
    ///
    /// # Errors
    ///
    /// Same as [`Collection::insert`]; validation happens before anything
    /// is written.
    pub fn insert_many(&self, docs: Vec<Document>) -> CoreResult<Vec<Document>> {
        if docs.is_empty() {
            return Ok(docs);
        }
        for doc in &docs {
            check_insert_fields(doc)?;
        }

        let docs: Vec<Document> = docs
            .into_iter()
            .map(|mut doc| {
                if doc.get("_id").map_or(true, Value::is_null) {
                    doc.insert("_id".into(), Value::Text(generate_id()));
                }
                doc
            })
            .collect();
        let prepared: Vec<(String, JsonDocument)> = docs
            .iter()
            .map(|doc| {
                let json = encode_document(doc);
                (self.db.lowla_id(&self.client_ns, &json), json)
            })
            .collect();

        self.db.transact(|tx| {
            for (lowla_id, json) in &prepared {
                self.write_local(tx, lowla_id, Some(json.clone()))?;
            }
            Ok(())
        })?;

        tracing::debug!(client_ns = %self.client_ns, count = docs.len(), "inserted");
        self.after_local_write();
        Ok(docs)
    }

    /// A cursor over documents whose top-level fields equal those of
    /// `filter`. An empty filter matches everything.
    pub fn find(&self, filter: Document) -> Cursor {
        Cursor::new(
            self.db.clone(),
            self.client_ns.clone(),
            encode_document(&filter),
        )
    }

    /// The first match for `filter`, if any.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or the document cannot be decoded.
    pub fn find_one(&self, filter: Document) -> CoreResult<Option<Document>> {
        Ok(self.find(filter).limit(1).to_array()?.into_iter().next())
    }

    /// Updates the first match for `filter` with `ops` and returns the new
    /// document, or `None` when nothing matched.
    ///
    /// `ops` is either a modifier document (`$set`, `$unset`) or a full
    /// replacement; a replacement keeps the existing `_id`.
    ///
    /// # Errors
    ///
    /// Invalid `ops` are rejected before anything is written.
    pub fn find_and_modify(&self, filter: Document, ops: &Document) -> CoreResult<Option<Document>> {
        let update = Update::parse(ops)?;
        let cursor = self.find(filter);

        let saved = self.db.transact(|tx| {
            let Some((record, _)) = cursor.matching(tx)?.into_iter().next() else {
                return Ok(None);
            };
            let next = update.apply(&record.document);
            self.write_local(tx, &record.lowla_id, Some(next.clone()))?;
            Ok(Some(next))
        })?;

        match saved {
            Some(doc) => {
                self.after_local_write();
                Ok(Some(decode_document(&doc)?))
            }
            None => Ok(None),
        }
    }

    /// Removes every match for `filter`. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn remove(&self, filter: Document) -> CoreResult<usize> {
        let cursor = self.find(filter);
        let removed = self.db.transact(|tx| {
            let rows = cursor.matching(tx)?;
            for (record, _) in &rows {
                self.write_local(tx, &record.lowla_id, None)?;
            }
            Ok(rows.len())
        })?;

        if removed > 0 {
            tracing::debug!(client_ns = %self.client_ns, removed, "removed");
            self.after_local_write();
        }
        Ok(removed)
    }

    /// Number of documents matching `filter`.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn count(&self, filter: Document) -> CoreResult<usize> {
        self.find(filter).count()
    }

    /// Stores a server-provided document under `lowla_id`, inside `tx`.
    ///
    /// When `previous_id` is given, the record under that id is removed
    /// first; the server uses this to rename a client-assigned id. The
    /// change ledger is not touched.
    ///
    /// # Errors
    ///
    /// Fails if the document carries malformed tagged values or the write
    /// is rejected.
    pub fn save_from_server(
        &self,
        tx: &mut dyn Transaction,
        lowla_id: &str,
        doc: JsonDocument,
        previous_id: Option<&str>,
    ) -> CoreResult<()> {
        validate_document(&doc)?;
        if let Some(previous) = previous_id {
            tx.remove(&self.client_ns, previous)?;
        }
        tx.save(&self.client_ns, lowla_id, doc)?;
        Ok(())
    }

    /// Removes `lowla_id` on the server's behalf, inside `tx`.
    ///
    /// # Errors
    ///
    /// Fails if the write is rejected.
    pub fn remove_from_server(&self, tx: &mut dyn Transaction, lowla_id: &str) -> CoreResult<()> {
        tx.remove(&self.client_ns, lowla_id)?;
        Ok(())
    }

    fn write_local(
        &self,
        tx: &mut dyn Transaction,
        lowla_id: &str,
        next: Option<JsonDocument>,
    ) -> CoreResult<()> {
        self.db.captures().record(lowla_id);
        record_local_write(tx, &self.client_ns, lowla_id, next.as_ref())?;
        match next {
            Some(doc) => tx.save(&self.client_ns, lowla_id, doc)?,
            None => tx.remove(&self.client_ns, lowla_id)?,
        }
        Ok(())
    }

    fn after_local_write(&self) {
        self.db.live().notify(&self.client_ns);
        self.db.events().emit(LowlaEvent::Pending);
    }
}
