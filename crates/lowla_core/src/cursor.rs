//! Query cursors.
//!
//! A cursor is a lazily evaluated query over one namespace: an equality
//! filter on top-level fields, an optional sort, an optional limit. Nothing
//! is read until a terminal operation ([`Cursor::to_array`],
//! [`Cursor::each`], [`Cursor::count`], [`Cursor::size`]) runs.

use crate::db::LowlaDb;
use crate::error::CoreResult;
use crate::live::WatchId;
use crate::metadata::Metadata;
use lowla_codec::{decode_document, json_equal, Document, JsonDocument, Value};
use lowla_storage::{ScanOptions, StoredRecord, Transaction};
use std::cmp::Ordering;
use std::sync::Arc;

/// Sort direction of one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One sort criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    /// Top-level field name.
    pub field: String,
    /// Direction.
    pub direction: SortDirection,
}

impl SortKey {
    /// Builds a key from a numeric direction: negative means descending.
    pub fn from_direction(field: impl Into<String>, direction: i32) -> Self {
        Self {
            field: field.into(),
            direction: if direction < 0 {
                SortDirection::Descending
            } else {
                SortDirection::Ascending
            },
        }
    }
}

/// An ordered list of sort criteria.
///
/// Documents lacking a field sort after all documents that have it,
/// whatever the direction. Ties keep storage order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SortSpec {
    keys: Vec<SortKey>,
}

impl SortSpec {
    /// An empty sort.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an ascending key.
    #[must_use]
    pub fn asc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(SortKey::from_direction(field, 1));
        self
    }

    /// Appends a descending key.
    #[must_use]
    pub fn desc(mut self, field: impl Into<String>) -> Self {
        self.keys.push(SortKey::from_direction(field, -1));
        self
    }

    /// The criteria in priority order.
    pub fn keys(&self) -> &[SortKey] {
        &self.keys
    }

    fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for key in &self.keys {
            let ord = match (a.get(&key.field), b.get(&key.field)) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => match key.direction {
                    SortDirection::Ascending => x.compare(y),
                    SortDirection::Descending => y.compare(x),
                },
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

impl From<&str> for SortSpec {
    fn from(field: &str) -> Self {
        Self::new().asc(field)
    }
}

impl From<(&str, i32)> for SortSpec {
    fn from((field, direction): (&str, i32)) -> Self {
        Self {
            keys: vec![SortKey::from_direction(field, direction)],
        }
    }
}

impl From<Vec<SortKey>> for SortSpec {
    fn from(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }
}

/// A query over one namespace.
///
/// Builder methods return modified copies; the original cursor is untouched.
#[derive(Clone)]
pub struct Cursor {
    db: LowlaDb,
    client_ns: String,
    filter: JsonDocument,
    sort: Option<SortSpec>,
    limit: usize,
    show_pending: bool,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("client_ns", &self.client_ns)
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("limit", &self.limit)
            .field("show_pending", &self.show_pending)
            .finish()
    }
}

impl Cursor {
    pub(crate) fn new(db: LowlaDb, client_ns: String, filter: JsonDocument) -> Self {
        Self {
            db,
            client_ns,
            filter,
            sort: None,
            limit: 0,
            show_pending: false,
        }
    }

    /// The namespace this cursor reads.
    pub fn client_ns(&self) -> &str {
        &self.client_ns
    }

    /// Caps the number of results. Zero means unlimited.
    #[must_use]
    pub fn limit(&self, limit: usize) -> Self {
        Self {
            limit,
            ..self.clone()
        }
    }

    /// Orders the results.
    #[must_use]
    pub fn sort(&self, sort: impl Into<SortSpec>) -> Self {
        Self {
            sort: Some(sort.into()),
            ..self.clone()
        }
    }

    /// Adds a boolean `$pending` field to each result, true when the
    /// document has unpushed local edits.
    #[must_use]
    pub fn show_pending(&self) -> Self {
        Self {
            show_pending: true,
            ..self.clone()
        }
    }

    /// Evaluates the query inside `tx`, returning stored records paired
    /// with their decoded documents.
    pub(crate) fn matching(&self, tx: &dyn Transaction) -> CoreResult<Vec<(StoredRecord, Document)>> {
        let mut scan = ScanOptions::namespace(self.client_ns.as_str());
        if let Some(id) = self.filter.get("_id") {
            scan = scan.with_id(id.clone());
        }

        let mut rows = Vec::new();
        for record in tx.scan(&scan)? {
            if !self.filter_matches(&record.document) {
                continue;
            }
            let doc = decode_document(&record.document)?;
            rows.push((record, doc));
        }

        if let Some(sort) = &self.sort {
            rows.sort_by(|a, b| sort.compare(&a.1, &b.1));
        }
        if self.limit > 0 {
            rows.truncate(self.limit);
        }
        Ok(rows)
    }

    fn filter_matches(&self, document: &JsonDocument) -> bool {
        self.filter
            .iter()
            .all(|(k, v)| document.get(k).is_some_and(|w| json_equal(v, w)))
    }

    /// Materializes the results.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed or a stored document cannot be decoded.
    pub fn to_array(&self) -> CoreResult<Vec<Document>> {
        self.db.transact(|tx| {
            let rows = self.matching(tx)?;
            let meta = if self.show_pending && !rows.is_empty() {
                Some(Metadata::load(tx)?)
            } else {
                None
            };
            Ok(rows
                .into_iter()
                .map(|(record, mut doc)| {
                    if let Some(meta) = &meta {
                        let pending = meta.is_pending(&record.lowla_id);
                        doc.insert("$pending".into(), Value::Bool(pending));
                    }
                    doc
                })
                .collect())
        })
    }

    /// Calls `f` with each result in order.
    ///
    /// # Errors
    ///
    /// Same as [`Cursor::to_array`].
    pub fn each<F>(&self, mut f: F) -> CoreResult<()>
    where
        F: FnMut(Document),
    {
        for doc in self.to_array()? {
            f(doc);
        }
        Ok(())
    }

    /// Number of matching documents, ignoring the limit.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn count(&self) -> CoreResult<usize> {
        if self.filter.is_empty() {
            return Ok(self.db.datastore().count(&self.client_ns)?);
        }
        self.limit(0).size()
    }

    /// Number of documents [`Cursor::to_array`] would return, limit applied.
    ///
    /// # Errors
    ///
    /// Fails if the store is closed.
    pub fn size(&self) -> CoreResult<usize> {
        self.db.transact(|tx| Ok(self.matching(tx)?.len()))
    }

    /// Registers `callback` as a live watcher and calls it once right away.
    ///
    /// It is called again after every committed change to this cursor's
    /// namespace, local or from sync. Remove it with
    /// [`LiveRegistry::unregister`](crate::LiveRegistry::unregister).
    pub fn on<F>(&self, callback: F) -> WatchId
    where
        F: Fn(&Cursor) + Send + Sync + 'static,
    {
        let callback = Arc::new(callback);
        let id = self.db.live().register(self.clone(), callback.clone());
        callback(self);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(pairs: &[(&str, Value)]) -> Document {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn missing_fields_sort_last_both_ways() {
        let a = doc(&[("n", Value::from(1_i64))]);
        let b = doc(&[]);
        let c = doc(&[("n", Value::from(3_i64))]);

        let asc = SortSpec::from("n");
        let mut rows = vec![b.clone(), c.clone(), a.clone()];
        rows.sort_by(|x, y| asc.compare(x, y));
        assert_eq!(rows, vec![a.clone(), c.clone(), b.clone()]);

        let desc = SortSpec::from(("n", -1));
        let mut rows = vec![b.clone(), a.clone(), c.clone()];
        rows.sort_by(|x, y| desc.compare(x, y));
        assert_eq!(rows, vec![c, a, b]);
    }

    #[test]
    fn later_keys_break_ties() {
        let spec = SortSpec::new().asc("a").desc("b");
        let x = doc(&[("a", Value::from(1_i64)), ("b", Value::from(1_i64))]);
        let y = doc(&[("a", Value::from(1_i64)), ("b", Value::from(2_i64))]);
        assert_eq!(spec.compare(&x, &y), Ordering::Greater);
        assert_eq!(spec.keys().len(), 2);
    }

    #[test]
    fn numeric_direction_maps_to_enum() {
        assert_eq!(
            SortKey::from_direction("f", -1).direction,
            SortDirection::Descending
        );
        assert_eq!(
            SortKey::from_direction("f", 1).direction,
            SortDirection::Ascending
        );
    }
}
