//! Store fixtures and document helpers.

use lowla_codec::{from_json, Document, JsonDocument};
use lowla_core::{Config, LowlaDb};
use serde_json::Value as Json;
use std::path::Path;
use tempfile::TempDir;

/// A test store with automatic cleanup.
pub struct TestStore {
    /// The store handle.
    pub db: LowlaDb,
    /// Kept alive so the directory outlives the store.
    temp_dir: Option<TempDir>,
}

impl TestStore {
    /// A volatile store.
    pub fn memory() -> Self {
        Self {
            db: LowlaDb::open_in_memory().expect("failed to open in-memory store"),
            temp_dir: None,
        }
    }

    /// A persistent store in a fresh temporary directory.
    pub fn file() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let db = LowlaDb::open_with_config(temp_dir.path(), Config::default())
            .expect("failed to open file store");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }

    /// Directory of a persistent store.
    pub fn path(&self) -> Option<&Path> {
        self.temp_dir.as_ref().map(TempDir::path)
    }

    /// Closes the store and opens the same directory again.
    ///
    /// # Panics
    ///
    /// Panics on a volatile store.
    pub fn reopen(self) -> Self {
        let temp_dir = self.temp_dir.expect("only file stores can be reopened");
        self.db.close().expect("failed to close store");
        drop(self.db);
        let db = LowlaDb::open(temp_dir.path()).expect("failed to reopen store");
        Self {
            db,
            temp_dir: Some(temp_dir),
        }
    }
}

impl std::ops::Deref for TestStore {
    type Target = LowlaDb;

    fn deref(&self) -> &Self::Target {
        &self.db
    }
}

/// Runs `f` against a fresh volatile store.
pub fn with_memory_db<F, R>(f: F) -> R
where
    F: FnOnce(&LowlaDb) -> R,
{
    let store = TestStore::memory();
    f(&store.db)
}

/// Decodes a wire-form JSON object into a [`Document`].
///
/// # Panics
///
/// Panics if `value` is not an object or holds a malformed tagged value.
pub fn doc(value: Json) -> Document {
    from_json(value).expect("not a valid document")
}

/// The wire-form object inside `value`.
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn jdoc(value: Json) -> JsonDocument {
    match value {
        Json::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}
