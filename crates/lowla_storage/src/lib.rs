//! # LowlaDB Storage
//!
//! Transactional document store engines.
//!
//! A store maps `(clientNs, lowlaId)` to a document in wire form. All access
//! goes through a [`Transaction`]; the [`Datastore::transact`] helper runs a
//! closure inside one transaction and commits or aborts on its result.
//!
//! ## Engines
//!
//! - [`MemoryDatastore`] - volatile, for tests and ephemeral sessions
//! - [`LogDatastore`] - durable, an append-only frame log over a
//!   [`StorageBackend`] ([`FileBackend`] on disk, [`InMemoryBackend`] in tests)
//!
//! Both engines satisfy the same contract; the crate's integration tests run
//! one suite against each.
//!
//! ## Example
//!
//! ```rust
//! use lowla_storage::{Datastore, MemoryDatastore};
//! use serde_json::json;
//!
//! let store: Box<dyn Datastore> = Box::new(MemoryDatastore::new());
//! store
//!     .transact(|tx| {
//!         let doc = json!({"_id": "1", "a": 1}).as_object().cloned().unwrap();
//!         tx.save("app.items", "app.items$1", doc)
//!     })
//!     .unwrap();
//! assert_eq!(store.count("app.items").unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod datastore;
mod error;
mod log;
mod memory;
mod overlay;
mod record;

pub use backend::{FileBackend, InMemoryBackend, StorageBackend};
pub use datastore::{Datastore, Transaction};
pub use error::{StorageError, StorageResult};
pub use log::{LogDatastore, LogOptions};
pub use memory::MemoryDatastore;
pub use record::{RecordKey, ScanOptions, StoredRecord};
