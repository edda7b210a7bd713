//! # LowlaDB Testkit
//!
//! Test utilities for LowlaDB.
//!
//! This crate provides:
//! - [`FakeAdapter`], an in-process sync adapter usable both as a
//!   [`SyncTransport`](lowla_sync::SyncTransport) and as an
//!   [`HttpClient`](lowla_sync::HttpClient)
//! - [`ScriptedClient`], an HTTP client answering from a queue
//! - Store fixtures and document helpers
//! - Property-based generators for documents
//!
//! ## Usage
//!
//! ```rust
//! use lowla_sync::{SyncConfig, SyncCoordinator};
//! use lowla_testkit::{doc, FakeAdapter, TestStore};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let store = TestStore::memory();
//! store.collection("app", "notes").insert(doc(json!({"_id": "1"}))).unwrap();
//!
//! let adapter = Arc::new(FakeAdapter::new());
//! let sync = SyncCoordinator::new(store.db.clone(), Arc::clone(&adapter), SyncConfig::default());
//! sync.sync_now();
//! assert!(adapter.document("app.notes$1").is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod client;
mod fixtures;
mod generators;

pub use adapter::{AdapterCall, FakeAdapter};
pub use client::{RecordedRequest, ScriptedClient};
pub use fixtures::{doc, jdoc, with_memory_db, TestStore};
pub use generators::{document_strategy, field_name_strategy, scalar_strategy};
