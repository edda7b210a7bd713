//! # LowlaDB Sync
//!
//! Moves changes between a [`LowlaDb`](lowla_core::LowlaDb) and a sync
//! adapter. A cycle pushes local edits first, then pulls what changed on
//! the server since the stored sequence:
//!
//! ```text
//! Client                              Adapter
//!   |-- POST _lowla/push (chunk) ------->|
//!   |<--------- acknowledged records ----|   repeated until nothing is left
//!   |-- GET  _lowla/changes?seq=N ------>|
//!   |<------------------ atoms ----------|
//!   |-- POST _lowla/pull (chunk) ------->|
//!   |<------------------ records --------|   repeated until all ids fetched
//! ```
//!
//! Local edits always win: a pulled document never replaces one with a
//! pending edit, and an acknowledged push never overwrites a document that
//! was edited again while the push was in flight.
//!
//! [`SyncCoordinator`] runs cycles one at a time and keeps failures out of
//! the caller's way. [`SyncHandle`] drives it from a background thread on a
//! poll interval, on local writes, or on demand.
//!
//! ## Example
//!
//! ```rust,no_run
//! use lowla_core::LowlaDb;
//! use lowla_sync::{SyncConfig, SyncCoordinator};
//!
//! let db = LowlaDb::open_in_memory().unwrap();
//! let config = SyncConfig::new("http://localhost:3000/").with_chunk_size(25);
//! let sync = SyncCoordinator::connect(db, config).unwrap();
//! sync.sync_now();
//! println!("{:?}", sync.stats());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bootstrap;
mod config;
mod coordinator;
mod error;
mod http;
mod pull;
mod push;
mod scheduler;
mod state;
mod transport;

pub use bootstrap::{load_from_url, load_payload};
pub use config::{SyncConfig, DEFAULT_CHUNK_SIZE};
pub use coordinator::SyncCoordinator;
pub use error::{SyncError, SyncResult};
#[cfg(feature = "reqwest")]
pub use http::ReqwestClient;
pub use http::{Endpoints, HttpClient, HttpTransport};
pub use pull::{
    fetch_changes, process_changes, process_pull_payload, pull_changes, update_sequence, PullOutcome,
};
pub use push::{clear_push_data, collect_push_data, process_push_response, push_changes, ClearScope};
pub use scheduler::{ChangeNotifier, SyncHandle};
pub use state::{SyncState, SyncStats};
pub use transport::SyncTransport;
