//! # LowlaDB Core
//!
//! The local half of LowlaDB: an offline-first document store whose local
//! writes are tracked for later push to a sync server.
//!
//! This crate provides:
//! - [`LowlaDb`], the shared store handle, over any
//!   [`Datastore`](lowla_storage::Datastore) engine
//! - [`Collection`] writes (`insert`, `find_and_modify`, `remove`) that
//!   maintain the change ledger in the same transaction as the write
//! - [`Cursor`] queries with equality filters, sort, limit and live
//!   re-evaluation through [`LiveRegistry`]
//! - [`EventFeed`] for sync and pending-write notifications
//!
//! ## The change ledger
//!
//! The [`Metadata`] record maps each locally modified lowlaId to the
//! document as it was before its first unsynced edit (or `{}` if it did not
//! exist). An entry leaves the ledger when the server acknowledges a push,
//! or when a later edit restores the snapshot exactly.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod capture;
mod collection;
mod config;
mod cursor;
mod db;
mod error;
mod events;
mod id;
mod ledger;
mod live;
mod metadata;
mod update;

pub use capture::SaveCapture;
pub use collection::Collection;
pub use config::Config;
pub use cursor::{Cursor, SortDirection, SortKey, SortSpec};
pub use db::{Db, LowlaDb, LowlaDbBuilder};
pub use error::{CoreError, CoreResult};
pub use events::{EventFeed, ListenerId, LowlaEvent};
pub use id::{generate_id, DefaultLowlaId, LowlaIdStrategy};
pub use live::{LiveRegistry, WatchId};
pub use metadata::{Metadata, METADATA_ID, METADATA_NS};
pub use update::{check_insert_fields, Update};

pub use lowla_codec::{Binary, Document, JsonDocument, Value};
