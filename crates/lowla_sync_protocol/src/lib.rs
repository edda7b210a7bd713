//! # LowlaDB Sync Protocol
//!
//! Wire types for the three adapter endpoints a LowlaDB client talks to:
//!
//! - `GET  _lowla/changes?seq=<n>` answers a [`ChangesResponse`]
//! - `POST _lowla/pull` takes a [`PullRequest`] and answers an adapter
//!   payload
//! - `POST _lowla/push` takes a [`PushRequest`] and answers an adapter
//!   payload
//!
//! Adapter payloads are flat JSON arrays in which every header is followed
//! by its document unless the header is flagged `deleted`. They are parsed
//! into structured [`AdapterRecord`] lists here, so nothing downstream
//! walks the interleaved array by index.
//!
//! This is a pure protocol crate with no I/O.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod load;
mod messages;
mod records;

pub use error::{ProtocolError, ProtocolResult};
pub use load::LoadPayload;
pub use messages::{Atom, ChangesResponse, PullRequest, PushDocument, PushHeader, PushOps, PushRequest};
pub use records::{parse_adapter_payload, to_adapter_payload, AdapterRecord, RecordHeader};
