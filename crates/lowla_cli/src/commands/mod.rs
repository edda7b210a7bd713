//! CLI command implementations.

pub mod compact;
pub mod dump;
pub mod inspect;
pub mod pending;
pub mod sync;

use lowla_core::LowlaDb;
use lowla_storage::{FileBackend, LogDatastore, LogOptions};
use std::path::Path;

/// Opens the log of an existing store without creating anything.
pub fn open_log(path: &Path) -> Result<LogDatastore<FileBackend>, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No LowlaDB store found at {}", path.display()).into());
    }
    Ok(LogDatastore::open_dir(
        path,
        LogOptions::default().create_if_missing(false),
    )?)
}

/// Opens an existing store.
pub fn open_store(path: &Path) -> Result<LowlaDb, Box<dyn std::error::Error>> {
    let log = open_log(path)?;
    Ok(LowlaDb::builder().datastore(log).build())
}
