//! Sync command implementation.

use super::open_store;
use lowla_sync::{SyncConfig, SyncCoordinator};
use std::path::Path;

/// Runs one blocking sync cycle and reports the outcome.
pub fn run(path: &Path, url: &str, chunk_size: usize) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let config = SyncConfig::new(url).with_chunk_size(chunk_size);
    let sync = SyncCoordinator::connect(db.clone(), config)?;

    println!("Syncing {} with {url}", path.display());
    sync.sync_now();
    let stats = sync.stats();
    let meta = db.metadata()?;
    db.close()?;

    println!("  Pushed:     {}", stats.documents_pushed);
    println!("  Pulled:     {}", stats.documents_pulled);
    println!("  Sequence:   {}", meta.sequence);
    println!("  Pending:    {}", meta.changes.len());

    match stats.last_error {
        Some(err) => Err(format!("sync failed: {err}").into()),
        None => {
            println!("✓ Sync complete");
            Ok(())
        }
    }
}
