//! Inspect command implementation.

use super::open_log;
use lowla_core::{Document, LowlaDb};
use serde::Serialize;
use std::path::Path;

/// Store inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// Store path.
    pub path: String,
    /// Log file size in bytes.
    pub log_size: u64,
    /// Total documents across namespaces.
    pub document_count: usize,
    /// Last server sequence fully pulled.
    pub sequence: u64,
    /// Ledger entries waiting to be pushed.
    pub pending_count: usize,
    /// Per-namespace statistics.
    pub namespaces: Vec<NamespaceStats>,
}

/// Statistics for a single namespace.
#[derive(Debug, Serialize)]
pub struct NamespaceStats {
    /// `<db>.<collection>`.
    pub name: String,
    /// Number of documents.
    pub document_count: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_log(path)?;
    let log_size = log.log_size()?;
    let db = LowlaDb::builder().datastore(log).build();
    let result = collect(&db, path, log_size)?;
    db.close()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        _ => print_text_output(&result),
    }
    Ok(())
}

/// Gathers statistics from an open store.
pub fn collect(db: &LowlaDb, path: &Path, log_size: u64) -> Result<InspectResult, Box<dyn std::error::Error>> {
    let meta = db.metadata()?;
    let mut namespaces = Vec::new();
    for name in db.namespaces()? {
        let document_count = db.collection_ns(&name).count(Document::new())?;
        namespaces.push(NamespaceStats {
            name,
            document_count,
        });
    }

    Ok(InspectResult {
        path: path.display().to_string(),
        log_size,
        document_count: namespaces.iter().map(|n| n.document_count).sum(),
        sequence: meta.sequence,
        pending_count: meta.changes.len(),
        namespaces,
    })
}

fn print_text_output(result: &InspectResult) {
    println!("LowlaDB Store: {}", result.path);
    println!();
    println!("Storage:");
    println!("  Log size:   {} bytes", result.log_size);
    println!("  Documents:  {}", result.document_count);
    println!();
    println!("Sync:");
    println!("  Sequence:   {}", result.sequence);
    println!("  Pending:    {}", result.pending_count);

    if !result.namespaces.is_empty() {
        println!();
        println!("Namespaces:");
        for ns in &result.namespaces {
            println!("  {:<32} {:>8}", ns.name, ns.document_count);
        }
    }
}
