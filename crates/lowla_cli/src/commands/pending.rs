//! Pending command implementation.

use super::open_store;
use lowla_core::{LowlaDb, Metadata};
use lowla_storage::ScanOptions;
use serde::Serialize;
use std::collections::HashSet;
use std::path::Path;

/// What a pending edit did to its document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EditKind {
    /// The document did not exist when last synced.
    Created,
    /// The document exists and differs from its synced state.
    Modified,
    /// The document was synced and has since been removed.
    Deleted,
}

/// One ledger entry.
#[derive(Debug, Serialize)]
pub struct PendingEntry {
    /// lowlaId.
    pub id: String,
    /// Kind of edit.
    pub kind: EditKind,
    /// `_version` of the synced snapshot, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<serde_json::Value>,
}

/// Runs the pending command.
pub fn run(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let entries = collect(&db)?;
    db.close()?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&entries)?),
        _ => {
            if entries.is_empty() {
                println!("No pending changes");
            }
            for entry in &entries {
                let kind = match entry.kind {
                    EditKind::Created => "created",
                    EditKind::Modified => "modified",
                    EditKind::Deleted => "deleted",
                };
                match &entry.version {
                    Some(v) => println!("{:<9} {} (version {v})", kind, entry.id),
                    None => println!("{:<9} {}", kind, entry.id),
                }
            }
        }
    }
    Ok(())
}

/// Lists the ledger of an open store, sorted by lowlaId.
pub fn collect(db: &LowlaDb) -> Result<Vec<PendingEntry>, Box<dyn std::error::Error>> {
    let (meta, present) = db.transact(|tx| {
        let meta = Metadata::load(tx)?;
        let present: HashSet<String> = tx
            .scan(&ScanOptions::all())?
            .into_iter()
            .map(|r| r.lowla_id)
            .collect();
        Ok((meta, present))
    })?;

    Ok(meta
        .changes
        .into_iter()
        .map(|(id, snapshot)| {
            let kind = if snapshot.is_empty() {
                EditKind::Created
            } else if present.contains(&id) {
                EditKind::Modified
            } else {
                EditKind::Deleted
            };
            PendingEntry {
                version: snapshot.get("_version").cloned(),
                id,
                kind,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowla_core::{Document, Value};

    fn with_id(id: &str) -> Document {
        let mut doc = Document::new();
        doc.insert("_id".into(), Value::from(id));
        doc
    }

    #[test]
    fn classifies_ledger_entries() {
        let db = LowlaDb::open_in_memory().unwrap();
        let notes = db.collection("d", "n");
        notes.insert(with_id("new")).unwrap();
        notes.insert(with_id("kept")).unwrap();
        notes.insert(with_id("gone")).unwrap();

        let mut meta = db.metadata().unwrap();
        meta.changes.clear();
        db.set_metadata(&meta).unwrap();

        let mut edit = Document::new();
        edit.insert("$set".into(), Value::Object([("a".to_string(), Value::from(1_i64))].into()));
        notes.find_and_modify(with_id("kept"), &edit).unwrap();
        notes.remove(with_id("gone")).unwrap();
        notes.insert(with_id("fresh")).unwrap();

        let entries = collect(&db).unwrap();
        let kinds: Vec<(&str, EditKind)> = entries.iter().map(|e| (e.id.as_str(), e.kind)).collect();
        assert_eq!(
            kinds,
            vec![
                ("d.n$fresh", EditKind::Created),
                ("d.n$gone", EditKind::Deleted),
                ("d.n$kept", EditKind::Modified),
            ]
        );
    }
}
