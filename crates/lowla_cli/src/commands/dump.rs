//! Dump command implementation.

use super::open_store;
use lowla_codec::encode_document;
use lowla_core::{Document, LowlaDb};
use std::io::Write;
use std::path::Path;

/// Runs the dump command.
pub fn run(path: &Path, ns: &str, limit: Option<usize>) -> Result<(), Box<dyn std::error::Error>> {
    let db = open_store(path)?;
    let stdout = std::io::stdout();
    let written = write_namespace(&db, ns, limit, &mut stdout.lock())?;
    db.close()?;
    tracing::debug!(ns, written, "dump finished");
    Ok(())
}

/// Writes each document of `ns` as one line of wire JSON, with a `$pending`
/// flag. Returns the number written.
pub fn write_namespace(
    db: &LowlaDb,
    ns: &str,
    limit: Option<usize>,
    out: &mut dyn Write,
) -> Result<usize, Box<dyn std::error::Error>> {
    let cursor = db
        .collection_ns(ns)
        .find(Document::new())
        .limit(limit.unwrap_or(0))
        .show_pending();

    let docs = cursor.to_array()?;
    for doc in &docs {
        writeln!(out, "{}", serde_json::to_string(&encode_document(doc))?)?;
    }
    Ok(docs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowla_core::Value;

    #[test]
    fn writes_one_line_per_document() {
        let db = LowlaDb::open_in_memory().unwrap();
        for id in ["a", "b", "c"] {
            let mut doc = Document::new();
            doc.insert("_id".into(), Value::from(id));
            db.collection("d", "c").insert(doc).unwrap();
        }

        let mut out = Vec::new();
        assert_eq!(write_namespace(&db, "d.c", Some(2), &mut out).unwrap(), 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["$pending"], true);
    }
}
