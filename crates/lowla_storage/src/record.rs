//! Record addressing and scan options.

use lowla_codec::{json_equal, JsonDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use std::fmt;

/// Composite primary key of a stored record.
///
/// Displays as `<clientNs>$<lowlaId>`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordKey {
    /// Namespace, `"<database>.<collection>"`; empty for store-level records.
    pub client_ns: String,
    /// Replication identifier of the document.
    pub lowla_id: String,
}

impl RecordKey {
    /// Creates a key.
    pub fn new(client_ns: impl Into<String>, lowla_id: impl Into<String>) -> Self {
        Self {
            client_ns: client_ns.into(),
            lowla_id: lowla_id.into(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.client_ns, self.lowla_id)
    }
}

/// The unit a transaction loads, saves, removes and scans.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Namespace the document belongs to.
    pub client_ns: String,
    /// Replication identifier.
    pub lowla_id: String,
    /// Document body in wire form.
    pub document: JsonDocument,
}

impl StoredRecord {
    /// Key under which this record is stored.
    #[must_use]
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.client_ns, &self.lowla_id)
    }
}

/// Restricts a scan.
///
/// With no fields set, a scan visits every record in the store including
/// store-level records such as metadata. `id` matches the document's `_id`
/// field; engines with a secondary index on `(clientNs, _id)` use it, the
/// others filter during a full scan.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanOptions {
    /// Only records in this namespace.
    pub client_ns: Option<String>,
    /// Only records whose `_id` equals this value.
    pub id: Option<Json>,
}

impl ScanOptions {
    /// Scan every record.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Scan one namespace.
    pub fn namespace(client_ns: impl Into<String>) -> Self {
        Self {
            client_ns: Some(client_ns.into()),
            id: None,
        }
    }

    /// Narrow to documents whose `_id` equals `id`.
    #[must_use]
    pub fn with_id(mut self, id: Json) -> Self {
        self.id = Some(id);
        self
    }

    /// Whether a record at `client_ns` holding `document` is in range.
    #[must_use]
    pub fn matches(&self, client_ns: &str, document: &JsonDocument) -> bool {
        if let Some(ns) = &self.client_ns {
            if ns != client_ns {
                return false;
            }
        }
        match &self.id {
            Some(id) => document.get("_id").is_some_and(|v| json_equal(v, id)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(v: Json) -> JsonDocument {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn key_display_is_composite() {
        assert_eq!(RecordKey::new("db.coll", "db.coll$1").to_string(), "db.coll$db.coll$1");
        assert_eq!(RecordKey::new("", "$metadata").to_string(), "$$metadata");
    }

    #[test]
    fn options_filter_namespace_and_id() {
        let d = doc(json!({"_id": 7, "a": 1}));
        assert!(ScanOptions::all().matches("x.y", &d));
        assert!(ScanOptions::namespace("x.y").matches("x.y", &d));
        assert!(!ScanOptions::namespace("x.z").matches("x.y", &d));
        assert!(ScanOptions::namespace("x.y").with_id(json!(7)).matches("x.y", &d));
        assert!(!ScanOptions::namespace("x.y").with_id(json!("7")).matches("x.y", &d));
    }
}
