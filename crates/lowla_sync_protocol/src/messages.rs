//! Request and response bodies.

use lowla_codec::JsonDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// One changed document advertised by the changes endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Atom {
    /// lowlaId of the changed document.
    pub id: String,
    /// Server sequence at which it changed.
    #[serde(default)]
    pub sequence: u64,
    /// Server version marker, opaque to the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Json>,
    /// Namespace of the document.
    #[serde(default)]
    pub client_ns: String,
    /// Whether the change was a deletion.
    #[serde(default)]
    pub deleted: bool,
}

/// Body of `GET _lowla/changes?seq=<n>`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangesResponse {
    /// Documents changed since the requested sequence.
    #[serde(default)]
    pub atoms: Vec<Atom>,
    /// Server sequence the atoms bring the client up to.
    #[serde(default)]
    pub sequence: u64,
}

impl ChangesResponse {
    /// Highest sequence named by the response: its own, or failing that
    /// the largest atom sequence.
    pub fn target_sequence(&self) -> u64 {
        if self.sequence > 0 {
            return self.sequence;
        }
        self.atoms.iter().map(|a| a.sequence).max().unwrap_or(0)
    }
}

/// Body of `POST _lowla/pull`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// lowlaIds to fetch.
    pub ids: Vec<String>,
}

impl PullRequest {
    /// Creates a request for `ids`.
    pub fn new(ids: Vec<String>) -> Self {
        Self { ids }
    }
}

/// Identifies a pushed document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushHeader {
    /// lowlaId.
    pub id: String,
    /// `_version` of the snapshot the client last synced, if it had one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<Json>,
    /// Set on tombstones.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
}

/// Modifier operations describing a local edit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushOps {
    /// Fields whose value changed or appeared, in wire form.
    #[serde(rename = "$set", default, skip_serializing_if = "Option::is_none")]
    pub set: Option<JsonDocument>,
    /// Fields that disappeared, each mapped to `1`.
    #[serde(rename = "$unset", default, skip_serializing_if = "Option::is_none")]
    pub unset: Option<JsonDocument>,
}

impl PushOps {
    /// Whether there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.set.as_ref().map_or(true, |s| s.is_empty())
            && self.unset.as_ref().map_or(true, |u| u.is_empty())
    }
}

/// One element of a push request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushDocument {
    /// Which document, at which version.
    #[serde(rename = "_lowla")]
    pub lowla: PushHeader,
    /// The edit. Absent on tombstones.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ops: Option<PushOps>,
}

impl PushDocument {
    /// An edit of `id`.
    pub fn modified(id: impl Into<String>, version: Option<Json>, ops: PushOps) -> Self {
        Self {
            lowla: PushHeader {
                id: id.into(),
                version,
                deleted: false,
            },
            ops: Some(ops),
        }
    }

    /// A deletion of `id`.
    pub fn tombstone(id: impl Into<String>, version: Option<Json>) -> Self {
        Self {
            lowla: PushHeader {
                id: id.into(),
                version,
                deleted: true,
            },
            ops: None,
        }
    }

    /// lowlaId of the pushed document.
    pub fn id(&self) -> &str {
        &self.lowla.id
    }
}

/// Body of `POST _lowla/push`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// At most one chunk of documents.
    pub documents: Vec<PushDocument>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changes_response_tolerates_missing_fields() {
        let parsed: ChangesResponse = serde_json::from_value(json!({
            "atoms": [{"id": "d.c$1", "sequence": 4, "clientNs": "d.c"}],
        }))
        .unwrap();
        assert_eq!(parsed.atoms[0].client_ns, "d.c");
        assert!(!parsed.atoms[0].deleted);
        assert_eq!(parsed.sequence, 0);
        assert_eq!(parsed.target_sequence(), 4);

        let empty: ChangesResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.atoms.is_empty());
    }

    #[test]
    fn push_document_shapes() {
        let mut set = JsonDocument::new();
        set.insert("a".into(), json!(1));
        let edit = PushDocument::modified(
            "d.c$1",
            Some(json!(3)),
            PushOps {
                set: Some(set),
                unset: None,
            },
        );
        assert_eq!(
            serde_json::to_value(&edit).unwrap(),
            json!({"_lowla": {"id": "d.c$1", "version": 3}, "ops": {"$set": {"a": 1}}})
        );

        let gone = PushDocument::tombstone("d.c$2", None);
        assert_eq!(
            serde_json::to_value(&gone).unwrap(),
            json!({"_lowla": {"id": "d.c$2", "deleted": true}})
        );
    }

    #[test]
    fn empty_ops_detection() {
        assert!(PushOps::default().is_empty());
        let ops = PushOps {
            set: Some(JsonDocument::new()),
            unset: None,
        };
        assert!(ops.is_empty());
    }
}
