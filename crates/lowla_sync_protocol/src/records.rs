//! Adapter payloads: headers each followed by a document unless deleted.

use crate::error::{json_type, ProtocolError, ProtocolResult};
use lowla_codec::JsonDocument;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

/// Header of one record in an adapter payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordHeader {
    /// lowlaId the record is stored under.
    pub id: String,
    /// Namespace of the record.
    pub client_ns: String,
    /// Whether the record was deleted. No document follows when set.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deleted: bool,
    /// Server sequence of this version, when the adapter reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<u64>,
    /// On push responses: the id the client used when the server stored
    /// the document under a new `id`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
}

impl RecordHeader {
    /// Header of a live record.
    pub fn new(id: impl Into<String>, client_ns: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            client_ns: client_ns.into(),
            deleted: false,
            sequence: None,
            client_id: None,
        }
    }

    /// Marks the record deleted.
    #[must_use]
    pub fn deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// Attaches a sequence number.
    #[must_use]
    pub fn with_sequence(mut self, sequence: u64) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Attaches the client's previous id.
    #[must_use]
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// The id the client knows this record by.
    pub fn acknowledged_id(&self) -> &str {
        self.client_id.as_deref().unwrap_or(&self.id)
    }
}

/// One record of an adapter payload.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterRecord {
    /// Identity and flags.
    pub header: RecordHeader,
    /// Full document in wire form; `None` exactly when deleted.
    pub document: Option<JsonDocument>,
}

impl AdapterRecord {
    /// A live record.
    pub fn upsert(header: RecordHeader, document: JsonDocument) -> Self {
        Self {
            header,
            document: Some(document),
        }
    }

    /// A deletion record.
    pub fn delete(header: RecordHeader) -> Self {
        Self {
            header: header.deleted(),
            document: None,
        }
    }
}

/// Parses a flat adapter payload into records.
///
/// # Errors
///
/// Fails if the payload is not an array, a header is malformed, or a
/// non-deleted header is not followed by a JSON object.
pub fn parse_adapter_payload(payload: &Json) -> ProtocolResult<Vec<AdapterRecord>> {
    let items = payload.as_array().ok_or(ProtocolError::NotAnArray {
        found: json_type(payload),
    })?;

    let mut records = Vec::new();
    let mut iter = items.iter().enumerate();
    while let Some((index, raw)) = iter.next() {
        let header: RecordHeader =
            serde_json::from_value(raw.clone()).map_err(|e| ProtocolError::InvalidHeader {
                index,
                message: e.to_string(),
            })?;

        if header.deleted {
            records.push(AdapterRecord {
                header,
                document: None,
            });
            continue;
        }

        match iter.next() {
            Some((_, Json::Object(doc))) => records.push(AdapterRecord {
                header,
                document: Some(doc.clone()),
            }),
            _ => return Err(ProtocolError::MissingDocument { id: header.id }),
        }
    }
    Ok(records)
}

/// Flattens records into the wire payload.
pub fn to_adapter_payload(records: &[AdapterRecord]) -> Json {
    let mut items = Vec::with_capacity(records.len() * 2);
    for record in records {
        // header serialization cannot fail: it holds only strings and numbers
        items.push(serde_json::to_value(&record.header).unwrap_or(Json::Null));
        if !record.header.deleted {
            if let Some(doc) = &record.document {
                items.push(Json::Object(doc.clone()));
            }
        }
    }
    Json::Array(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn interleaved_payload_parses() {
        let payload = json!([
            {"id": "d.c$1", "clientNs": "d.c", "sequence": 3},
            {"_id": "1", "a": 1},
            {"id": "d.c$2", "clientNs": "d.c", "deleted": true},
            {"id": "d.c$3", "clientNs": "d.c", "clientId": "d.c$tmp"},
            {"_id": "3"}
        ]);
        let records = parse_adapter_payload(&payload).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].header.sequence, Some(3));
        assert_eq!(records[0].document.as_ref().unwrap()["a"], 1);
        assert!(records[1].header.deleted);
        assert!(records[1].document.is_none());
        assert_eq!(records[2].header.acknowledged_id(), "d.c$tmp");
        assert_eq!(records[0].header.acknowledged_id(), "d.c$1");
    }

    #[test]
    fn header_without_document_is_rejected() {
        let payload = json!([{"id": "d.c$1", "clientNs": "d.c"}]);
        assert_eq!(
            parse_adapter_payload(&payload).unwrap_err(),
            ProtocolError::MissingDocument { id: "d.c$1".into() }
        );

        let followed_by_scalar = json!([{"id": "d.c$1", "clientNs": "d.c"}, 5]);
        assert!(parse_adapter_payload(&followed_by_scalar).is_err());
    }

    #[test]
    fn malformed_inputs() {
        assert_eq!(
            parse_adapter_payload(&json!({"x": 1})).unwrap_err(),
            ProtocolError::NotAnArray { found: "object" }
        );
        let err = parse_adapter_payload(&json!([{"clientNs": "d.c"}])).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidHeader { index: 0, .. }));
        assert!(parse_adapter_payload(&json!([])).unwrap().is_empty());
    }

    fn arb_record() -> impl Strategy<Value = AdapterRecord> {
        ("[a-z]{1,6}", any::<bool>(), proptest::option::of(0_u64..1000), any::<i64>()).prop_map(
            |(id, deleted, seq, n)| {
                let mut header = RecordHeader::new(format!("d.c${id}"), "d.c");
                header.sequence = seq;
                if deleted {
                    AdapterRecord::delete(header)
                } else {
                    let mut doc = JsonDocument::new();
                    doc.insert("_id".into(), json!(id));
                    doc.insert("n".into(), json!(n));
                    AdapterRecord::upsert(header, doc)
                }
            },
        )
    }

    proptest! {
        #[test]
        fn flatten_then_parse_is_identity(records in proptest::collection::vec(arb_record(), 0..12)) {
            let flat = to_adapter_payload(&records);
            let deleted = records.iter().filter(|r| r.header.deleted).count();
            prop_assert_eq!(flat.as_array().unwrap().len(), records.len() * 2 - deleted);
            prop_assert_eq!(parse_adapter_payload(&flat).unwrap(), records);
        }
    }
}
