//! Bootstrap payloads.

use crate::error::{json_type, ProtocolError, ProtocolResult};
use crate::records::{parse_adapter_payload, to_adapter_payload, AdapterRecord};
use serde_json::Value as Json;

/// A prepared dataset for seeding a fresh store without running a sync.
///
/// On the wire:
///
/// ```text
/// { "documents": [ <adapter payload>, <adapter payload>, ... ],
///   "sequence": 42 }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadPayload {
    /// Chunks shaped like pull responses.
    pub documents: Vec<Vec<AdapterRecord>>,
    /// Server sequence the dataset corresponds to.
    pub sequence: u64,
}

impl LoadPayload {
    /// Parses the wire form.
    ///
    /// # Errors
    ///
    /// Fails if the value is not an object, `documents` is not an array of
    /// adapter payloads, or `sequence` is not a non-negative integer.
    pub fn from_json(value: &Json) -> ProtocolResult<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| ProtocolError::malformed(format!("load payload is {}", json_type(value))))?;

        let documents = match obj.get("documents") {
            None | Some(Json::Null) => Vec::new(),
            Some(Json::Array(chunks)) => chunks
                .iter()
                .map(parse_adapter_payload)
                .collect::<ProtocolResult<_>>()?,
            Some(other) => {
                return Err(ProtocolError::NotAnArray {
                    found: json_type(other),
                })
            }
        };

        let sequence = match obj.get("sequence") {
            None | Some(Json::Null) => 0,
            Some(seq) => seq
                .as_u64()
                .ok_or_else(|| ProtocolError::malformed(format!("bad sequence: {seq}")))?,
        };

        Ok(Self {
            documents,
            sequence,
        })
    }

    /// Wire form.
    pub fn to_json(&self) -> Json {
        serde_json::json!({
            "documents": self.documents.iter().map(|c| to_adapter_payload(c)).collect::<Vec<_>>(),
            "sequence": self.sequence,
        })
    }

    /// Total number of records across chunks.
    pub fn record_count(&self) -> usize {
        self.documents.iter().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::RecordHeader;
    use serde_json::json;

    #[test]
    fn parses_chunks_and_sequence() {
        let payload = LoadPayload::from_json(&json!({
            "documents": [
                [{"id": "d.c$1", "clientNs": "d.c"}, {"_id": "1"}],
                [{"id": "d.c$2", "clientNs": "d.c", "deleted": true}]
            ],
            "sequence": 9
        }))
        .unwrap();
        assert_eq!(payload.documents.len(), 2);
        assert_eq!(payload.record_count(), 2);
        assert_eq!(payload.sequence, 9);
        assert_eq!(LoadPayload::from_json(&payload.to_json()).unwrap(), payload);
    }

    #[test]
    fn rejects_bad_shapes() {
        assert!(LoadPayload::from_json(&json!([])).is_err());
        assert!(LoadPayload::from_json(&json!({"documents": {}})).is_err());
        assert!(LoadPayload::from_json(&json!({"sequence": -1})).is_err());
        assert_eq!(LoadPayload::from_json(&json!({})).unwrap(), LoadPayload::default());
    }

    #[test]
    fn deleted_records_round_trip() {
        let payload = LoadPayload {
            documents: vec![vec![AdapterRecord::delete(RecordHeader::new("d.c$1", "d.c"))]],
            sequence: 1,
        };
        assert_eq!(
            payload.to_json(),
            json!({"documents": [[{"id": "d.c$1", "clientNs": "d.c", "deleted": true}]], "sequence": 1})
        );
    }
}
