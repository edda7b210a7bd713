//! Helpers for working with documents in wire JSON form.

use crate::error::{CodecError, CodecResult};
use crate::tagged::decode_document;
use crate::value::Document;
use serde_json::{Map, Value as Json};

/// A document in wire form, as stored and as sent over the network.
pub type JsonDocument = Map<String, Json>;

/// Builds a native document from a JSON object, materializing tagged values.
///
/// # Errors
///
/// Fails if `json` is not an object or contains a bad tagged value.
pub fn from_json(json: Json) -> CodecResult<Document> {
    match json {
        Json::Object(map) => decode_document(&map),
        other => Err(CodecError::NotAnObject {
            found: kind(&other),
        }),
    }
}

/// Structural equality over wire JSON.
///
/// Objects compare by key set and value regardless of key order, and
/// numbers compare numerically so `1` equals `1.0`.
#[must_use]
pub fn json_equal(a: &Json, b: &Json) -> bool {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        (Json::Array(x), Json::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(p, q)| json_equal(p, q))
        }
        (Json::Object(x), Json::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| json_equal(v, w)))
        }
        _ => a == b,
    }
}

fn kind(json: &Json) -> &'static str {
    match json {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
