//! Tagged wire encoding for dates and binary blobs.

use crate::error::{CodecError, CodecResult};
use crate::json::JsonDocument;
use crate::value::{Binary, Document, Value};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{TimeZone, Utc};
use serde_json::{json, Map, Value as Json};

/// Discriminator field marking a tagged wire value.
pub const TYPE_KEY: &str = "_bsonType";

/// Tag for timestamps: `{_bsonType: "Date", millis: <int>}`.
pub const TYPE_DATE: &str = "Date";

/// Tag for binary blobs: `{_bsonType: "Binary", type: <int>, encoded: <base64>}`.
pub const TYPE_BINARY: &str = "Binary";

/// Encodes a native value into wire JSON.
#[must_use]
pub fn encode_value(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::Text(s) => Json::String(s.clone()),
        Value::Array(items) => Json::Array(items.iter().map(encode_value).collect()),
        Value::Object(doc) => Json::Object(encode_document(doc)),
        Value::Date(d) => json!({
            TYPE_KEY: TYPE_DATE,
            "millis": d.timestamp_millis(),
        }),
        Value::Binary(b) => json!({
            TYPE_KEY: TYPE_BINARY,
            "type": b.subtype,
            "encoded": STANDARD.encode(&b.bytes),
        }),
    }
}

/// Encodes a native document into a wire JSON object.
#[must_use]
pub fn encode_document(doc: &Document) -> JsonDocument {
    doc.iter()
        .map(|(k, v)| (k.clone(), encode_value(v)))
        .collect::<Map<_, _>>()
}

/// Materializes a wire JSON value, converting tagged objects into native
/// dates and blobs at any depth.
///
/// # Errors
///
/// Fails on an unrecognized tag or a malformed tagged payload.
pub fn decode_value(json: &Json) -> CodecResult<Value> {
    Ok(match json {
        Json::Null => Value::Null,
        Json::Bool(b) => Value::Bool(*b),
        Json::Number(n) => Value::Number(n.clone()),
        Json::String(s) => Value::Text(s.clone()),
        Json::Array(items) => Value::Array(
            items
                .iter()
                .map(decode_value)
                .collect::<CodecResult<Vec<_>>>()?,
        ),
        Json::Object(map) => match map.get(TYPE_KEY) {
            Some(tag) => decode_tagged(tag, map)?,
            None => Value::Object(decode_document(map)?),
        },
    })
}

/// Materializes every field of a wire JSON object.
///
/// # Errors
///
/// Fails on an unrecognized tag or a malformed tagged payload anywhere in
/// the document.
pub fn decode_document(doc: &JsonDocument) -> CodecResult<Document> {
    doc.iter()
        .map(|(k, v)| Ok((k.clone(), decode_value(v)?)))
        .collect()
}

/// Checks that every tagged value under `json` is recognized and well formed
/// without building the native tree.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate(json: &Json) -> CodecResult<()> {
    match json {
        Json::Array(items) => items.iter().try_for_each(validate),
        Json::Object(map) => match map.get(TYPE_KEY) {
            Some(tag) => decode_tagged(tag, map).map(|_| ()),
            None => validate_document(map),
        },
        _ => Ok(()),
    }
}

/// [`validate`] applied to each field of a document.
///
/// # Errors
///
/// Returns the first problem found.
pub fn validate_document(doc: &JsonDocument) -> CodecResult<()> {
    doc.values().try_for_each(validate)
}

fn decode_tagged(tag: &Json, map: &JsonDocument) -> CodecResult<Value> {
    match tag.as_str() {
        Some(TYPE_DATE) => {
            let millis = match map.get("millis") {
                Some(Json::Number(n)) => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f as i64))
                    .ok_or_else(|| CodecError::invalid_tagged(TYPE_DATE, "millis out of range"))?,
                Some(Json::String(s)) => s.trim().parse::<i64>().map_err(|_| {
                    CodecError::invalid_tagged(TYPE_DATE, format!("millis is not an integer: {s}"))
                })?,
                _ => return Err(CodecError::invalid_tagged(TYPE_DATE, "missing millis")),
            };
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(Value::Date)
                .ok_or_else(|| CodecError::invalid_tagged(TYPE_DATE, "millis out of range"))
        }
        Some(TYPE_BINARY) => {
            let subtype = match map.get("type") {
                None | Some(Json::Null) => 0,
                Some(t) => t
                    .as_u64()
                    .and_then(|t| u8::try_from(t).ok())
                    .ok_or_else(|| CodecError::invalid_tagged(TYPE_BINARY, "bad sub-type"))?,
            };
            let encoded = map
                .get("encoded")
                .and_then(Json::as_str)
                .ok_or_else(|| CodecError::invalid_tagged(TYPE_BINARY, "missing encoded data"))?;
            let bytes = STANDARD
                .decode(encoded)
                .map_err(|e| CodecError::invalid_tagged(TYPE_BINARY, e.to_string()))?;
            Ok(Value::Binary(Binary::new(subtype, bytes)))
        }
        Some(other) => Err(CodecError::unknown_type(other)),
        None => Err(CodecError::unknown_type(tag.to_string())),
    }
}
