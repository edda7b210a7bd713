//! # LowlaDB Codec
//!
//! Conversion between native document values and their JSON wire form.
//!
//! JSON has no representation for timestamps or binary blobs, so both
//! travel as tagged objects:
//!
//! ```text
//! { "_bsonType": "Date",   "millis": 1414000000000 }
//! { "_bsonType": "Binary", "type": 0, "encoded": "<base64>" }
//! ```
//!
//! Stored records and sync payloads are always in wire form. Documents
//! handed to applications are decoded into [`Value`] trees.
//!
//! ## Usage
//!
//! ```
//! use lowla_codec::{decode_document, encode_document, Value};
//! use serde_json::json;
//!
//! let wire = json!({"when": {"_bsonType": "Date", "millis": 1000}});
//! let doc = decode_document(wire.as_object().unwrap()).unwrap();
//! assert!(matches!(doc["when"], Value::Date(_)));
//!
//! let back = encode_document(&doc);
//! assert_eq!(back["when"]["millis"], 1000);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod json;
mod tagged;
mod value;

pub use error::{CodecError, CodecResult};
pub use json::{from_json, json_equal, JsonDocument};
pub use tagged::{
    decode_document, decode_value, encode_document, encode_value, validate, validate_document,
    TYPE_KEY, TYPE_BINARY, TYPE_DATE,
};
pub use value::{Binary, Document, Value};
