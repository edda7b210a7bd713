//! Native document values.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use crate::tagged::{decode_value, encode_value};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// A decoded document: field name to value, ordered by field name.
pub type Document = BTreeMap<String, Value>;

/// A binary blob together with the sub-type it was tagged with on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    /// Wire sub-type, preserved for round-trip fidelity.
    pub subtype: u8,
    /// Raw bytes.
    pub bytes: Bytes,
}

impl Binary {
    /// Creates a binary value with the given sub-type.
    pub fn new(subtype: u8, bytes: impl Into<Bytes>) -> Self {
        Self {
            subtype,
            bytes: bytes.into(),
        }
    }
}

/// A dynamic document value.
///
/// This is the JSON data model extended with the two types that cannot be
/// expressed in plain JSON: timestamps and binary blobs.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null.
    Null,
    /// Boolean.
    Bool(bool),
    /// Any JSON number, integer or floating point.
    Number(Number),
    /// UTF-8 text.
    Text(String),
    /// Ordered list of values.
    Array(Vec<Value>),
    /// Nested document.
    Object(Document),
    /// Millisecond-precision timestamp.
    Date(DateTime<Utc>),
    /// Binary blob with sub-type.
    Binary(Binary),
}

impl Value {
    /// Total order used when sorting query results.
    ///
    /// Values of different types order by type rank:
    /// null, numbers, text, objects, arrays, binary, booleans, dates.
    /// Within a type the natural order applies; numbers compare by magnitude
    /// regardless of integer or float representation.
    #[must_use]
    pub fn compare(&self, other: &Self) -> Ordering {
        let rank = self.type_rank().cmp(&other.type_rank());
        if rank != Ordering::Equal {
            return rank;
        }

        match (self, other) {
            (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
            (Value::Text(a), Value::Text(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            (Value::Binary(a), Value::Binary(b)) => a
                .bytes
                .len()
                .cmp(&b.bytes.len())
                .then_with(|| a.subtype.cmp(&b.subtype))
                .then_with(|| a.bytes.cmp(&b.bytes)),
            (Value::Array(a), Value::Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    let ord = x.compare(y);
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            (Value::Object(a), Value::Object(b)) => {
                for ((ka, va), (kb, vb)) in a.iter().zip(b.iter()) {
                    let ord = ka.cmp(kb).then_with(|| va.compare(vb));
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                a.len().cmp(&b.len())
            }
            _ => Ordering::Equal,
        }
    }

    fn type_rank(&self) -> u8 {
        match self {
            Value::Null => 0,
            Value::Number(_) => 1,
            Value::Text(_) => 2,
            Value::Object(_) => 3,
            Value::Array(_) => 4,
            Value::Binary(_) => 5,
            Value::Bool(_) => 6,
            Value::Date(_) => 7,
        }
    }

    /// Returns true if this is null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the boolean if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the number as an `i64` if it is an integer in range.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Number(n) => n.as_i64(),
            _ => None,
        }
    }

    /// Returns the number as an `f64`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    /// Returns the text if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the elements if this is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the nested document if this is an object.
    #[must_use]
    pub fn as_object(&self) -> Option<&Document> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns the timestamp if this is a date.
    #[must_use]
    pub fn as_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Date(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns the blob if this is binary.
    #[must_use]
    pub fn as_binary(&self) -> Option<&Binary> {
        match self {
            Value::Binary(b) => Some(b),
            _ => None,
        }
    }

    /// Looks up a field when this is an object.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|o| o.get(key))
    }
}

fn compare_numbers(a: &Number, b: &Number) -> Ordering {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x.cmp(&y);
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x.cmp(&y);
    }
    let x = a.as_f64().unwrap_or(0.0);
    let y = b.as_f64().unwrap_or(0.0);
    x.partial_cmp(&y).unwrap_or(Ordering::Equal)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(i64::from(n).into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(n.into())
    }
}

impl From<f64> for Value {
    /// Non-finite floats have no JSON representation and become null.
    fn from(n: f64) -> Self {
        Number::from_f64(n).map_or(Value::Null, Value::Number)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(d: DateTime<Utc>) -> Self {
        Value::Date(d)
    }
}

impl From<Binary> for Value {
    fn from(b: Binary) -> Self {
        Value::Binary(b)
    }
}

impl From<Document> for Value {
    fn from(d: Document) -> Self {
        Value::Object(d)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

/// Serializes as wire JSON, dates and binary tagged.
impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        encode_value(self).serialize(serializer)
    }
}

/// Accepts wire JSON; tagged objects become dates and binary.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let json = serde_json::Value::deserialize(deserializer)?;
        decode_value(&json).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn numbers_compare_by_magnitude() {
        let int = Value::from(2i64);
        let float = Value::from(1.5);
        assert_eq!(float.compare(&int), Ordering::Less);
        assert_eq!(Value::from(3i64).compare(&Value::from(3.0)), Ordering::Equal);
        assert_eq!(Value::from(-1i64).compare(&Value::from(1i64)), Ordering::Less);
    }

    #[test]
    fn mixed_types_order_by_rank() {
        let date = Value::Date(Utc.timestamp_millis_opt(0).unwrap());
        let ordered = [
            Value::Null,
            Value::from(10i64),
            Value::from("a"),
            Value::Object(Document::new()),
            Value::Array(vec![]),
            Value::Binary(Binary::new(0, vec![1u8])),
            Value::from(false),
            date,
        ];
        for pair in ordered.windows(2) {
            assert_eq!(pair[0].compare(&pair[1]), Ordering::Less, "{pair:?}");
        }
    }

    #[test]
    fn text_is_lexical() {
        assert_eq!(Value::from("abc").compare(&Value::from("abd")), Ordering::Less);
        assert_eq!(Value::from("b").compare(&Value::from("abc")), Ordering::Greater);
    }

    #[test]
    fn arrays_compare_elementwise_then_length() {
        let a = Value::from(vec![1i64, 2]);
        let b = Value::from(vec![1i64, 3]);
        let c = Value::from(vec![1i64, 2, 0]);
        assert_eq!(a.compare(&b), Ordering::Less);
        assert_eq!(a.compare(&c), Ordering::Less);
    }

    #[test]
    fn non_finite_float_is_null() {
        assert!(Value::from(f64::NAN).is_null());
    }

    #[test]
    fn accessors() {
        let mut doc = Document::new();
        doc.insert("x".into(), Value::from(7i64));
        let v = Value::Object(doc);
        assert_eq!(v.get("x").and_then(Value::as_i64), Some(7));
        assert!(v.get("y").is_none());
        assert_eq!(Value::from("hi").as_str(), Some("hi"));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert!(Value::from(1i64).as_str().is_none());
    }

    #[test]
    fn serde_goes_through_the_wire_form() {
        let when = Utc.timestamp_millis_opt(42).unwrap();
        let value = Value::Array(vec![Value::Date(when), Value::from("x")]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"[{"_bsonType":"Date","millis":42},"x"]"#);
        assert_eq!(serde_json::from_str::<Value>(&text).unwrap(), value);
        assert!(serde_json::from_str::<Value>(r#"{"_bsonType":"Nope"}"#).is_err());
    }
}
