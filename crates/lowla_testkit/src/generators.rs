//! Property-based test generators using proptest.
//!
//! Documents produced here are valid for local writes: field names never
//! start with `$` and values stay within what the wire form round-trips
//! exactly.

use lowla_codec::{Document, Value};
use proptest::prelude::*;

/// Top-level field names other than `_id`.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,7}").expect("invalid regex")
}

/// Scalars: null, booleans, integers and short strings.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-1_000_i64..1_000).prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,12}")
            .expect("invalid regex")
            .prop_map(Value::Text),
    ]
}

/// Documents of up to `max_fields` scalar fields, without `_id`.
pub fn document_strategy(max_fields: usize) -> impl Strategy<Value = Document> {
    prop::collection::btree_map(field_name_strategy(), scalar_strategy(), 0..=max_fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lowla_codec::{decode_document, encode_document};

    proptest! {
        #[test]
        fn generated_documents_survive_the_wire_form(doc in document_strategy(6)) {
            prop_assert!(doc.keys().all(|k| !k.starts_with('$')));
            prop_assert_eq!(decode_document(&encode_document(&doc)).unwrap(), doc);
        }
    }
}
