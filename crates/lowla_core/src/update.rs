//! Update documents: modifier operators and whole-document replacement.

use crate::error::{CoreError, CoreResult};
use lowla_codec::{encode_document, Document, JsonDocument, Value};

const SET: &str = "$set";
const UNSET: &str = "$unset";

/// A parsed, validated update.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replace the whole document. `_id` is carried over when absent.
    Replace(JsonDocument),
    /// Apply `$set` and `$unset` to the current document.
    Modify {
        /// Fields to assign.
        set: JsonDocument,
        /// Fields to delete.
        unset: Vec<String>,
    },
}

impl Update {
    /// Parses an update document.
    ///
    /// `$set` and `$unset` make it a modifier update; any other `$` key is
    /// rejected, as is mixing modifiers with plain fields. Without
    /// modifiers, the document is a replacement and none of its top-level
    /// fields may start with `$`.
    ///
    /// # Errors
    ///
    /// Returns a validation error; nothing has been written at that point.
    pub fn parse(ops: &Document) -> CoreResult<Self> {
        let has_modifier = ops.keys().any(|k| k == SET || k == UNSET);
        let mut set = JsonDocument::new();
        let mut unset = Vec::new();

        for (key, value) in ops {
            match key.as_str() {
                SET => {
                    let fields = operand(SET, value)?;
                    if let Some(bad) = fields.keys().find(|f| f.starts_with('$')) {
                        return Err(CoreError::invalid_field(bad.clone()));
                    }
                    set.extend(encode_document(fields));
                }
                UNSET => {
                    unset.extend(operand(UNSET, value)?.keys().cloned());
                }
                k if k.starts_with('$') => {
                    return Err(if has_modifier {
                        CoreError::unknown_modifier(k)
                    } else {
                        CoreError::invalid_field(k)
                    });
                }
                _ if has_modifier => return Err(CoreError::MixedUpdate),
                _ => {}
            }
        }

        if has_modifier {
            Ok(Self::Modify { set, unset })
        } else {
            Ok(Self::Replace(encode_document(ops)))
        }
    }

    /// Produces the new document from the current one.
    #[must_use]
    pub fn apply(&self, current: &JsonDocument) -> JsonDocument {
        match self {
            Self::Replace(doc) => {
                let mut next = doc.clone();
                if !next.contains_key("_id") {
                    if let Some(id) = current.get("_id") {
                        next.insert("_id".into(), id.clone());
                    }
                }
                next
            }
            Self::Modify { set, unset } => {
                let mut next = current.clone();
                for (k, v) in set {
                    next.insert(k.clone(), v.clone());
                }
                for k in unset {
                    next.remove(k);
                }
                next
            }
        }
    }
}

fn operand<'a>(op: &str, value: &'a Value) -> CoreResult<&'a Document> {
    value
        .as_object()
        .ok_or_else(|| CoreError::invalid_document(format!("{op} requires a document operand")))
}

/// Rejects a document to be inserted whose top-level fields start with `$`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidField`] naming the first offending field.
pub fn check_insert_fields(doc: &Document) -> CoreResult<()> {
    match doc.keys().find(|k| k.starts_with('$')) {
        Some(field) => Err(CoreError::invalid_field(field.clone())),
        None => Ok(()),
    }
}
