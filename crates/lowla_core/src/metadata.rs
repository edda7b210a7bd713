//! The per-store metadata record.
//!
//! One reserved record, stored outside every namespace, holds the last
//! fully applied server sequence and the change ledger:
//!
//! ```text
//! { sequence: 12,
//!   changes: { "<lowlaId>": <snapshot before first local edit, or {}> } }
//! ```

use crate::error::{CoreError, CoreResult};
use lowla_codec::JsonDocument;
use lowla_storage::Transaction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Namespace of the metadata record.
pub const METADATA_NS: &str = "";

/// Identifier of the metadata record.
pub const METADATA_ID: &str = "$metadata";

/// Store-level sync state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Last server sequence fully applied by a pull.
    #[serde(default)]
    pub sequence: u64,

    /// The change ledger: lowlaId to pre-edit snapshot.
    #[serde(default)]
    pub changes: BTreeMap<String, JsonDocument>,
}

impl Metadata {
    /// Reads the record inside `tx`, defaulting when it does not exist yet.
    ///
    /// # Errors
    ///
    /// Fails if the record cannot be loaded or has the wrong shape.
    pub fn load(tx: &dyn Transaction) -> CoreResult<Self> {
        match tx.load(METADATA_NS, METADATA_ID)? {
            Some(doc) => serde_json::from_value(serde_json::Value::Object(doc))
                .map_err(|e| CoreError::Metadata(e.to_string())),
            None => Ok(Self::default()),
        }
    }

    /// Writes the record inside `tx`.
    ///
    /// # Errors
    ///
    /// Fails if the write is rejected.
    pub fn store(&self, tx: &mut dyn Transaction) -> CoreResult<()> {
        let doc = match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(doc)) => doc,
            Ok(_) => return Err(CoreError::Metadata("not an object".into())),
            Err(e) => return Err(CoreError::Metadata(e.to_string())),
        };
        tx.save(METADATA_NS, METADATA_ID, doc)?;
        Ok(())
    }

    /// Whether `lowla_id` has unacknowledged local edits.
    #[must_use]
    pub fn is_pending(&self, lowla_id: &str) -> bool {
        self.changes.contains_key(lowla_id)
    }
}
