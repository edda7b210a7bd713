//! Document and replication identifiers.

use lowla_codec::JsonDocument;
use serde_json::Value as Json;

/// Derives the replication identifier ("lowlaId") of a document.
///
/// Implementations must be pure: the same namespace and document always
/// yield the same identifier.
pub trait LowlaIdStrategy: Send + Sync {
    /// Identifier for `document` stored in `client_ns`.
    fn lowla_id(&self, client_ns: &str, document: &JsonDocument) -> String;
}

/// `<clientNs>$<_id>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultLowlaId;

impl LowlaIdStrategy for DefaultLowlaId {
    fn lowla_id(&self, client_ns: &str, document: &JsonDocument) -> String {
        match document.get("_id") {
            Some(Json::String(id)) => format!("{client_ns}${id}"),
            Some(other) => format!("{client_ns}${other}"),
            None => format!("{client_ns}$"),
        }
    }
}

impl<F> LowlaIdStrategy for F
where
    F: Fn(&str, &JsonDocument) -> String + Send + Sync,
{
    fn lowla_id(&self, client_ns: &str, document: &JsonDocument) -> String {
        self(client_ns, document)
    }
}

/// A fresh random document identifier in UUID form.
#[must_use]
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
