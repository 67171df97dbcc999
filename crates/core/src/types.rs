//! Document types
//!
//! A stored document is the pair `(id, body)`: a generated UUID and an
//! arbitrary JSON value.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a stored document
///
/// Generated on insert, never supplied by callers, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(Uuid);

impl DocumentId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        DocumentId(Uuid::new_v4())
    }

    /// Wrap an existing UUID
    pub fn from_uuid(uuid: Uuid) -> Self {
        DocumentId(uuid)
    }

    /// The underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DocumentId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(DocumentId)
            .map_err(|e| Error::MalformedStoredDocument {
                id: s.to_string(),
                reason: format!("identifier is not a uuid: {}", e),
            })
    }
}

/// A document read back from a collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Stored identifier
    pub id: DocumentId,
    /// Parsed JSON body
    pub body: JsonValue,
}

impl Document {
    /// Build a document from its stored columns
    ///
    /// # Errors
    ///
    /// `MalformedStoredDocument` when the identifier is not a UUID or the
    /// body is not valid JSON text.
    pub fn from_stored(id: &str, body: &str) -> Result<Self> {
        let id: DocumentId = id.parse()?;
        let body = serde_json::from_str(body).map_err(|e| Error::MalformedStoredDocument {
            id: id.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { id, body })
    }

    /// Top-level field of an object body
    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.body.get(field)
    }

    /// Deserialize the body into a typed value
    pub fn decode<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.body.clone()).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Take the body, dropping the identifier
    pub fn into_body(self) -> JsonValue {
        self.body
    }
}
