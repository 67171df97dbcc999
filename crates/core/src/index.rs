//! Secondary index definitions and the per-store index catalog
//!
//! An [`IndexDefinition`] makes one JSON path of a collection indexable by
//! adding a computed column extracted from the document body. The
//! [`IndexCatalog`] collects definitions per collection and enforces that a
//! column name means exactly one definition within its collection.

use crate::error::{Error, Result};
use crate::identifier::{normalize_column_name, Identifier, MAX_IDENTIFIER_LEN};
use crate::json_path::JsonPath;
use std::collections::BTreeMap;
use std::fmt;

/// Identifier column of every collection table
pub const ID_COLUMN: &str = "_id";

/// Document body column of every collection table
pub const DOCUMENT_COLUMN: &str = "_document";

/// One computed column plus secondary index over a JSON path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    collection: Identifier,
    path: JsonPath,
    column: Identifier,
    unique: bool,
}

impl IndexDefinition {
    /// Build a definition, deriving the column name from the path when
    /// `column` is `None`
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` for a bad collection or column name, or a column
    ///   that shadows `_id` / `_document`
    /// - `InvalidPath` for a path outside the accepted character set
    pub fn new(collection: &str, path: &str, column: Option<&str>, unique: bool) -> Result<Self> {
        let collection = Identifier::parse(collection)?;
        let path = JsonPath::parse(path)?;
        let column = match column {
            Some(name) => Identifier::parse(name)?,
            None => Identifier::parse(&normalize_column_name(path.as_str()))?,
        };

        let key = column.key();
        if key == ID_COLUMN || key == DOCUMENT_COLUMN {
            return Err(Error::invalid_identifier(
                column.as_str(),
                "reserved column name",
            ));
        }

        Ok(Self {
            collection,
            path,
            column,
            unique,
        })
    }

    /// Collection the index belongs to
    pub fn collection(&self) -> &Identifier {
        &self.collection
    }

    /// JSON path the column is extracted from
    pub fn path(&self) -> &JsonPath {
        &self.path
    }

    /// Computed column name
    pub fn column(&self) -> &Identifier {
        &self.column
    }

    /// Whether the index enforces uniqueness
    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Name of the secondary index over the computed column
    ///
    /// Index names share one namespace per schema, so the table name is
    /// length-prefixed to keep `(a_b, c)` and `(a, b_c)` apart.
    pub fn index_name(&self) -> Result<Identifier> {
        let name = format!(
            "IDX{}_{}_{}",
            self.collection.as_str().len(),
            self.collection.as_str(),
            self.column.as_str()
        );
        if name.len() > MAX_IDENTIFIER_LEN {
            return Err(Error::invalid_identifier(
                name,
                "derived index name is too long; choose a shorter column name",
            ));
        }
        Identifier::parse(&name)
    }

    fn same_shape(&self, other: &IndexDefinition) -> bool {
        self.path == other.path && self.unique == other.unique
    }
}

impl fmt::Display for IndexDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.path,
            if self.unique { " (unique)" } else { "" }
        )
    }
}

/// Registered index definitions, grouped by collection in declaration order
#[derive(Debug, Clone, Default)]
pub struct IndexCatalog {
    by_collection: BTreeMap<String, Vec<IndexDefinition>>,
}

impl IndexCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition
    ///
    /// Returns `Ok(true)` when added, `Ok(false)` when an identical
    /// definition is already present.
    ///
    /// # Errors
    ///
    /// `IndexConflict` when the column is already registered for the same
    /// collection with a different path or uniqueness.
    pub fn register(&mut self, definition: IndexDefinition) -> Result<bool> {
        let entries = self
            .by_collection
            .entry(definition.collection.key())
            .or_default();

        if let Some(existing) = entries.iter().find(|d| d.column == definition.column) {
            if existing.same_shape(&definition) {
                return Ok(false);
            }
            return Err(Error::IndexConflict {
                collection: definition.collection.to_string(),
                column: definition.column.to_string(),
                existing: existing.to_string(),
                requested: definition.to_string(),
            });
        }

        entries.push(definition);
        Ok(true)
    }

    /// Definitions for one collection, in declaration order
    pub fn for_collection(&self, collection: &Identifier) -> Vec<IndexDefinition> {
        self.by_collection
            .get(&collection.key())
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of definitions
    pub fn len(&self) -> usize {
        self.by_collection.values().map(Vec::len).sum()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
