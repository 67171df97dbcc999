//! Core types for docsql
//!
//! This crate defines the foundational types shared by every layer:
//! - Error: Error type hierarchy
//! - Identifier: validated table/column/index names
//! - JsonPath: validated JSON path expressions for computed columns
//! - IndexDefinition / IndexCatalog: secondary index declarations
//! - DocumentId / Document: stored documents
//! - SqlValue / Params: statement parameters

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod identifier;
pub mod index;
pub mod json_path;
pub mod types;
pub mod value;

pub use error::{Error, Result};
pub use identifier::{normalize_column_name, Identifier, MAX_IDENTIFIER_LEN};
pub use index::{IndexCatalog, IndexDefinition, DOCUMENT_COLUMN, ID_COLUMN};
pub use json_path::{JsonPath, MAX_PATH_LEN};
pub use types::{Document, DocumentId};
pub use value::{Params, SqlValue};
