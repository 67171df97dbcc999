//! Error types for docsql
//!
//! Every failure mode of the document layer is one variant of [`Error`].
//! Variants carry names and database reasons only, never generated SQL text.
//!
//! `Error` is `Clone` so that the outcome of a single schema-creation flight
//! can be handed to every caller waiting on it.
//!
//! # Categories
//!
//! | Category | Variants | Typical response |
//! |----------|----------|------------------|
//! | Infrastructure | `ConnectionFailure`, `Query`, `Internal` | Propagate, caller decides on retry |
//! | Schema | `SchemaCreationFailure` | Retry later, the collection stays unmarked |
//! | Validation | `InvalidIdentifier`, `InvalidPath`, `IndexConflict`, `CollectionInitialized` | Fix configuration |
//! | Data | `MalformedStoredDocument`, `ConstraintViolation`, `Serialization` | Per-document handling |
//! | Control | `Cancelled`, `Config` | Caller-driven |

use thiserror::Error;

/// Result type alias for docsql operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for docsql
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    // ==================== Infrastructure ====================
    /// The database could not be opened or reached
    #[error("connection failure for '{target}': {reason}")]
    ConnectionFailure {
        /// Connection target that failed
        target: String,
        /// Reason reported by the backend
        reason: String,
    },

    /// A data statement failed to execute
    #[error("query failed: {reason}")]
    Query {
        /// Reason reported by the backend
        reason: String,
    },

    /// A blocking task could not be joined
    #[error("internal error: {0}")]
    Internal(String),

    // ==================== Schema ====================
    /// Table or index creation failed
    #[error("schema creation failed for collection '{collection}': {reason}")]
    SchemaCreationFailure {
        /// Collection whose schema could not be created
        collection: String,
        /// Reason reported by the backend
        reason: String,
    },

    // ==================== Validation ====================
    /// A table, column, schema or index name is not a safe identifier
    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        /// The rejected identifier
        identifier: String,
        /// Why it was rejected
        reason: String,
    },

    /// A JSON path expression is not safe to embed in a statement
    #[error("invalid json path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path expression
        path: String,
        /// Why it was rejected
        reason: String,
    },

    /// The same column was registered twice with different definitions
    #[error(
        "index conflict on '{collection}.{column}': already registered for '{existing}', got '{requested}'"
    )]
    IndexConflict {
        /// Collection the column belongs to
        collection: String,
        /// Conflicting column name
        column: String,
        /// Definition already registered
        existing: String,
        /// Definition that was rejected
        requested: String,
    },

    /// An index was registered after the collection's schema was ensured
    #[error("collection '{collection}' is already initialized; register indexes before first use")]
    CollectionInitialized {
        /// Collection that is already in use
        collection: String,
    },

    // ==================== Data ====================
    /// A stored row could not be turned into a document
    #[error("malformed stored document '{id}': {reason}")]
    MalformedStoredDocument {
        /// Identifier column of the row, as stored
        id: String,
        /// Parse failure
        reason: String,
    },

    /// A unique index or the identifier key rejected a write
    #[error("constraint violation in collection '{collection}': {reason}")]
    ConstraintViolation {
        /// Collection that rejected the write
        collection: String,
        /// Constraint reported by the backend
        reason: String,
    },

    /// A document value could not be serialized to JSON text
    #[error("serialization error: {0}")]
    Serialization(String),

    // ==================== Control ====================
    /// The operation was cancelled before completing
    #[error("operation cancelled")]
    Cancelled,

    /// Configuration could not be read, parsed or validated
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an `InvalidIdentifier` error
    pub fn invalid_identifier(identifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidIdentifier {
            identifier: identifier.into(),
            reason: reason.into(),
        }
    }

    /// Create an `InvalidPath` error
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a `Query` error
    pub fn query(reason: impl ToString) -> Self {
        Error::Query {
            reason: reason.to_string(),
        }
    }

    /// True for failures to reach the database at all
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Error::ConnectionFailure { .. })
    }

    /// True for failures worth retrying without changing anything
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailure { .. } | Error::SchemaCreationFailure { .. } | Error::Cancelled
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
