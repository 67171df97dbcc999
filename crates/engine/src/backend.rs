//! Database capability traits
//!
//! The document layer talks to the database through two small traits:
//!
//! - [`Connector`]: knows the connection target and opens sessions
//! - [`Session`]: one open connection, used for a single unit of work and
//!   released when dropped
//!
//! Sessions are blocking. Callers run them inside `spawn_blocking` and never
//! hold one across an `.await`.

use crate::ddl::DdlBatch;
use docsql_core::{Error, Params, Result, SqlValue};

/// One row returned by [`Session::query`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    columns: Vec<SqlValue>,
}

impl Row {
    /// Build a row from its column values
    pub fn new(columns: Vec<SqlValue>) -> Self {
        Self { columns }
    }

    /// Column value at `idx`
    pub fn get(&self, idx: usize) -> Option<&SqlValue> {
        self.columns.get(idx)
    }

    /// Text column at `idx`
    ///
    /// # Errors
    ///
    /// `Query` if the column is missing or not text.
    pub fn text(&self, idx: usize) -> Result<&str> {
        match self.columns.get(idx) {
            Some(SqlValue::Text(s)) => Ok(s),
            Some(other) => Err(Error::query(format!(
                "column {} is not text: {:?}",
                idx, other
            ))),
            None => Err(Error::query(format!("column {} out of range", idx))),
        }
    }

    /// Number of columns
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// True for a row without columns
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// An open database connection
///
/// Implementations map backend failures onto [`Error`]:
/// constraint failures become `ConstraintViolation` (with an empty
/// collection, filled in by the caller), everything else `Query`.
pub trait Session {
    /// Execute a statement, returning the number of affected rows
    fn execute(&mut self, sql: &str, params: &Params) -> Result<usize>;

    /// Run a query, reading at most `limit` rows from the cursor
    fn query(&mut self, sql: &str, params: &Params, limit: Option<usize>) -> Result<Vec<Row>>;

    /// Apply a DDL batch atomically
    ///
    /// Runs the batch's probe first; when the probe returns a row the
    /// statements are skipped. Returns `true` when the statements ran.
    fn apply(&mut self, batch: &DdlBatch) -> Result<bool>;
}

/// Opens sessions against one connection target
pub trait Connector: Send + Sync {
    /// Connection target, part of the schema cache key
    fn target(&self) -> &str;

    /// Open a new session
    ///
    /// # Errors
    ///
    /// `ConnectionFailure` when the target cannot be opened.
    fn connect(&self) -> Result<Box<dyn Session>>;
}
