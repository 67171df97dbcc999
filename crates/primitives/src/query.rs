//! Read query shape and result sequence
//!
//! ## Trust boundary
//!
//! `filter` and `suffix` are pasted into the statement text as written.
//! They are meant for fragments the application itself authors (predicates
//! over computed columns, `ORDER BY`, ...). Anything influenced from the
//! outside must go through [`Query::param`], which is always bound.

use docsql_core::{Document, Error, Params, Result, SqlValue};

/// Filter, trailing clause and parameters of a read
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    filter: Option<String>,
    suffix: Option<String>,
    params: Params,
}

impl Query {
    /// Match every document
    pub fn new() -> Self {
        Self::default()
    }

    /// Predicate appended as `WHERE json_valid(_document) AND (<filter>)`
    pub fn filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    /// Clause appended after the WHERE clause, e.g. `ORDER BY name`
    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    /// Bind a named parameter referenced as `@name` in the filter or suffix
    pub fn param(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.params.bind(name, value);
        self
    }

    /// The filter fragment, if any
    pub fn filter_clause(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The suffix fragment, if any
    pub fn suffix_clause(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    /// Bound parameters
    pub fn params(&self) -> &Params {
        &self.params
    }
}

/// Documents returned by a multi-row read
///
/// Each row is parsed on its own: a malformed row shows up as an `Err` in
/// its position instead of cutting the sequence short. The sequence is
/// consumed by iterating it.
#[derive(Debug)]
pub struct Documents {
    rows: Vec<Result<Document>>,
}

impl Documents {
    pub(crate) fn new(rows: Vec<Result<Document>>) -> Self {
        Self { rows }
    }

    /// Number of rows read, malformed ones included
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when no row matched
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows that failed to parse
    pub fn malformed_count(&self) -> usize {
        self.rows.iter().filter(|r| r.is_err()).count()
    }

    /// All documents, or the first row error
    pub fn into_result(self) -> Result<Vec<Document>> {
        self.rows.into_iter().collect()
    }

    /// Parsed documents only, skipping malformed rows
    pub fn into_valid(self) -> Vec<Document> {
        self.rows.into_iter().filter_map(|r| r.ok()).collect()
    }

    /// Errors for malformed rows only
    pub fn errors(&self) -> impl Iterator<Item = &Error> {
        self.rows.iter().filter_map(|r| r.as_ref().err())
    }
}

impl IntoIterator for Documents {
    type Item = Result<Document>;
    type IntoIter = std::vec::IntoIter<Result<Document>>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
