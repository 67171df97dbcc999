//! Validated SQL identifiers
//!
//! Table, schema, column and index names are substituted into generated
//! statements, so they are validated once at the edge and carried around as
//! [`Identifier`] afterwards. A valid identifier:
//!
//! - is 1..=[`MAX_IDENTIFIER_LEN`] bytes long
//! - contains only ASCII letters, digits and `_`
//! - does not start with a digit
//! - does not use the reserved `sqlite_` prefix
//!
//! Identifiers compare case-insensitively, the way the database resolves them.

use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Longest identifier accepted, in bytes
pub const MAX_IDENTIFIER_LEN: usize = 128;

const RESERVED_PREFIX: &str = "sqlite_";

/// A name that is safe to quote into a statement
#[derive(Debug, Clone)]
pub struct Identifier(String);

impl Identifier {
    /// Validate `name` as an identifier
    pub fn parse(name: &str) -> Result<Self> {
        validate(name)?;
        Ok(Identifier(name.to_string()))
    }

    /// The identifier as written by the caller
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Lowercased form used for lookups and cache keys
    pub fn key(&self) -> String {
        self.0.to_ascii_lowercase()
    }

    /// Double-quoted form for statement text
    pub fn quoted(&self) -> String {
        // Validation rules out '"', but keep the escaping honest.
        format!("\"{}\"", self.0.replace('"', "\"\""))
    }
}

fn validate(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_identifier(name, "identifier is empty"));
    }
    if name.len() > MAX_IDENTIFIER_LEN {
        return Err(Error::invalid_identifier(
            name,
            format!("longer than {} bytes", MAX_IDENTIFIER_LEN),
        ));
    }
    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '_'))
    {
        return Err(Error::invalid_identifier(
            name,
            format!("character {:?} is not allowed", bad),
        ));
    }
    if name.as_bytes()[0].is_ascii_digit() {
        return Err(Error::invalid_identifier(name, "starts with a digit"));
    }
    if name.to_ascii_lowercase().starts_with(RESERVED_PREFIX) {
        return Err(Error::invalid_identifier(
            name,
            format!("the '{}' prefix is reserved", RESERVED_PREFIX),
        ));
    }
    Ok(())
}

/// Derive a column name from a JSON path expression
///
/// Every character outside `[A-Za-z0-9_]` becomes `_`, so `$.address.city`
/// maps to `__address_city`. Deterministic, but not injective: distinct paths
/// can map to the same column, which the index catalog rejects.
pub fn normalize_column_name(path: &str) -> String {
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

impl PartialEq for Identifier {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl Eq for Identifier {}

impl Hash for Identifier {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
