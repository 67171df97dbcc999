//! JSON path expressions used by computed index columns
//!
//! A path is embedded in DDL as a string literal (DDL cannot take bound
//! parameters), so it is restricted to a conservative character set:
//! ASCII letters and digits plus `_ $ . [ ] # - "` and space. Paths start
//! at the document root (`$`), brackets must balance and double quotes
//! must pair up.

use crate::error::{Error, Result};
use std::fmt;

/// Longest path expression accepted, in bytes
pub const MAX_PATH_LEN: usize = 256;

/// A validated JSON path such as `$.address.city` or `$.tags[0]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JsonPath(String);

impl JsonPath {
    /// Validate a path expression
    pub fn parse(expr: &str) -> Result<Self> {
        if !expr.starts_with('$') {
            return Err(Error::invalid_path(expr, "must start at the root '$'"));
        }
        if expr.len() > MAX_PATH_LEN {
            return Err(Error::invalid_path(
                expr,
                format!("longer than {} bytes", MAX_PATH_LEN),
            ));
        }

        let mut depth = 0i32;
        let mut in_quotes = false;
        for c in expr.chars() {
            match c {
                '"' => in_quotes = !in_quotes,
                '[' if !in_quotes => depth += 1,
                ']' if !in_quotes => {
                    depth -= 1;
                    if depth < 0 {
                        return Err(Error::invalid_path(expr, "unbalanced ']'"));
                    }
                }
                c if c.is_ascii_alphanumeric() => {}
                '_' | '$' | '.' | '#' | '-' | ' ' | '[' | ']' => {}
                other => {
                    return Err(Error::invalid_path(
                        expr,
                        format!("character {:?} is not allowed", other),
                    ))
                }
            }
        }
        if in_quotes {
            return Err(Error::invalid_path(expr, "unterminated quoted segment"));
        }
        if depth != 0 {
            return Err(Error::invalid_path(expr, "unbalanced '['"));
        }
        Ok(JsonPath(expr.to_string()))
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Single-quoted SQL string literal
    pub fn literal(&self) -> String {
        format!("'{}'", self.0.replace('\'', "''"))
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
