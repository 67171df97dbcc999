//! Statement parameter values
//!
//! [`SqlValue`] is the backend-neutral value bound to a named parameter.
//! [`Params`] is an ordered list of `(name, value)` pairs with names
//! normalized to the `@name` form used in statement text.

use crate::types::DocumentId;
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A value bound to a statement parameter or read from a row
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// SQL NULL
    Null,
    /// 64-bit signed integer
    Integer(i64),
    /// 64-bit float
    Real(f64),
    /// UTF-8 text
    Text(String),
    /// Raw bytes
    Blob(Vec<u8>),
}

impl SqlValue {
    /// Text content, if this is a text value
    pub fn as_text(&self) -> Option<&str> {
        match self {
            SqlValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content, if this is an integer value
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// True for SQL NULL
    pub fn is_null(&self) -> bool {
        matches!(self, SqlValue::Null)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Integer(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<u32> for SqlValue {
    fn from(v: u32) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Real(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Integer(v as i64)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Blob(v)
    }
}

impl From<Uuid> for SqlValue {
    fn from(v: Uuid) -> Self {
        SqlValue::Text(v.hyphenated().to_string())
    }
}

impl From<DocumentId> for SqlValue {
    fn from(v: DocumentId) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(SqlValue::Null, Into::into)
    }
}

/// Scalars map to their SQL counterparts; arrays and objects bind as JSON text
impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => b.into(),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => SqlValue::Text(s),
            other => SqlValue::Text(other.to_string()),
        }
    }
}

/// Named statement parameters
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params(Vec<(String, SqlValue)>);

impl Params {
    /// Create an empty parameter list
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value` to `name`
    ///
    /// `name` may be given bare or with a `@`, `:` or `$` prefix; it is
    /// stored as `@name`. Binding a name twice replaces the earlier value.
    pub fn bind(&mut self, name: &str, value: impl Into<SqlValue>) {
        let name = normalize_param_name(name);
        let value = value.into();
        match self.0.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    /// Builder form of [`Params::bind`]
    pub fn with(mut self, name: &str, value: impl Into<SqlValue>) -> Self {
        self.bind(name, value);
        self
    }

    /// Iterate `(name, value)` pairs in binding order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Value bound to `name`, in any accepted spelling
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let name = normalize_param_name(name);
        self.0.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    /// Number of bound parameters
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing is bound
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

fn normalize_param_name(name: &str) -> String {
    let bare = name.trim_start_matches(['@', ':', '$']);
    format!("@{}", bare)
}
