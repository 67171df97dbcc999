//! Store configuration via `docsql.toml`
//!
//! One file describes the connection target, the schema collections live in,
//! connection tuning, and the secondary indexes to declare when the store is
//! opened.

use docsql_core::{Error, Identifier, IndexDefinition, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name
pub const CONFIG_FILE_NAME: &str = "docsql.toml";

/// Schema used when none is configured
pub const DEFAULT_SCHEMA: &str = "main";

/// SQLite journal mode applied on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JournalMode {
    /// Write-ahead log: readers do not block the writer
    #[default]
    Wal,
    /// Rollback journal
    Delete,
}

impl JournalMode {
    /// Value for `PRAGMA journal_mode`
    pub fn as_pragma(&self) -> &'static str {
        match self {
            JournalMode::Wal => "WAL",
            JournalMode::Delete => "DELETE",
        }
    }
}

/// One `[[index]]` entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Collection the index belongs to
    pub collection: String,
    /// JSON path the column is extracted from
    pub path: String,
    /// Column name; derived from the path when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    /// Whether the index is unique
    #[serde(default)]
    pub unique: bool,
}

/// Store configuration loaded from `docsql.toml`.
///
/// # Example
///
/// ```toml
/// target = "/var/lib/app/docs.db"
/// schema = "main"
/// busy_timeout_ms = 5000
/// journal_mode = "wal"
///
/// [[index]]
/// collection = "users"
/// path = "$.email"
/// column = "email"
/// unique = true
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// Connection target (database path or `file:` URI)
    pub target: String,
    /// Schema that holds collection tables
    #[serde(default = "default_schema")]
    pub schema: String,
    /// How long a statement waits on a locked database
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `"wal"` or `"delete"`
    #[serde(default = "default_journal_mode")]
    pub journal_mode: String,
    /// Indexes registered when the store opens
    #[serde(default, rename = "index", skip_serializing_if = "Vec::is_empty")]
    pub indexes: Vec<IndexConfig>,
}

fn default_schema() -> String {
    DEFAULT_SCHEMA.to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_journal_mode() -> String {
    "wal".to_string()
}

impl StoreConfig {
    /// Config for `target` with every other setting at its default
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            schema: default_schema(),
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: default_journal_mode(),
            indexes: Vec::new(),
        }
    }

    /// Add an index declaration
    pub fn with_index(
        mut self,
        collection: &str,
        path: &str,
        column: Option<&str>,
        unique: bool,
    ) -> Self {
        self.indexes.push(IndexConfig {
            collection: collection.to_string(),
            path: path.to_string(),
            column: column.map(str::to_string),
            unique,
        });
        self
    }

    /// Parse the journal mode setting
    pub fn journal_mode(&self) -> Result<JournalMode> {
        match self.journal_mode.to_ascii_lowercase().as_str() {
            "wal" => Ok(JournalMode::Wal),
            "delete" => Ok(JournalMode::Delete),
            other => Err(Error::Config(format!(
                "Invalid journal_mode '{}'. Expected \"wal\" or \"delete\".",
                other
            ))),
        }
    }

    /// The schema as a validated identifier
    pub fn schema_identifier(&self) -> Result<Identifier> {
        Identifier::parse(&self.schema)
    }

    /// Validated index definitions, in file order
    pub fn index_definitions(&self) -> Result<Vec<IndexDefinition>> {
        self.indexes
            .iter()
            .map(|i| IndexDefinition::new(&i.collection, &i.path, i.column.as_deref(), i.unique))
            .collect()
    }

    /// Check every setting eagerly
    pub fn validate(&self) -> Result<()> {
        if self.target.trim().is_empty() {
            return Err(Error::Config("target must not be empty".to_string()));
        }
        self.journal_mode()?;
        self.schema_identifier()?;
        self.index_definitions()?;
        Ok(())
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: StoreConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a config file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Config(msg) => Error::Config(format!("{} ({})", msg, path.display())),
            other => other,
        })
    }

    /// Serialize this config to TOML and write it to the given path
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content).map_err(|e| {
            Error::Config(format!(
                "Failed to write config file '{}': {}",
                path.display(),
                e
            ))
        })
    }
}
