//! Schema definition statements for collection tables
//!
//! ## Table shape
//!
//! ```text
//! "schema"."collection"
//! ┌──────────────┬──────────────────┬─────────────────────────────────────┐
//! │ _id TEXT PK  │ _document TEXT   │ <column> AS (json_extract(...))     │
//! │              │                  │ ... one per registered index        │
//! └──────────────┴──────────────────┴─────────────────────────────────────┘
//! ```
//!
//! Every batch carries a probe. When the probe finds the object the batch
//! would create, the batch is skipped, so a plan can be re-run against a
//! database that already has some or all of it. The column addition and
//! index creation of one index live in the same batch and are applied in
//! one transaction.
//!
//! Generation is pure: identifiers are already validated, derived index
//! names are validated here, and nothing touches the database.

use docsql_core::{
    Identifier, IndexDefinition, Params, Result, DOCUMENT_COLUMN, ID_COLUMN,
};

/// Existence check guarding a [`DdlBatch`]
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    /// Query returning a row when the object already exists
    pub sql: String,
    /// Bound parameters of `sql`
    pub params: Params,
}

/// Statements applied together, unless the probe says they already were
#[derive(Debug, Clone, PartialEq)]
pub struct DdlBatch {
    /// Short description for logs
    pub label: String,
    /// Existence check
    pub probe: Probe,
    /// Statements, in execution order
    pub statements: Vec<String>,
}

/// Ordered batches that bring one collection up to date
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DdlPlan {
    /// Table batch first, then one batch per index in declaration order
    pub batches: Vec<DdlBatch>,
}

impl DdlPlan {
    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    /// True for an empty plan
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Builds DDL for one collection table
#[derive(Debug, Clone, Copy)]
pub struct DdlGenerator<'a> {
    schema: &'a Identifier,
    table: &'a Identifier,
}

impl<'a> DdlGenerator<'a> {
    /// Generator for `schema.table`
    pub fn new(schema: &'a Identifier, table: &'a Identifier) -> Self {
        Self { schema, table }
    }

    /// Full plan: the table, then every index that belongs to this table
    ///
    /// Definitions for other collections are ignored.
    pub fn plan(&self, indexes: &[IndexDefinition]) -> Result<DdlPlan> {
        let mut batches = vec![self.create_table()];
        for definition in indexes.iter().filter(|d| d.collection() == self.table) {
            batches.push(self.add_index(definition)?);
        }
        Ok(DdlPlan { batches })
    }

    /// Table creation batch
    pub fn create_table(&self) -> DdlBatch {
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {qualified} (\n    \
             \"{id}\" TEXT NOT NULL,\n    \
             \"{doc}\" TEXT NOT NULL,\n    \
             CONSTRAINT \"PK_{table}\" PRIMARY KEY (\"{id}\")\n)",
            qualified = self.qualified_table(),
            id = ID_COLUMN,
            doc = DOCUMENT_COLUMN,
            table = self.table.as_str(),
        );

        DdlBatch {
            label: format!("table {}", self.table),
            probe: Probe {
                sql: format!(
                    "SELECT 1 FROM {}.sqlite_master \
                     WHERE type = 'table' AND name = @table COLLATE NOCASE",
                    self.schema.quoted()
                ),
                params: Params::new().with("table", self.table.as_str()),
            },
            statements: vec![sql],
        }
    }

    /// Computed column plus index batch for one definition
    pub fn add_index(&self, definition: &IndexDefinition) -> Result<DdlBatch> {
        let index_name = definition.index_name()?;
        let column = definition.column();

        let add_column = format!(
            "ALTER TABLE {table} ADD COLUMN {column} AS (json_extract(\"{doc}\", {path})) VIRTUAL",
            table = self.qualified_table(),
            column = column.quoted(),
            doc = DOCUMENT_COLUMN,
            path = definition.path().literal(),
        );
        let create_index = format!(
            "CREATE {unique}INDEX IF NOT EXISTS {schema}.{index} ON {table} ({column})",
            unique = if definition.is_unique() { "UNIQUE " } else { "" },
            schema = self.schema.quoted(),
            index = index_name.quoted(),
            table = self.table.quoted(),
            column = column.quoted(),
        );

        Ok(DdlBatch {
            label: format!("index {}.{}", self.table, column),
            probe: Probe {
                sql: "SELECT 1 FROM pragma_table_xinfo(@table, @schema) \
                      WHERE name = @column COLLATE NOCASE"
                    .to_string(),
                params: Params::new()
                    .with("table", self.table.as_str())
                    .with("schema", self.schema.as_str())
                    .with("column", column.as_str()),
            },
            statements: vec![add_column, create_index],
        })
    }

    /// `"schema"."table"`
    pub fn qualified_table(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }
}
