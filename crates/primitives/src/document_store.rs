//! DocumentStore: JSON document collections backed by tables
//!
//! ## Design: SCHEMA ON DEMAND
//!
//! A collection is a table named after it, created the first time any
//! operation touches it. Every operation goes through the same two steps:
//!
//! 1. `SchemaRegistry::ensure_created` for the collection (no I/O once the
//!    process has seen the table)
//! 2. one parameterized data statement on a fresh session
//!
//! Step 1 always completes before step 2 starts.
//!
//! ## Sessions
//!
//! Sessions are opened inside `spawn_blocking` for one statement and closed
//! on every exit path. The ensure step uses its own session; nothing is held
//! across an `.await`.
//!
//! ## Cancellation
//!
//! A handle returned by [`DocumentStore::with_cancellation`] races reads and
//! the schema step of writes against its token and returns
//! `Error::Cancelled` when it fires. The schema cache only changes on
//! confirmed DDL success, so a cancelled operation never leaves a collection
//! half-registered. An insert whose statement has started is not raced: it
//! reports its real outcome, so `Cancelled` from `insert` means nothing was
//! written.

use crate::query::{Documents, Query};
use docsql_core::{
    Document, DocumentId, Error, Identifier, IndexCatalog, IndexDefinition, Params, Result,
    SqlValue, DOCUMENT_COLUMN, ID_COLUMN,
};
use docsql_engine::{
    Connector, DdlGenerator, Row, SchemaKey, SchemaRegistry, SchemaState, Session,
    SqliteConnector, StoreConfig, DEFAULT_SCHEMA,
};
use parking_lot::RwLock;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

struct StoreInner {
    connector: Arc<dyn Connector>,
    schema: Identifier,
    registry: Arc<SchemaRegistry>,
    catalog: RwLock<IndexCatalog>,
}

/// JSON document storage over a relational database
///
/// Cheap to clone; clones share the connector, index catalog and schema
/// registry.
///
/// # Example
///
/// ```ignore
/// use docsql_primitives::{DocumentStore, Query};
/// use serde_json::json;
///
/// let store = DocumentStore::open(&StoreConfig::new("/tmp/docs.db"))?;
/// store.register_index("users", "$.age", Some("age"), false)?;
///
/// let id = store.insert("users", &json!({"name": "Ava", "age": 31})).await?;
/// let doc = store
///     .get_one("users", &Query::new().filter("age > @minAge").param("minAge", 30))
///     .await?;
/// assert_eq!(doc.map(|d| d.id), Some(id));
/// ```
#[derive(Clone)]
pub struct DocumentStore {
    inner: Arc<StoreInner>,
    cancel: Option<CancellationToken>,
}

impl DocumentStore {
    /// Store over `connector` in the default schema, sharing the
    /// process-wide registry
    pub fn new(connector: Arc<dyn Connector>) -> Result<Self> {
        Self::with_registry(connector, DEFAULT_SCHEMA, SchemaRegistry::global())
    }

    /// Store with an explicit schema and registry
    pub fn with_registry(
        connector: Arc<dyn Connector>,
        schema: &str,
        registry: Arc<SchemaRegistry>,
    ) -> Result<Self> {
        Ok(Self::from_parts(
            connector,
            Identifier::parse(schema)?,
            registry,
            IndexCatalog::new(),
        ))
    }

    /// Open a SQLite-backed store from a config, registering its indexes
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let connector: Arc<dyn Connector> = Arc::new(SqliteConnector::from_config(config)?);
        let store = Self::from_parts(
            connector,
            config.schema_identifier()?,
            SchemaRegistry::global(),
            IndexCatalog::new(),
        );
        for definition in config.index_definitions()? {
            store.register(definition)?;
        }
        Ok(store)
    }

    fn from_parts(
        connector: Arc<dyn Connector>,
        schema: Identifier,
        registry: Arc<SchemaRegistry>,
        catalog: IndexCatalog,
    ) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                connector,
                schema,
                registry,
                catalog: RwLock::new(catalog),
            }),
            cancel: None,
        }
    }

    /// Handle whose operations stop with `Error::Cancelled` once `token`
    /// is cancelled
    ///
    /// An insert that already started its statement runs to completion and
    /// returns its outcome.
    pub fn with_cancellation(&self, token: CancellationToken) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            cancel: Some(token),
        }
    }

    /// Connection target of this store
    pub fn target(&self) -> &str {
        self.inner.connector.target()
    }

    /// Schema that holds the collection tables
    pub fn schema(&self) -> &Identifier {
        &self.inner.schema
    }

    // ========================================================================
    // Index registration
    // ========================================================================

    /// Declare a secondary index over `json_path` for `collection`
    ///
    /// Must happen before the collection is first used in this process,
    /// unless the identical definition was already applied to it (a store
    /// reopened from the same config). Returns `Ok(false)` when the identical
    /// index is already registered with this store.
    ///
    /// # Errors
    ///
    /// - `InvalidIdentifier` / `InvalidPath` for unusable names
    /// - `IndexConflict` when the column is taken by a different definition
    /// - `CollectionInitialized` when the collection is being or has been
    ///   ensured without this definition
    pub fn register_index(
        &self,
        collection: &str,
        json_path: &str,
        column: Option<&str>,
        unique: bool,
    ) -> Result<bool> {
        let definition = IndexDefinition::new(collection, json_path, column, unique)?;
        self.register(definition)
    }

    fn register(&self, definition: IndexDefinition) -> Result<bool> {
        match self.inner.registry.state(&self.key(definition.collection())) {
            SchemaState::Unknown => {}
            SchemaState::Created(applied) if applied.contains(&definition) => {}
            SchemaState::Created(_) | SchemaState::Creating => {
                return Err(Error::CollectionInitialized {
                    collection: definition.collection().to_string(),
                });
            }
        }
        let added = self.inner.catalog.write().register(definition.clone())?;
        if added {
            debug!(
                collection = %definition.collection(),
                column = %definition.column(),
                path = %definition.path(),
                unique = definition.is_unique(),
                "Registered index"
            );
        }
        Ok(added)
    }

    /// Indexes registered for `collection`
    pub fn indexes(&self, collection: &str) -> Result<Vec<IndexDefinition>> {
        let collection = Identifier::parse(collection)?;
        Ok(self.inner.catalog.read().for_collection(&collection))
    }

    // ========================================================================
    // Document operations
    // ========================================================================

    /// Create the collection's table and indexes if this process has not
    /// done so yet
    pub async fn ensure_collection(&self, collection: &str) -> Result<()> {
        let table = Identifier::parse(collection)?;
        self.run(self.ensure(&table)).await
    }

    /// First document matching `query`, if any
    pub async fn get_one(&self, collection: &str, query: &Query) -> Result<Option<Document>> {
        let table = Identifier::parse(collection)?;
        self.run(async {
            self.ensure(&table).await?;
            let sql = self.select_sql(&table, query);
            let params = query.params().clone();
            let rows = self
                .with_session(move |session| session.query(&sql, &params, Some(1)))
                .await?;
            rows.first().map(document_from_row).transpose()
        })
        .await
    }

    /// Every document matching `query`
    ///
    /// A row whose body is not valid JSON becomes an `Err` entry of the
    /// result; the remaining rows are still returned.
    pub async fn get_many(&self, collection: &str, query: &Query) -> Result<Documents> {
        let table = Identifier::parse(collection)?;
        self.run(async {
            self.ensure(&table).await?;
            let sql = self.select_sql(&table, query);
            let params = query.params().clone();
            let rows = self
                .with_session(move |session| session.query(&sql, &params, None))
                .await?;

            let documents: Vec<Result<Document>> = rows
                .iter()
                .map(|row| {
                    document_from_row(row).map_err(|e| {
                        warn!(collection = %table, error = %e, "Malformed stored document");
                        e
                    })
                })
                .collect();
            debug!(collection = %table, rows = documents.len(), "Read documents");
            Ok(Documents::new(documents))
        })
        .await
    }

    /// Document with identifier `id`, if present
    pub async fn get_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        let query = Query::new()
            .filter(format!("\"{}\" = @{}", ID_COLUMN, ID_COLUMN))
            .param(ID_COLUMN, id);
        self.get_one(collection, &query).await
    }

    /// Store `document` under a newly generated identifier
    ///
    /// # Errors
    ///
    /// - `Serialization` when the value cannot be turned into JSON text
    /// - `ConstraintViolation` when a unique index rejects the document
    pub async fn insert<T>(&self, collection: &str, document: &T) -> Result<DocumentId>
    where
        T: Serialize + ?Sized,
    {
        let table = Identifier::parse(collection)?;
        let id = DocumentId::new();
        let body = serde_json::to_string(document)?;

        self.run(self.ensure(&table)).await?;
        if self.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let sql = format!(
            "INSERT INTO {} (\"{}\", \"{}\") VALUES (@{}, @{})",
            self.qualified(&table),
            ID_COLUMN,
            DOCUMENT_COLUMN,
            ID_COLUMN,
            DOCUMENT_COLUMN
        );
        let params = Params::new()
            .with(ID_COLUMN, id)
            .with(DOCUMENT_COLUMN, SqlValue::Text(body));

        // Not raced against the token: the statement may already be committing.
        self.with_session(move |session| session.execute(&sql, &params))
            .await
            .map_err(|e| match e {
                Error::ConstraintViolation { reason, .. } => Error::ConstraintViolation {
                    collection: table.to_string(),
                    reason,
                },
                other => other,
            })?;
        debug!(collection = %table, id = %id, "Inserted document");
        Ok(id)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn key(&self, collection: &Identifier) -> SchemaKey {
        SchemaKey::new(self.target(), &self.inner.schema, collection)
    }

    fn qualified(&self, table: &Identifier) -> String {
        DdlGenerator::new(&self.inner.schema, table).qualified_table()
    }

    async fn ensure(&self, table: &Identifier) -> Result<()> {
        let indexes = self.inner.catalog.read().for_collection(table);
        self.inner
            .registry
            .ensure_created(&self.inner.connector, &self.inner.schema, table, &indexes)
            .await
    }

    fn select_sql(&self, table: &Identifier, query: &Query) -> String {
        let mut sql = format!(
            "SELECT \"{}\", \"{}\" FROM {}",
            ID_COLUMN,
            DOCUMENT_COLUMN,
            self.qualified(table)
        );
        if let Some(filter) = query.filter_clause() {
            sql.push_str(&format!(
                "\nWHERE json_valid(\"{}\") AND ({})",
                DOCUMENT_COLUMN, filter
            ));
        }
        if let Some(suffix) = query.suffix_clause() {
            sql.push('\n');
            sql.push_str(suffix);
        }
        sql
    }

    /// Run `f` on a fresh session in the blocking pool
    async fn with_session<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn Session) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let connector = Arc::clone(&self.inner.connector);
        tokio::task::spawn_blocking(move || {
            let mut session = connector.connect()?;
            f(session.as_mut())
        })
        .await
        .map_err(|e| Error::Internal(format!("session task failed: {}", e)))?
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancellationToken::is_cancelled)
    }

    async fn run<T>(&self, op: impl Future<Output = Result<T>>) -> Result<T> {
        match &self.cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(Error::Cancelled),
                    result = op => result,
                }
            }
            None => op.await,
        }
    }
}

fn document_from_row(row: &Row) -> Result<Document> {
    let id = match row.get(0) {
        Some(SqlValue::Text(id)) => id.as_str(),
        other => {
            return Err(Error::MalformedStoredDocument {
                id: format!("{:?}", other),
                reason: "identifier is not text".to_string(),
            })
        }
    };
    match row.get(1) {
        Some(SqlValue::Text(body)) => Document::from_stored(id, body),
        Some(SqlValue::Blob(_)) => Err(Error::MalformedStoredDocument {
            id: id.to_string(),
            reason: "document body is not valid UTF-8 text".to_string(),
        }),
        _ => Err(Error::MalformedStoredDocument {
            id: id.to_string(),
            reason: "document body is not text".to_string(),
        }),
    }
}
