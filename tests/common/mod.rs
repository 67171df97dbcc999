//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's main.rs.

#![allow(dead_code)]

pub use docsql::{
    Connector, DdlBatch, Document, DocumentId, DocumentStore, Error, Identifier, Params, Query,
    Result, Row, SchemaKey, SchemaRegistry, Session, SqliteConnector, StoreConfig,
};
pub use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// CountingConnector - SQLite connector that records what it is asked to do
// ============================================================================

/// Wraps a `SqliteConnector`, counting sessions opened and DDL batches run
pub struct CountingConnector {
    inner: SqliteConnector,
    connects: AtomicUsize,
    applies: Arc<AtomicUsize>,
    ddl_delay: Duration,
}

impl CountingConnector {
    pub fn new(target: String) -> Self {
        Self::with_ddl_delay(target, Duration::ZERO)
    }

    /// Every DDL batch sleeps for `delay` before running
    pub fn with_ddl_delay(target: String, delay: Duration) -> Self {
        Self {
            inner: SqliteConnector::new(target),
            connects: AtomicUsize::new(0),
            applies: Arc::new(AtomicUsize::new(0)),
            ddl_delay: delay,
        }
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn applies(&self) -> usize {
        self.applies.load(Ordering::SeqCst)
    }
}

struct CountingSession {
    inner: Box<dyn Session>,
    applies: Arc<AtomicUsize>,
    ddl_delay: Duration,
}

impl Session for CountingSession {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<usize> {
        self.inner.execute(sql, params)
    }

    fn query(&mut self, sql: &str, params: &Params, limit: Option<usize>) -> Result<Vec<Row>> {
        self.inner.query(sql, params, limit)
    }

    fn apply(&mut self, batch: &DdlBatch) -> Result<bool> {
        std::thread::sleep(self.ddl_delay);
        self.applies.fetch_add(1, Ordering::SeqCst);
        self.inner.apply(batch)
    }
}

impl Connector for CountingConnector {
    fn target(&self) -> &str {
        self.inner.target()
    }

    fn connect(&self) -> Result<Box<dyn Session>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingSession {
            inner: self.inner.connect()?,
            applies: Arc::clone(&self.applies),
            ddl_delay: self.ddl_delay,
        }))
    }
}

// ============================================================================
// TestStore - DocumentStore over a temp database with a private registry
// ============================================================================

pub struct TestStore {
    pub store: DocumentStore,
    pub connector: Arc<CountingConnector>,
    pub registry: Arc<SchemaRegistry>,
    pub dir: TempDir,
}

impl TestStore {
    pub fn new() -> Self {
        Self::with_ddl_delay(Duration::ZERO)
    }

    pub fn with_ddl_delay(delay: Duration) -> Self {
        let dir = TempDir::new().unwrap();
        // Create the file and switch it to WAL before any concurrent opens.
        drop(SqliteConnector::new(db_path(&dir)).connect().unwrap());
        let connector = Arc::new(CountingConnector::with_ddl_delay(db_path(&dir), delay));
        let registry = Arc::new(SchemaRegistry::new());
        let dyn_connector: Arc<dyn Connector> = connector.clone();
        let store =
            DocumentStore::with_registry(dyn_connector, "main", Arc::clone(&registry)).unwrap();
        Self {
            store,
            connector,
            registry,
            dir,
        }
    }

    /// A second store on the same database, as another process would see it
    pub fn fresh_process(&self) -> DocumentStore {
        let connector: Arc<dyn Connector> = Arc::new(SqliteConnector::new(db_path(&self.dir)));
        DocumentStore::with_registry(connector, "main", Arc::new(SchemaRegistry::new())).unwrap()
    }

    pub fn is_created(&self, collection: &str) -> bool {
        self.registry.is_created(&SchemaKey::new(
            self.store.target(),
            &Identifier::parse("main").unwrap(),
            &Identifier::parse(collection).unwrap(),
        ))
    }

    /// Column names of a table, read straight from the database
    pub fn columns(&self, table: &str) -> Vec<String> {
        let mut session = SqliteConnector::new(db_path(&self.dir)).connect().unwrap();
        session
            .query(
                "SELECT name FROM pragma_table_xinfo(@table) ORDER BY cid",
                &Params::new().with("table", table),
                None,
            )
            .unwrap()
            .iter()
            .map(|row| row.text(0).unwrap().to_string())
            .collect()
    }

    /// Index names of a table, read straight from the database
    pub fn index_names(&self, table: &str) -> Vec<String> {
        let mut session = SqliteConnector::new(db_path(&self.dir)).connect().unwrap();
        session
            .query(
                "SELECT name FROM sqlite_master WHERE type = 'index' AND tbl_name = @table \
                 AND name NOT LIKE 'sqlite_autoindex%' ORDER BY name",
                &Params::new().with("table", table),
                None,
            )
            .unwrap()
            .iter()
            .map(|row| row.text(0).unwrap().to_string())
            .collect()
    }

    /// Run a statement bypassing the store
    pub fn execute_raw(&self, sql: &str) {
        let mut session = SqliteConnector::new(db_path(&self.dir)).connect().unwrap();
        session.execute(sql, &Params::new()).unwrap();
    }

    /// Write a row bypassing the store
    pub fn insert_raw(&self, table: &str, id: &str, body: &str) {
        let mut session = SqliteConnector::new(db_path(&self.dir)).connect().unwrap();
        session
            .execute(
                &format!("INSERT INTO \"{}\" (\"_id\", \"_document\") VALUES (@id, @body)", table),
                &Params::new().with("id", id).with("body", body),
            )
            .unwrap();
    }
}

pub fn db_path(dir: &TempDir) -> String {
    dir.path().join("docs.db").to_string_lossy().into_owned()
}
