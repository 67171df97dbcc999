//! SQLite implementation of the database capability
//!
//! Each [`SqliteConnector::connect`] opens a fresh `rusqlite::Connection`;
//! the connection closes when the returned session is dropped. Computed
//! index columns rely on generated-column support (SQLite 3.31+, shipped by
//! the bundled build) and the JSON1 functions.

use crate::backend::{Connector, Row, Session};
use crate::config::{JournalMode, StoreConfig};
use crate::ddl::DdlBatch;
use docsql_core::{Error, Params, Result, SqlValue};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{Connection, ErrorCode, OpenFlags, ToSql, TransactionBehavior};
use std::time::Duration;
use tracing::debug;

/// Default time a statement waits on a locked database
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Opens SQLite sessions against one database file
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    target: String,
    busy_timeout: Duration,
    journal_mode: JournalMode,
}

impl SqliteConnector {
    /// Connector for the database at `target` (a path or `file:` URI)
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            journal_mode: JournalMode::default(),
        }
    }

    /// Connector described by a validated config
    pub fn from_config(config: &StoreConfig) -> Result<Self> {
        Ok(Self {
            target: config.target.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
            journal_mode: config.journal_mode()?,
        })
    }

    /// Set how long statements wait on a locked database
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Set the journal mode applied on every connect
    pub fn with_journal_mode(mut self, mode: JournalMode) -> Self {
        self.journal_mode = mode;
        self
    }

    fn open(&self) -> std::result::Result<Connection, rusqlite::Error> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.target, flags)?;
        conn.busy_timeout(self.busy_timeout)?;
        let mode: String = conn.pragma_update_and_check(
            None,
            "journal_mode",
            self.journal_mode.as_pragma(),
            |row| row.get(0),
        )?;
        debug!(database = %self.target, journal_mode = %mode, "Opened sqlite session");
        Ok(conn)
    }
}

impl Connector for SqliteConnector {
    fn target(&self) -> &str {
        &self.target
    }

    fn connect(&self) -> Result<Box<dyn Session>> {
        let conn = self.open().map_err(|e| Error::ConnectionFailure {
            target: self.target.clone(),
            reason: e.to_string(),
        })?;
        Ok(Box::new(SqliteSession { conn }))
    }
}

/// One open SQLite connection
pub struct SqliteSession {
    conn: Connection,
}

impl SqliteSession {
    /// Wrap an already open connection
    pub fn new(conn: Connection) -> Self {
        Self { conn }
    }
}

impl Session for SqliteSession {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<usize> {
        let values = owned_params(params);
        let named = named_params(&values);
        let mut stmt = self.conn.prepare(sql).map_err(map_err)?;
        stmt.execute(named.as_slice()).map_err(map_err)
    }

    fn query(&mut self, sql: &str, params: &Params, limit: Option<usize>) -> Result<Vec<Row>> {
        let values = owned_params(params);
        let named = named_params(&values);
        let mut stmt = self.conn.prepare(sql).map_err(map_err)?;
        let width = stmt.column_count();
        let mut rows = stmt.query(named.as_slice()).map_err(map_err)?;

        let mut out = Vec::new();
        while limit.map_or(true, |max| out.len() < max) {
            let Some(row) = rows.next().map_err(map_err)? else {
                break;
            };
            let mut columns = Vec::with_capacity(width);
            for idx in 0..width {
                columns.push(from_value_ref(row.get_ref(idx).map_err(map_err)?));
            }
            out.push(Row::new(columns));
        }
        Ok(out)
    }

    fn apply(&mut self, batch: &DdlBatch) -> Result<bool> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(map_err)?;

        let exists = {
            let values = owned_params(&batch.probe.params);
            let named = named_params(&values);
            let mut stmt = tx.prepare(&batch.probe.sql).map_err(map_err)?;
            let mut rows = stmt.query(named.as_slice()).map_err(map_err)?;
            rows.next().map_err(map_err)?.is_some()
        };

        if exists {
            debug!(batch = %batch.label, "DDL batch already applied, skipping");
            tx.commit().map_err(map_err)?;
            return Ok(false);
        }

        for statement in &batch.statements {
            tx.execute_batch(statement).map_err(map_err)?;
        }
        tx.commit().map_err(map_err)?;
        debug!(batch = %batch.label, statements = batch.statements.len(), "Applied DDL batch");
        Ok(true)
    }
}

fn owned_params(params: &Params) -> Vec<(String, Value)> {
    params
        .iter()
        .map(|(name, value)| (name.to_string(), to_value(value)))
        .collect()
}

fn named_params(values: &[(String, Value)]) -> Vec<(&str, &dyn ToSql)> {
    values
        .iter()
        .map(|(name, value)| (name.as_str(), value as &dyn ToSql))
        .collect()
}

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::Integer(*i),
        SqlValue::Real(f) => Value::Real(*f),
        SqlValue::Text(s) => Value::Text(s.clone()),
        SqlValue::Blob(b) => Value::Blob(b.clone()),
    }
}

/// TEXT that is not valid UTF-8 comes back as `Blob`, byte for byte
fn from_value_ref(value: ValueRef<'_>) -> SqlValue {
    match value {
        ValueRef::Null => SqlValue::Null,
        ValueRef::Integer(i) => SqlValue::Integer(i),
        ValueRef::Real(f) => SqlValue::Real(f),
        ValueRef::Text(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text.to_string()),
            Err(_) => SqlValue::Blob(bytes.to_vec()),
        },
        ValueRef::Blob(bytes) => SqlValue::Blob(bytes.to_vec()),
    }
}

/// Map a rusqlite error onto the document-layer error kinds
fn map_err(e: rusqlite::Error) -> Error {
    match &e {
        rusqlite::Error::SqliteFailure(failure, message)
            if failure.code == ErrorCode::ConstraintViolation =>
        {
            Error::ConstraintViolation {
                collection: String::new(),
                reason: message.clone().unwrap_or_else(|| failure.to_string()),
            }
        }
        rusqlite::Error::SqliteFailure(failure, message) => Error::Query {
            reason: message.clone().unwrap_or_else(|| failure.to_string()),
        },
        _ => Error::query(&e),
    }
}
