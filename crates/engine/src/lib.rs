//! Schema-on-demand engine for docsql
//!
//! This crate owns everything between a document operation and the database:
//! - `backend`: the `Connector` / `Session` capability traits
//! - `sqlite`: the rusqlite implementation of those traits
//! - `ddl`: table and computed-index DDL generation
//! - `registry`: the process-wide, single-flight schema cache
//! - `config`: `docsql.toml` loading

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod ddl;
pub mod registry;
pub mod sqlite;

pub use backend::{Connector, Row, Session};
pub use config::{IndexConfig, JournalMode, StoreConfig, CONFIG_FILE_NAME, DEFAULT_SCHEMA};
pub use ddl::{DdlBatch, DdlGenerator, DdlPlan, Probe};
pub use registry::{SchemaKey, SchemaRegistry, SchemaState};
pub use sqlite::{SqliteConnector, SqliteSession};
