//! docsql - Schemaless JSON document collections on a relational database
//!
//! Each collection is a table holding `(_id, _document)` rows. Secondary
//! indexes are virtual columns computed from a JSON path. Tables, columns
//! and indexes are created on first use, once per process, and concurrent
//! first uses share a single creation.
//!
//! # Quick Start
//!
//! ```ignore
//! use docsql::{DocumentStore, Query, StoreConfig};
//! use serde_json::json;
//!
//! let store = DocumentStore::open(&StoreConfig::new("/tmp/docs.db"))?;
//! store.register_index("users", "$.age", Some("age"), false)?;
//!
//! let id = store.insert("users", &json!({"name": "Ava", "age": 31})).await?;
//! let adult = store
//!     .get_one("users", &Query::new().filter("age > @minAge").param("minAge", 30))
//!     .await?;
//! ```
//!
//! # Architecture
//!
//! - `docsql-core`: errors, identifiers, JSON paths, index definitions, values
//! - `docsql-engine`: connectors, DDL generation, the schema registry, config
//! - `docsql-primitives`: the `DocumentStore` facade

pub use docsql_core::*;
pub use docsql_engine::{
    Connector, DdlBatch, DdlGenerator, DdlPlan, IndexConfig, JournalMode, Probe, Row, SchemaKey,
    SchemaRegistry, SchemaState, Session, SqliteConnector, SqliteSession, StoreConfig,
    CONFIG_FILE_NAME, DEFAULT_SCHEMA,
};
pub use docsql_primitives::{DocumentStore, Documents, Query};
