//! Document layer for docsql
//!
//! Provides the caller-facing document API as a thin facade over the engine:
//! - **DocumentStore**: insert and query JSON documents by collection
//! - **Query**: filter, trailing clause and bound parameters of a read
//! - **Documents**: per-row results of a multi-row read
//!
//! ## Design Principle: Stateless Facade
//!
//! A `DocumentStore` holds a connector, a schema name, its index catalog and
//! a handle to the schema registry. It keeps no open connections; every
//! operation ensures the collection schema and then runs one statement on a
//! fresh session.
//!
//! ## Collections
//!
//! Collection names map one-to-one onto tables in the configured schema.
//! Names are validated and compared case-insensitively.
//!
//! ```rust,ignore
//! use docsql_primitives::{DocumentStore, Query};
//!
//! let users = store.get_many("users", &Query::new().suffix("ORDER BY name")).await?;
//! for doc in users {
//!     println!("{}", doc?.id);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod document_store;
pub mod query;

pub use document_store::DocumentStore;
pub use query::{Documents, Query};
