//! Document Store Integration Tests
//!
//! End-to-end tests through the public `docsql` API against SQLite files:
//! schema creation on first use, concurrent first use, reads and writes,
//! configuration and cancellation.

#[path = "../common/mod.rs"]
mod common;

mod cancellation;
mod concurrent_first_use;
mod config_store;
