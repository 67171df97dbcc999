//! Process-wide schema registry
//!
//! Remembers which collection tables exist and which index definitions have
//! been applied to them, keyed by `(connection target, schema, collection)`,
//! and makes sure the DDL for a key runs once even when many tasks touch a
//! new collection at the same time.
//!
//! ## Single flight per key
//!
//! ```text
//! ensure_created(key, indexes)
//!     │
//!     ├── Created(applied) ── indexes ⊆ applied ───► Ok(()) (no I/O)
//!     │        └─ some missing ── become leader for the missing ones
//!     │
//!     ├── Pending(rx) ── wait on rx ──► Err: that flight's error
//!     │                     ├─ Ok  ──► check again
//!     │                     └─ leader gone ──► check again
//!     │
//!     └── vacant ── insert Pending, become leader
//!                     │
//!                     ├─ run DDL (spawn_blocking, own session)
//!                     ├─ Ok  → Created(applied + new), publish Ok
//!                     └─ Err → previous state,  publish Err
//! ```
//!
//! Only the leader talks to the database. Keys never block each other: the
//! map lock is held just long to read or swap a slot, never across an
//! `.await`.
//!
//! ## Invariant: cache lags the database
//!
//! A definition is recorded as applied only after its DDL committed. A
//! failed or abandoned flight puts the key back where it was, so the next
//! call starts over; the probes in every batch make the re-run safe.

use crate::backend::Connector;
use crate::ddl::{DdlGenerator, DdlPlan};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use docsql_core::{Error, Identifier, IndexCatalog, IndexDefinition, Result};
use once_cell::sync::Lazy;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Registry shared by every store in the process
static GLOBAL_REGISTRY: Lazy<Arc<SchemaRegistry>> = Lazy::new(|| Arc::new(SchemaRegistry::new()));

/// Cache key for one collection table
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaKey {
    target: String,
    schema: String,
    collection: String,
}

impl SchemaKey {
    /// Key for `collection` in `schema` behind `target`
    pub fn new(target: &str, schema: &Identifier, collection: &Identifier) -> Self {
        Self {
            target: target.to_string(),
            schema: schema.key(),
            collection: collection.key(),
        }
    }
}

impl fmt::Display for SchemaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}::{}", self.target, self.schema, self.collection)
    }
}

/// What the registry knows about one key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaState {
    /// Not ensured in this process
    Unknown,
    /// A creation flight is running
    Creating,
    /// Table exists; these definitions have been applied
    Created(Vec<IndexDefinition>),
}

type Outcome = Option<Result<()>>;

enum Slot {
    Created(Vec<IndexDefinition>),
    Pending(watch::Receiver<Outcome>),
}

enum Role {
    Leader {
        tx: watch::Sender<Outcome>,
        previous: Option<Vec<IndexDefinition>>,
        missing: Vec<IndexDefinition>,
    },
    Follower(watch::Receiver<Outcome>),
}

/// Counts from one DDL flight
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct DdlReport {
    applied: usize,
    skipped: usize,
}

/// Tracks created collection tables and coordinates their creation
pub struct SchemaRegistry {
    entries: DashMap<SchemaKey, Slot>,
}

impl SchemaRegistry {
    /// Create an empty registry
    ///
    /// Stores normally share [`SchemaRegistry::global`]; a private registry is
    /// useful when callers want their own cache lifetime.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// The process-wide registry
    pub fn global() -> Arc<SchemaRegistry> {
        Arc::clone(&GLOBAL_REGISTRY)
    }

    /// Whether `key` is recorded as created
    pub fn is_created(&self, key: &SchemaKey) -> bool {
        matches!(self.entries.get(key).as_deref(), Some(Slot::Created(_)))
    }

    /// Current state of `key`
    pub fn state(&self, key: &SchemaKey) -> SchemaState {
        match self.entries.get(key).as_deref() {
            None => SchemaState::Unknown,
            Some(Slot::Pending(_)) => SchemaState::Creating,
            Some(Slot::Created(applied)) => SchemaState::Created(applied.clone()),
        }
    }

    /// Number of keys recorded as created
    pub fn created_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| matches!(entry.value(), Slot::Created(_)))
            .count()
    }

    /// Make sure the table for `collection` and every definition in
    /// `indexes` exist
    ///
    /// Returns without touching the database when the key is created and
    /// all of `indexes` were applied before. Otherwise exactly one caller per
    /// key runs DDL at a time, for the definitions not yet applied, and every
    /// caller that joined a failed flight receives its error.
    ///
    /// # Errors
    ///
    /// - `IndexConflict` when a definition reuses an applied column with a
    ///   different path or uniqueness (before any DDL)
    /// - `InvalidIdentifier` when a derived name is unusable (before any DDL)
    /// - `ConnectionFailure` when no session can be opened
    /// - `SchemaCreationFailure` when a DDL statement fails
    ///
    /// In every error case the key keeps its previous state.
    pub async fn ensure_created(
        &self,
        connector: &Arc<dyn Connector>,
        schema: &Identifier,
        collection: &Identifier,
        indexes: &[IndexDefinition],
    ) -> Result<()> {
        let key = SchemaKey::new(connector.target(), schema, collection);

        loop {
            let role = match self.claim(&key, indexes)? {
                Some(role) => role,
                None => return Ok(()),
            };

            match role {
                Role::Leader {
                    tx,
                    previous,
                    missing,
                } => {
                    let flight = Flight {
                        entries: &self.entries,
                        key: key.clone(),
                        tx: Some(tx),
                        previous,
                    };
                    let outcome = self
                        .create(Arc::clone(connector), schema, collection, &missing, &key)
                        .await;
                    flight.settle(outcome.clone(), missing);
                    return outcome;
                }
                Role::Follower(mut rx) => {
                    debug!(key = %key, "Joining in-flight schema creation");
                    let settled = match rx.wait_for(Option::is_some).await {
                        Ok(outcome) => outcome.clone(),
                        Err(_) => None,
                    };
                    match settled {
                        Some(Err(e)) => return Err(e),
                        // Succeeded, possibly for other definitions, or the
                        // leader abandoned the flight; look again.
                        Some(Ok(())) | None => continue,
                    }
                }
            }
        }
    }

    /// Decide this caller's role for `key`; `None` when nothing is missing
    fn claim(&self, key: &SchemaKey, indexes: &[IndexDefinition]) -> Result<Option<Role>> {
        match self.entries.entry(key.clone()) {
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::Pending(rx));
                Ok(Some(Role::Leader {
                    tx,
                    previous: None,
                    missing: indexes.to_vec(),
                }))
            }
            Entry::Occupied(mut entry) => {
                let missing = match entry.get() {
                    Slot::Pending(rx) => return Ok(Some(Role::Follower(rx.clone()))),
                    Slot::Created(applied) => unapplied(applied, indexes)?,
                };
                if missing.is_empty() {
                    return Ok(None);
                }
                let (tx, rx) = watch::channel(None);
                let previous = match entry.insert(Slot::Pending(rx)) {
                    Slot::Created(applied) => applied,
                    Slot::Pending(_) => Vec::new(),
                };
                Ok(Some(Role::Leader {
                    tx,
                    previous: Some(previous),
                    missing,
                }))
            }
        }
    }

    async fn create(
        &self,
        connector: Arc<dyn Connector>,
        schema: &Identifier,
        collection: &Identifier,
        indexes: &[IndexDefinition],
        key: &SchemaKey,
    ) -> Result<()> {
        debug!(key = %key, indexes = indexes.len(), "Schema cache miss");
        let plan = DdlGenerator::new(schema, collection).plan(indexes)?;
        let name = collection.to_string();

        let report = tokio::task::spawn_blocking(move || run_plan(connector.as_ref(), &name, &plan))
            .await
            .map_err(|e| Error::Internal(format!("schema creation task failed: {}", e)))?;

        match report {
            Ok(report) => {
                info!(
                    key = %key,
                    batches_applied = report.applied,
                    batches_skipped = report.skipped,
                    "Collection schema ensured"
                );
                Ok(())
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Collection schema creation failed");
                Err(e)
            }
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Definitions of `requested` not already in `applied`
///
/// # Errors
///
/// `IndexConflict` when a requested column is applied with another shape.
fn unapplied(
    applied: &[IndexDefinition],
    requested: &[IndexDefinition],
) -> Result<Vec<IndexDefinition>> {
    if requested.iter().all(|d| applied.contains(d)) {
        return Ok(Vec::new());
    }
    let mut catalog = IndexCatalog::new();
    for definition in applied {
        catalog.register(definition.clone())?;
    }
    let mut missing = Vec::new();
    for definition in requested {
        if catalog.register(definition.clone())? {
            missing.push(definition.clone());
        }
    }
    Ok(missing)
}

/// Apply every batch of `plan` on one fresh session
fn run_plan(connector: &dyn Connector, collection: &str, plan: &DdlPlan) -> Result<DdlReport> {
    let mut session = connector.connect()?;
    let mut report = DdlReport::default();

    for batch in &plan.batches {
        let applied = session.apply(batch).map_err(|e| match e {
            Error::ConnectionFailure { .. } => e,
            Error::Query { reason } | Error::ConstraintViolation { reason, .. } => {
                Error::SchemaCreationFailure {
                    collection: collection.to_string(),
                    reason,
                }
            }
            other => Error::SchemaCreationFailure {
                collection: collection.to_string(),
                reason: other.to_string(),
            },
        })?;
        if applied {
            report.applied += 1;
        } else {
            report.skipped += 1;
        }
    }
    Ok(report)
}

/// Leadership of one in-flight key
///
/// Dropped without [`Flight::settle`] (the leader's future was cancelled),
/// it puts back the slot it replaced and closes the channel so followers
/// look again.
struct Flight<'a> {
    entries: &'a DashMap<SchemaKey, Slot>,
    key: SchemaKey,
    tx: Option<watch::Sender<Outcome>>,
    previous: Option<Vec<IndexDefinition>>,
}

impl Flight<'_> {
    fn settle(mut self, outcome: Result<()>, missing: Vec<IndexDefinition>) {
        if outcome.is_ok() {
            let mut applied = self.previous.take().unwrap_or_default();
            applied.extend(missing);
            self.entries.insert(self.key.clone(), Slot::Created(applied));
        } else {
            self.restore();
        }
        if let Some(tx) = self.tx.take() {
            tx.send_replace(Some(outcome));
        }
    }

    fn restore(&mut self) {
        match self.previous.take() {
            Some(applied) => {
                self.entries.insert(self.key.clone(), Slot::Created(applied));
            }
            None => {
                self.entries
                    .remove_if(&self.key, |_, slot| matches!(slot, Slot::Pending(_)));
            }
        }
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            debug!(key = %self.key, "Schema creation abandoned");
            self.restore();
        }
    }
}
