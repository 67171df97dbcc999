//! Concurrent First Use Tests
//!
//! Tests for the single-flight schema cache under concurrency:
//! - Many tasks hitting a new collection run its DDL once
//! - Every waiter observes the schema before its data statement
//! - Different collections are created independently

use crate::common::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_inserts_share_one_schema_creation() {
    let t = TestStore::with_ddl_delay(Duration::from_millis(50));
    t.store
        .register_index("events", "$.kind", Some("kind"), false)
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..32 {
        let store = t.store.clone();
        handles.push(tokio::spawn(async move {
            store
                .insert("events", &json!({"kind": "tick", "seq": i}))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    // One table batch plus one index batch, from a single session.
    assert_eq!(t.connector.applies(), 2);
    assert_eq!(t.connector.connects(), 32 + 1);

    let docs = t
        .store
        .get_many("events", &Query::new().filter("kind = @k").param("k", "tick"))
        .await
        .unwrap();
    assert_eq!(docs.len(), 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reads_and_writes_on_new_collection() {
    let t = TestStore::with_ddl_delay(Duration::from_millis(20));

    let mut handles = Vec::new();
    for i in 0..16 {
        let store = t.store.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                store.insert("mixed", &json!({ "i": i })).await.map(|_| ())
            } else {
                store.get_many("mixed", &Query::new()).await.map(|_| ())
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(t.connector.applies(), 1);
    let docs = t.store.get_many("mixed", &Query::new()).await.unwrap();
    assert_eq!(docs.len(), 8);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn distinct_collections_created_independently() {
    let t = TestStore::new();
    let names: Vec<String> = (0..6).map(|i| format!("coll_{}", i)).collect();

    let mut handles = Vec::new();
    for name in names.iter().cloned() {
        for _ in 0..4 {
            let store = t.store.clone();
            let name = name.clone();
            handles.push(tokio::spawn(async move {
                store.insert(&name, &json!({"c": name})).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(t.connector.applies(), names.len());
    assert_eq!(t.registry.created_count(), names.len());
    for name in &names {
        assert!(t.is_created(name));
        let docs = t.store.get_many(name, &Query::new()).await.unwrap();
        assert_eq!(docs.len(), 4);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn stores_sharing_a_registry_share_creation() {
    let t = TestStore::with_ddl_delay(Duration::from_millis(30));
    let connector: Arc<dyn Connector> = t.connector.clone();
    let twin =
        DocumentStore::with_registry(connector, "main", Arc::clone(&t.registry)).unwrap();

    let a = {
        let store = t.store.clone();
        tokio::spawn(async move { store.ensure_collection("shared").await })
    };
    let b = tokio::spawn(async move { twin.ensure_collection("SHARED").await });
    a.await.unwrap().unwrap();
    b.await.unwrap().unwrap();

    assert_eq!(t.connector.applies(), 1);
}

// ============================================================================
// Stores with different index sets
// ============================================================================

#[tokio::test]
async fn index_missing_from_earlier_creation_is_added_on_next_use() {
    let t = TestStore::new();
    let connector: Arc<dyn Connector> = t.connector.clone();
    let plain =
        DocumentStore::with_registry(connector, "main", Arc::clone(&t.registry)).unwrap();
    t.store
        .register_index("users", "$.name", None, true)
        .unwrap();

    // A store without indexes creates the table first.
    plain.ensure_collection("users").await.unwrap();
    assert_eq!(t.columns("users"), vec!["_id", "_document"]);

    t.store.insert("users", &json!({"name": "a"})).await.unwrap();
    assert_eq!(t.columns("users"), vec!["_id", "_document", "__name"]);
    let err = t
        .store
        .insert("users", &json!({"name": "a"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation { .. }));

    // The plain store keeps working and now sees the constraint too.
    let err = plain
        .insert("users", &json!({"name": "a"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation { .. }));
}

#[tokio::test]
async fn conflicting_index_on_created_collection_is_rejected() {
    let t = TestStore::new();
    let connector: Arc<dyn Connector> = t.connector.clone();
    let other =
        DocumentStore::with_registry(connector, "main", Arc::clone(&t.registry)).unwrap();
    t.store
        .register_index("users", "$.name", Some("name"), false)
        .unwrap();
    other
        .register_index("users", "$.nick", Some("name"), false)
        .unwrap();

    t.store.ensure_collection("users").await.unwrap();
    let err = other.insert("users", &json!({"nick": "x"})).await.unwrap_err();
    assert!(matches!(err, Error::IndexConflict { .. }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn registration_during_creation_is_rejected() {
    let t = TestStore::with_ddl_delay(Duration::from_millis(200));

    let creating = {
        let store = t.store.clone();
        tokio::spawn(async move { store.ensure_collection("users").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = t
        .store
        .register_index("users", "$.name", None, true)
        .unwrap_err();
    assert!(matches!(err, Error::CollectionInitialized { .. }));

    creating.await.unwrap().unwrap();
    assert!(t.store.indexes("users").unwrap().is_empty());
    assert_eq!(t.columns("users"), vec!["_id", "_document"]);
}
