//! Cancellation Tests
//!
//! Tests for cancelled operations:
//! - A cancelled token stops the operation with `Cancelled`
//! - A cancelled schema creation leaves the collection unmarked
//! - Waiters on a cancelled creation take over and finish it

use crate::common::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn pre_cancelled_token_does_nothing() {
    let t = TestStore::new();
    let token = CancellationToken::new();
    token.cancel();
    let cancelled = t.store.with_cancellation(token);

    assert_eq!(
        cancelled.insert("users", &json!({})).await.unwrap_err(),
        Error::Cancelled
    );
    assert_eq!(
        cancelled
            .get_many("users", &Query::new())
            .await
            .unwrap_err(),
        Error::Cancelled
    );
    assert_eq!(t.connector.connects(), 0);
    assert!(!t.is_created("users"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cancel_during_schema_creation_leaves_collection_unmarked() {
    let t = TestStore::with_ddl_delay(Duration::from_millis(200));
    let token = CancellationToken::new();
    let cancelled = t.store.with_cancellation(token.clone());

    let task = tokio::spawn(async move { cancelled.insert("slow", &json!({"a": 1})).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();

    assert_eq!(task.await.unwrap().unwrap_err(), Error::Cancelled);
    assert!(!t.is_created("slow"));

    // The next caller re-runs the (idempotent) DDL and succeeds.
    let id = t.store.insert("slow", &json!({"a": 2})).await.unwrap();
    assert!(t.is_created("slow"));
    let docs = t.store.get_many("slow", &Query::new()).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs.into_valid()[0].id, id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn waiter_takes_over_when_leader_is_dropped() {
    let t = TestStore::with_ddl_delay(Duration::from_millis(200));

    let leader = {
        let store = t.store.clone();
        tokio::spawn(async move { store.ensure_collection("handoff").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    let follower = {
        let store = t.store.clone();
        tokio::spawn(async move { store.insert("handoff", &json!({"x": 1})).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    leader.abort();

    follower.await.unwrap().unwrap();
    assert!(t.is_created("handoff"));
}

#[tokio::test]
async fn cancelling_after_completion_has_no_effect() {
    let t = TestStore::new();
    let token = CancellationToken::new();
    let store = t.store.with_cancellation(token.clone());

    let id = store.insert("users", &json!({"n": 1})).await.unwrap();
    token.cancel();

    assert!(t.store.get_by_id("users", id).await.unwrap().is_some());
    assert!(t.is_created("users"));
}
