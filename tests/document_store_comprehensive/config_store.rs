//! Config-Driven Store Tests
//!
//! Tests for stores opened from `docsql.toml`:
//! - Indexes declared in the file are registered on open
//! - Invalid configs fail before any database work
//! - Unreachable targets surface as connection failures

use crate::common::*;
use docsql::CONFIG_FILE_NAME;
use tempfile::TempDir;

fn write_config(dir: &TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, body).unwrap();
    path
}

#[tokio::test]
async fn open_from_file_registers_indexes() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        &dir,
        &format!(
            r#"
target = "{}"
busy_timeout_ms = 2000

[[index]]
collection = "users"
path = "$.email"
column = "email"
unique = true

[[index]]
collection = "users"
path = "$.age"
column = "age"
"#,
            db_path(&dir)
        ),
    );

    let config = StoreConfig::from_file(&path).unwrap();
    let store = DocumentStore::open(&config).unwrap();
    assert_eq!(store.indexes("users").unwrap().len(), 2);

    store
        .insert("users", &json!({"email": "a@x.io", "age": 31}))
        .await
        .unwrap();
    store
        .insert("users", &json!({"email": "b@x.io", "age": 12}))
        .await
        .unwrap();

    let adult = store
        .get_one(
            "users",
            &Query::new().filter("age > @minAge").param("minAge", 30),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(adult.body["email"], json!("a@x.io"));

    let err = store
        .insert("users", &json!({"email": "a@x.io"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation { .. }));
}

#[tokio::test]
async fn open_with_delete_journal() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::from_toml_str(&format!(
        "target = \"{}\"\njournal_mode = \"delete\"\n",
        db_path(&dir)
    ))
    .unwrap();
    let store = DocumentStore::open(&config).unwrap();

    let id = store.insert("logs", &json!({"m": 1})).await.unwrap();
    assert!(store.get_by_id("logs", id).await.unwrap().is_some());
    assert!(!dir.path().join("docs.db-wal").exists());
}

#[test]
fn open_rejects_conflicting_indexes_in_config() {
    let config = StoreConfig::new("unused.db")
        .with_index("users", "$.a", Some("col"), false)
        .with_index("users", "$.b", Some("col"), false);
    assert!(matches!(
        DocumentStore::open(&config),
        Err(Error::IndexConflict { .. })
    ));
}

#[test]
fn open_rejects_invalid_config() {
    let config = StoreConfig {
        schema: "not valid".into(),
        ..StoreConfig::new("unused.db")
    };
    assert!(matches!(
        DocumentStore::open(&config),
        Err(Error::InvalidIdentifier { .. })
    ));
}

#[tokio::test]
async fn unreachable_target_is_connection_failure() {
    let dir = TempDir::new().unwrap();
    let target = dir
        .path()
        .join("missing")
        .join("nested")
        .join("docs.db")
        .to_string_lossy()
        .into_owned();
    let store = DocumentStore::open(&StoreConfig::new(target)).unwrap();

    let err = store.insert("users", &json!({})).await.unwrap_err();
    assert!(err.is_connection_failure(), "got {err:?}");

    // Nothing was cached, so registration is still open.
    assert!(store
        .register_index("users", "$.name", None, false)
        .unwrap());
}

#[tokio::test]
async fn reopening_same_config_after_use() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig::new(db_path(&dir)).with_index("users", "$.email", None, true);

    let first = DocumentStore::open(&config).unwrap();
    first
        .insert("users", &json!({"email": "a@x.io"}))
        .await
        .unwrap();
    drop(first);

    let second = DocumentStore::open(&config).unwrap();
    assert_eq!(second.indexes("users").unwrap().len(), 1);
    second
        .insert("users", &json!({"email": "b@x.io"}))
        .await
        .unwrap();
    let err = second
        .insert("users", &json!({"email": "a@x.io"}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ConstraintViolation { .. }));

    // A changed definition for the used collection is still refused.
    let changed = StoreConfig::new(db_path(&dir)).with_index("users", "$.email", None, false);
    assert!(matches!(
        DocumentStore::open(&changed),
        Err(Error::CollectionInitialized { .. })
    ));
}
