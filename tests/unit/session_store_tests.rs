/*!
 * Tests for session persistence
 */

use anyhow::Result;
use capfetch::session::store::{Record, DEVICE_ID_KEY, DEVICE_TOKEN_KEY};
use capfetch::session::{JsonFileStore, MemoryStore, Session, SessionBackend, SessionStore};
use std::sync::Arc;
use crate::common;

#[test]
fn test_load_withEmptyStore_shouldReturnNone() {
    let store = SessionStore::new(Arc::new(MemoryStore::new()));
    assert_eq!(store.load().unwrap(), None);
}

#[test]
fn test_load_withOnlyDeviceId_shouldReturnNone() {
    let mut record = Record::new();
    record.insert(DEVICE_ID_KEY.to_string(), "dev".to_string());
    let store = SessionStore::new(Arc::new(MemoryStore::with_record(record)));

    assert_eq!(store.load().unwrap(), None);
    assert_eq!(store.device_id().unwrap(), "dev");
}

#[test]
fn test_save_shouldReplaceBothFieldsInOneWrite() {
    let backend = Arc::new(MemoryStore::new());
    let store = SessionStore::new(backend.clone());

    store.save(&Session::new("dev", "tok-1")).unwrap();
    store.save(&Session::new("dev", "tok-2")).unwrap();

    assert_eq!(backend.save_count(), 2);
    assert_eq!(store.load().unwrap(), Some(Session::new("dev", "tok-2")));
}

/// The device id survives across store instances on the same file
#[test]
fn test_deviceId_acrossRuns_shouldBeReused() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("session.json");

    let first_run = SessionStore::open(SessionBackend::Json, Some(path.as_path()))?;
    let id = first_run.device_id().unwrap();

    let second_run = SessionStore::open(SessionBackend::Json, Some(path.as_path()))?;
    assert_eq!(second_run.device_id().unwrap(), id);
    Ok(())
}

#[test]
fn test_sqliteBackend_acrossRuns_shouldKeepSession() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("session.db");

    SessionStore::open(SessionBackend::Sqlite, Some(path.as_path()))?
        .save(&Session::new("dev-9", "tok-9"))
        .unwrap();

    let reopened = SessionStore::open(SessionBackend::Sqlite, Some(path.as_path()))?;
    assert_eq!(reopened.load().unwrap(), Some(Session::new("dev-9", "tok-9")));
    Ok(())
}

#[test]
fn test_jsonFileStore_withCorruptFile_shouldSurfaceStorageError() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(temp_dir.path(), "session.json", "{ broken")?;
    let store = SessionStore::new(Arc::new(JsonFileStore::new(&path)));

    assert!(matches!(store.load(), Err(capfetch::CatalogError::Storage(_))));
    Ok(())
}

#[test]
fn test_jsonFileStore_withForeignKeys_shouldKeepThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = common::create_test_file(
        temp_dir.path(),
        "session.json",
        r#"{ "device_id": "dev", "note": "kept" }"#,
    )?;
    let store = SessionStore::new(Arc::new(JsonFileStore::new(&path)));

    store.save(&Session::new("dev", "tok")).unwrap();

    let content = std::fs::read_to_string(&path)?;
    let json: serde_json::Value = serde_json::from_str(&content)?;
    assert_eq!(json["note"], "kept");
    assert_eq!(json[DEVICE_TOKEN_KEY], "tok");
    Ok(())
}
