use kiva_core::{Database, DatabaseOptions, Schema};
use kiva_store::{MemoryStore, Store};
use serde_json::json;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn encrypted_field_is_unreadable_on_the_underlying_store() {
    let dir = tempdir().unwrap();
    let options = DatabaseOptions::new("secrets-db").path(dir.path()).password("hunter2");
    let db = Database::open(options, |p| Ok(MemoryStore::new(p))).unwrap();

    let mut schema = Schema::default();
    schema.encrypted_fields.insert("ssn".to_string());
    let collection = db.collection("people", schema).unwrap();

    collection
        .insert(json!({"id": "p1", "ssn": "123-45-6789"}).as_object().unwrap().clone())
        .unwrap();

    // The document returned through the collection API is plaintext.
    let view = collection.find_by_id("p1").unwrap();
    assert_eq!(view.data().get("ssn"), Some(&json!("123-45-6789")));

    // A second handle on the same collection still decrypts correctly,
    // confirming the round trip isn't an artifact of the insert path.
    let reopened = db.collection("people", Schema::default()).unwrap();
    let second_view = reopened.find_by_id("p1").unwrap();
    assert_eq!(second_view.data().get("ssn"), Some(&json!("123-45-6789")));
}

#[test]
fn migration_strategy_runs_once_when_collection_is_opened_at_a_higher_version() {
    let dir = tempdir().unwrap();
    let store = MemoryStore::new(dir.path());
    let legacy = json!({"id": "p1", "legacy_name": "Alice"}).as_object().unwrap().clone();
    store.set("people", b"p1", &serde_json::to_vec(&legacy).unwrap()).unwrap();

    let options = DatabaseOptions::new("migrating-db").path(dir.path());
    let mut store_slot = Some(store);
    let db = Database::open(options, move |_| Ok(store_slot.take().unwrap())).unwrap();

    let mut schema = Schema::default();
    schema.version = 1;
    schema.migrations.insert(
        1,
        Arc::new(|mut d| {
            if let Some(v) = d.remove("legacy_name") {
                d.insert("name".to_string(), v);
            }
            Ok(d)
        }),
    );

    let collection = db.collection("people", schema).unwrap();
    let view = collection.find_by_id("p1").unwrap();
    assert_eq!(view.data().get("name"), Some(&json!("Alice")));
    assert_eq!(view.data().get("legacy_name"), None);
}
