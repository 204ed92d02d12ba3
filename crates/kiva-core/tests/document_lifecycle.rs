use kiva_core::{Database, DatabaseOptions, DbError, Schema};
use kiva_store::MemoryStore;
use serde_json::json;
use tempfile::tempdir;

fn open_db(name: &str, dir: &std::path::Path) -> Database<MemoryStore> {
    let options = DatabaseOptions::new(name).path(dir);
    Database::open(options, |p| Ok(MemoryStore::new(p))).unwrap()
}

#[test]
fn insert_then_find_by_id_round_trips() {
    let dir = tempdir().unwrap();
    let db = open_db("round-trip", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    let view = collection.insert(json!({"id": "w1", "name": "Gadget"}).as_object().unwrap().clone()).unwrap();
    assert!(view.revision().starts_with("1-"));

    let found = collection.find_by_id("w1").unwrap();
    assert_eq!(found.data().get("name"), Some(&json!("Gadget")));
}

#[test]
fn duplicate_insert_is_rejected() {
    let dir = tempdir().unwrap();
    let db = open_db("duplicate-insert", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    let result = collection.insert(json!({"id": "w1"}).as_object().unwrap().clone());
    assert!(matches!(result, Err(DbError::AlreadyExists { .. })));
}

#[test]
fn upsert_advances_revision_on_second_write() {
    let dir = tempdir().unwrap();
    let db = open_db("upsert-revision", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    let first = collection.upsert(json!({"id": "w1", "count": 1}).as_object().unwrap().clone()).unwrap();
    assert!(first.revision().starts_with("1-"));

    let second = collection.upsert(json!({"id": "w1", "count": 2}).as_object().unwrap().clone()).unwrap();
    assert!(second.revision().starts_with("2-"));
    assert_eq!(second.data().get("count"), Some(&json!(2)));
}

#[test]
fn atomic_update_detects_concurrent_modification() {
    let dir = tempdir().unwrap();
    let db = open_db("atomic-update-race", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    let view = collection.insert(json!({"id": "w1", "count": 1}).as_object().unwrap().clone()).unwrap();

    // A racing writer advances the document underneath this view.
    collection.upsert(json!({"id": "w1", "count": 99}).as_object().unwrap().clone()).unwrap();

    let result = view.atomic_update(|mut d| {
        let n = d.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
        d.insert("count".to_string(), json!(n + 1));
        d
    });
    assert!(matches!(result, Err(DbError::RevisionMismatch { .. })));
}

#[test]
fn remove_deletes_document_and_is_idempotent_error() {
    let dir = tempdir().unwrap();
    let db = open_db("remove-doc", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    collection.remove("w1").unwrap();
    assert!(matches!(collection.find_by_id("w1"), Err(DbError::NotFound { .. })));
    assert!(matches!(collection.remove("w1"), Err(DbError::NotFound { .. })));
}

#[test]
fn bulk_insert_rejects_whole_batch_on_any_conflict() {
    let dir = tempdir().unwrap();
    let db = open_db("bulk-insert-conflict", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    let docs = vec![
        json!({"id": "w2"}).as_object().unwrap().clone(),
        json!({"id": "w1"}).as_object().unwrap().clone(),
    ];
    let result = collection.bulk_insert(docs);
    assert!(matches!(result, Err(DbError::AlreadyExists { .. })));
    // w2 must not have been written either, since the pre-check runs before any commit.
    assert!(matches!(collection.find_by_id("w2"), Err(DbError::NotFound { .. })));
}

#[test]
fn count_and_all_reflect_current_contents() {
    let dir = tempdir().unwrap();
    let db = open_db("count-and-all", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    collection.insert(json!({"id": "w2"}).as_object().unwrap().clone()).unwrap();
    assert_eq!(collection.count().unwrap(), 2);
    assert_eq!(collection.all().unwrap().len(), 2);

    collection.remove("w1").unwrap();
    assert_eq!(collection.count().unwrap(), 1);
}
