use kiva_core::{ChangeKind, Database, DatabaseOptions, Schema};
use kiva_store::MemoryStore;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::tempdir;

fn open_db(name: &str, dir: &std::path::Path) -> Database<MemoryStore> {
    let options = DatabaseOptions::new(name).path(dir);
    Database::open(options, |p| Ok(MemoryStore::new(p))).unwrap()
}

#[test]
fn create_index_rebuilds_from_existing_documents() {
    let dir = tempdir().unwrap();
    let db = open_db("create-index-rebuild", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.insert(json!({"id": "w1", "color": "red"}).as_object().unwrap().clone()).unwrap();
    collection.insert(json!({"id": "w2", "color": "red"}).as_object().unwrap().clone()).unwrap();

    collection.create_index(vec!["color".to_string()], None).unwrap();
    let indexes = collection.list_indexes();
    assert_eq!(indexes.len(), 1);
    assert_eq!(indexes[0].fields, vec!["color".to_string()]);
}

#[test]
fn create_index_rejects_duplicate_name_or_fields() {
    let dir = tempdir().unwrap();
    let db = open_db("create-index-duplicate", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.create_index(vec!["color".to_string()], None).unwrap();
    assert!(collection.create_index(vec!["color".to_string()], None).is_err());
}

#[test]
fn drop_index_removes_it_from_the_schema() {
    let dir = tempdir().unwrap();
    let db = open_db("drop-index", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.create_index(vec!["color".to_string()], Some("by_color".to_string())).unwrap();
    collection.drop_index("by_color").unwrap();
    assert!(collection.list_indexes().is_empty());
}

#[test]
fn subscriber_observes_insert_and_update_events() {
    let dir = tempdir().unwrap();
    let db = open_db("subscriber-events", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();
    let rx = collection.subscribe();

    collection.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    collection.upsert(json!({"id": "w1", "extra": true}).as_object().unwrap().clone()).unwrap();

    let first = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
    assert_eq!(first.kind, ChangeKind::Insert);
    let second = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
    assert_eq!(second.kind, ChangeKind::Update);
}

#[test]
fn database_level_subscriber_aggregates_events_across_collections() {
    let dir = tempdir().unwrap();
    let db = open_db("aggregated-events", dir.path());
    let widgets = db.collection("widgets", Schema::default()).unwrap();
    let gadgets = db.collection("gadgets", Schema::default()).unwrap();
    let rx = db.subscribe();

    widgets.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    gadgets.insert(json!({"id": "g1"}).as_object().unwrap().clone()).unwrap();

    let first = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
    let second = rx.recv_timeout(std::time::Duration::from_secs(1)).unwrap();
    let collections: Vec<String> = vec![first.collection, second.collection];
    assert!(collections.contains(&"widgets".to_string()));
    assert!(collections.contains(&"gadgets".to_string()));
}

#[test]
fn pre_insert_hook_can_abort_the_mutation() {
    let dir = tempdir().unwrap();
    let db = open_db("pre-insert-hook", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();

    collection.on_pre_insert(Box::new(|doc, _| {
        let name_missing = doc.and_then(|d| d.get("name")).is_none();
        if name_missing {
            Err("name is required".to_string())
        } else {
            Ok(())
        }
    }));

    let result = collection.insert(json!({"id": "w1"}).as_object().unwrap().clone());
    assert!(matches!(result, Err(kiva_core::DbError::Hook(_))));
}

#[test]
fn post_insert_hook_failure_does_not_undo_the_commit() {
    let dir = tempdir().unwrap();
    let db = open_db("post-insert-hook", dir.path());
    let collection = db.collection("widgets", Schema::default()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let calls_clone = Arc::clone(&calls);

    collection.on_post_insert(Box::new(move |_, _| {
        calls_clone.fetch_add(1, Ordering::SeqCst);
        Err("side effect failed".to_string())
    }));

    collection.insert(json!({"id": "w1"}).as_object().unwrap().clone()).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(collection.find_by_id("w1").is_ok());
}
