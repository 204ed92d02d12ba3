use kiva_store::Store;
use serde_json::Value;

use crate::error::DbError;
use crate::schema::Schema;
use crate::value::Document;

const META_BUCKET: &str = "_meta";

fn version_key(collection: &str) -> String {
    format!("{collection}_version")
}

fn read_version<S: Store>(store: &S, collection: &str) -> Result<u32, DbError> {
    match store.get(META_BUCKET, version_key(collection).as_bytes())? {
        Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| DbError::Migration {
            version: 0,
            message: e.to_string(),
        }),
        None => Ok(0),
    }
}

fn write_version<S: Store>(store: &S, collection: &str, version: u32) -> Result<(), DbError> {
    let bytes = serde_json::to_vec(&version).map_err(|e| DbError::Migration {
        version,
        message: e.to_string(),
    })?;
    store.set(META_BUCKET, version_key(collection).as_bytes(), &bytes)?;
    Ok(())
}

/// Apply every declared migration strategy between the stored schema
/// version and `schema.version`, in ascending order, then advance the
/// stored version. If any strategy fails, nothing is written and the
/// stored version is unchanged — a later open retries from scratch.
pub fn run<S: Store>(store: &S, collection: &str, schema: &Schema) -> Result<(), DbError> {
    let stored = read_version(store, collection)?;
    if stored >= schema.version {
        return Ok(());
    }

    let mut pairs = Vec::new();
    store.iterate(collection, &mut |k, v| {
        pairs.push((k.to_vec(), v.to_vec()));
        Ok(())
    })?;

    let mut docs: Vec<(Vec<u8>, Document)> = pairs
        .into_iter()
        .map(|(k, v)| {
            let doc = serde_json::from_slice::<Value>(&v)
                .map(|val| val.as_object().cloned().unwrap_or_default())
                .map_err(|e| DbError::Migration {
                    version: stored,
                    message: e.to_string(),
                })?;
            Ok::<_, DbError>((k, doc))
        })
        .collect::<Result<_, _>>()?;

    let mut current = stored;
    while current < schema.version {
        let next_version = current + 1;
        if let Some(strategy) = schema.migrations.get(&next_version) {
            for (_, doc) in docs.iter_mut() {
                let migrated = strategy(doc.clone()).map_err(|message| DbError::Migration {
                    version: next_version,
                    message,
                })?;
                *doc = migrated;
            }
            tracing::info!(collection, version = next_version, "migration strategy applied");
        }
        current = next_version;
    }

    store.with_update(&mut |txn| {
        for (key, doc) in &docs {
            let bytes = serde_json::to_vec(doc).map_err(|e| kiva_store::StoreError::Serialization(e.to_string()))?;
            txn.set(collection, key, &bytes)?;
        }
        Ok(())
    })?;
    write_version(store, collection, schema.version)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::PrimaryKey;
    use kiva_store::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn migration_applies_once_and_advances_version() {
        let store = MemoryStore::new(std::env::temp_dir().join("kiva-core-migration-test"));
        let doc = json!({"id": "a", "legacy_name": "Alice"}).as_object().unwrap().clone();
        let bytes = serde_json::to_vec(&doc).unwrap();
        store.set("widgets", b"a", &bytes).unwrap();

        let mut schema = Schema {
            primary_key: PrimaryKey::Single("id".to_string()),
            version: 1,
            ..Schema::default()
        };
        schema.migrations.insert(
            1,
            Arc::new(|mut d: Document| {
                if let Some(v) = d.remove("legacy_name") {
                    d.insert("name".to_string(), v);
                }
                Ok(d)
            }),
        );

        run(&store, "widgets", &schema).unwrap();

        let stored = store.get("widgets", b"a").unwrap().unwrap();
        let migrated: Value = serde_json::from_slice(&stored).unwrap();
        assert_eq!(migrated.get("name"), Some(&json!("Alice")));
        assert_eq!(migrated.get("legacy_name"), None);

        let version_bytes = store.get("_meta", b"widgets_version").unwrap().unwrap();
        let version: u32 = serde_json::from_slice(&version_bytes).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn second_open_at_same_version_applies_nothing() {
        let store = MemoryStore::new(std::env::temp_dir().join("kiva-core-migration-test-2"));
        let schema = Schema {
            primary_key: PrimaryKey::Single("id".to_string()),
            version: 1,
            ..Schema::default()
        };
        run(&store, "widgets", &schema).unwrap();
        run(&store, "widgets", &schema).unwrap();
        let version_bytes = store.get("_meta", b"widgets_version").unwrap().unwrap();
        let version: u32 = serde_json::from_slice(&version_bytes).unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn failed_strategy_does_not_advance_stored_version() {
        let store = MemoryStore::new(std::env::temp_dir().join("kiva-core-migration-test-3"));
        let doc = json!({"id": "a"}).as_object().unwrap().clone();
        store.set("widgets", b"a", &serde_json::to_vec(&doc).unwrap()).unwrap();

        let mut schema = Schema {
            primary_key: PrimaryKey::Single("id".to_string()),
            version: 1,
            ..Schema::default()
        };
        schema
            .migrations
            .insert(1, Arc::new(|_: Document| Err("boom".to_string())));

        assert!(run(&store, "widgets", &schema).is_err());
        assert!(store.get("_meta", b"widgets_version").unwrap().is_none());
    }
}
