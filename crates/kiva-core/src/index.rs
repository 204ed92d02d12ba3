use kiva_store::Transaction;
use serde_json::Value;

use crate::error::DbError;
use crate::schema::IndexDef;
use crate::value::{composite_key, Document};

pub fn index_bucket(collection: &str, index_name: &str) -> String {
    format!("{collection}_idx_{index_name}")
}

fn read_id_list(txn: &dyn Transaction, bucket: &str, key: &str) -> Result<Vec<String>, DbError> {
    match txn.get(bucket, key.as_bytes())? {
        Some(bytes) => {
            let ids: Vec<String> = serde_json::from_slice(&bytes).map_err(|e| DbError::Validation {
                path: bucket.to_string(),
                message: e.to_string(),
            })?;
            Ok(ids)
        }
        None => Ok(Vec::new()),
    }
}

fn write_id_list(txn: &mut dyn Transaction, bucket: &str, key: &str, ids: &[String]) -> Result<(), DbError> {
    if ids.is_empty() {
        txn.delete(bucket, key.as_bytes())?;
    } else {
        let bytes = serde_json::to_vec(ids).expect("string vecs always serialize");
        txn.set(bucket, key.as_bytes(), &bytes)?;
    }
    Ok(())
}

/// Add `id`'s entry into every index, keyed by its projection of `doc`.
pub fn add(
    txn: &mut dyn Transaction,
    collection: &str,
    indexes: &[IndexDef],
    doc: &Document,
    id: &str,
) -> Result<(), DbError> {
    for idx in indexes {
        let bucket = index_bucket(collection, &idx.name);
        let key = composite_key(doc, &idx.fields);
        let mut ids = read_id_list(txn, &bucket, &key)?;
        if !ids.iter().any(|existing| existing == id) {
            ids.push(id.to_string());
        }
        write_id_list(txn, &bucket, &key, &ids)?;
    }
    Ok(())
}

/// Remove `id`'s entry from every index, keyed by its projection of the
/// document's before-image.
pub fn remove(
    txn: &mut dyn Transaction,
    collection: &str,
    indexes: &[IndexDef],
    doc: &Document,
    id: &str,
) -> Result<(), DbError> {
    for idx in indexes {
        let bucket = index_bucket(collection, &idx.name);
        let key = composite_key(doc, &idx.fields);
        let mut ids = read_id_list(txn, &bucket, &key)?;
        ids.retain(|existing| existing != id);
        write_id_list(txn, &bucket, &key, &ids)?;
    }
    Ok(())
}

/// Reject a CreateIndex whose name or exact field list already exists.
pub fn check_no_conflict(existing: &[IndexDef], candidate: &IndexDef) -> Result<(), DbError> {
    for idx in existing {
        if idx.name == candidate.name || idx.fields == candidate.fields {
            return Err(DbError::AlreadyExists {
                id: candidate.name.clone(),
            });
        }
    }
    Ok(())
}

/// Populate an index bucket from every document currently in `doc_bucket`.
pub fn rebuild(
    txn: &mut dyn Transaction,
    collection: &str,
    doc_bucket: &str,
    index: &IndexDef,
) -> Result<(), DbError> {
    let mut pairs = Vec::new();
    txn.iterate(doc_bucket, &mut |k, v| {
        pairs.push((k.to_vec(), v.to_vec()));
        Ok(())
    })?;
    for (key_bytes, value_bytes) in pairs {
        let id = String::from_utf8(key_bytes).map_err(|e| DbError::Validation {
            path: doc_bucket.to_string(),
            message: e.to_string(),
        })?;
        let doc: Document = serde_json::from_slice::<Value>(&value_bytes)
            .map_err(|e| DbError::Validation {
                path: doc_bucket.to_string(),
                message: e.to_string(),
            })?
            .as_object()
            .cloned()
            .unwrap_or_default();
        add(txn, collection, std::slice::from_ref(index), &doc, &id)?;
    }
    Ok(())
}

/// Delete every entry under an index's bucket.
pub fn drop_all(txn: &mut dyn Transaction, collection: &str, index_name: &str) -> Result<(), DbError> {
    let bucket = index_bucket(collection, index_name);
    let mut keys = Vec::new();
    txn.iterate(&bucket, &mut |k, _| {
        keys.push(k.to_vec());
        Ok(())
    })?;
    for key in keys {
        txn.delete(&bucket, &key)?;
    }
    Ok(())
}
