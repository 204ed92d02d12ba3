use std::collections::{HashMap, HashSet};
use std::sync::{Arc, MutexGuard};

use crate::error::StoreError;
use crate::store::Transaction;

use super::store::{Bucket, MemoryStore};

/// A batched write transaction over the in-memory store. Holds the store's
/// single write lock for its whole lifetime — one writer at a time, matching
/// the single-writer-per-path discipline the engine relies on.
pub struct MemoryTransaction<'a> {
    store: &'a MemoryStore,
    snapshot: HashMap<String, Arc<Bucket>>,
    dirty: HashSet<String>,
    _write_guard: MutexGuard<'a, ()>,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(store: &'a MemoryStore, guard: MutexGuard<'a, ()>) -> Self {
        Self {
            store,
            snapshot: HashMap::new(),
            dirty: HashSet::new(),
            _write_guard: guard,
        }
    }

    pub(crate) fn commit(self) -> Result<(), StoreError> {
        let dirty: HashMap<String, Arc<Bucket>> = self
            .snapshot
            .into_iter()
            .filter(|(name, _)| self.dirty.contains(name))
            .collect();
        self.store.commit(dirty);
        Ok(())
    }

    pub(crate) fn rollback(self) {
        // Nothing written back — the store's buckets are untouched.
    }
}

impl<'a> Transaction for MemoryTransaction<'a> {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        if let Some(data) = self.snapshot.get(bucket) {
            return Ok(data.get(key).cloned());
        }
        Ok(self
            .store
            .snapshot(bucket)
            .and_then(|d| d.get(key).cloned()))
    }

    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        self.dirty.insert(bucket.to_string());
        let data = Arc::make_mut(
            self.snapshot
                .entry(bucket.to_string())
                .or_insert_with(|| self.store.snapshot(bucket).unwrap_or_default()),
        );
        data.insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        self.dirty.insert(bucket.to_string());
        let data = Arc::make_mut(
            self.snapshot
                .entry(bucket.to_string())
                .or_insert_with(|| self.store.snapshot(bucket).unwrap_or_default()),
        );
        data.remove(key);
        Ok(())
    }

    fn iterate(
        &self,
        bucket: &str,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let borrowed;
        let data: &Bucket = if let Some(d) = self.snapshot.get(bucket) {
            d
        } else {
            borrowed = self.store.snapshot(bucket).unwrap_or_default();
            &borrowed
        };
        for (k, v) in data.iter() {
            visitor(k, v)?;
        }
        Ok(())
    }
}
