use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;
use imbl::OrdMap;

use crate::error::StoreError;
use crate::store::Store;

use super::transaction::MemoryTransaction;

pub(crate) type Bucket = OrdMap<Vec<u8>, Vec<u8>>;

/// In-memory reference backend. Snapshot-isolated reads via `ArcSwap`, single
/// writer via `write_lock` — matches the concurrency model the engine expects
/// (one `WithUpdate` at a time, readers never block on it).
pub struct MemoryStore {
    buckets: RwLock<HashMap<String, Arc<ArcSwap<Bucket>>>>,
    write_lock: Mutex<()>,
    path: PathBuf,
}

impl MemoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
            path: path.into(),
        }
    }

    fn ensure_bucket(&self, name: &str) -> Arc<ArcSwap<Bucket>> {
        {
            let buckets = self.buckets.read().unwrap();
            if let Some(b) = buckets.get(name) {
                return Arc::clone(b);
            }
        }
        let mut buckets = self.buckets.write().unwrap();
        Arc::clone(
            buckets
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(ArcSwap::new(Arc::new(OrdMap::new())))),
        )
    }

    fn snapshot(&self, name: &str) -> Option<Arc<Bucket>> {
        let buckets = self.buckets.read().unwrap();
        Some(buckets.get(name)?.load_full())
    }

    pub(crate) fn commit(&self, dirty: HashMap<String, Arc<Bucket>>) {
        for (name, data) in dirty {
            self.ensure_bucket(&name).store(data);
        }
    }
}

impl Store for MemoryStore {
    type Txn<'a> = MemoryTransaction<'a>;

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.snapshot(bucket).and_then(|b| b.get(key).cloned()))
    }

    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let handle = self.ensure_bucket(bucket);
        let mut data = (**handle.load()).clone();
        data.insert(key.to_vec(), value.to_vec());
        handle.store(Arc::new(data));
        Ok(())
    }

    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StoreError> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let handle = self.ensure_bucket(bucket);
        let mut data = (**handle.load()).clone();
        data.remove(key);
        handle.store(Arc::new(data));
        Ok(())
    }

    fn iterate(
        &self,
        bucket: &str,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let Some(data) = self.snapshot(bucket) else {
            return Ok(());
        };
        for (k, v) in data.iter() {
            visitor(k, v)?;
        }
        Ok(())
    }

    fn with_update(
        &self,
        f: &mut dyn FnMut(&mut Self::Txn<'_>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError> {
        let guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let mut txn = MemoryTransaction::new(self, guard);
        match f(&mut txn) {
            Ok(()) => txn.commit(),
            Err(e) => {
                txn.rollback();
                Err(e)
            }
        }
    }

    fn backup(&self, path: &Path) -> Result<(), StoreError> {
        // Flat snapshot: one file per bucket, bincode-free and trivially inspectable.
        std::fs::create_dir_all(path)?;
        let buckets = self.buckets.read().unwrap();
        for (name, handle) in buckets.iter() {
            let data = handle.load();
            let mut lines = Vec::new();
            for (k, v) in data.iter() {
                lines.push(format!(
                    "{}\t{}\n",
                    hex_encode(k),
                    hex_encode(v)
                ));
            }
            std::fs::write(path.join(format!("{name}.bucket")), lines.concat())?;
        }
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn close(self) -> Result<(), StoreError> {
        Ok(())
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}
