use std::path::Path;

use crate::error::StoreError;

/// Contract consumed by the document engine: a thin handle over an ordered,
/// bucket-partitioned key-value store. "Bucket" is a logical key prefix —
/// composition into the physical key is opaque to callers, but `iterate`
/// MUST visit exactly the keys written under the same bucket name.
///
/// Buckets come into existence on first write; reading or iterating an
/// unwritten bucket behaves as if it were empty rather than erroring, so
/// callers never need an explicit create step before first use.
pub trait Store: Send + Sync {
    type Txn<'a>: Transaction
    where
        Self: 'a;

    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&self, bucket: &str, key: &[u8]) -> Result<(), StoreError>;

    /// Prefix scan over every key bound to `bucket`, in ascending key order.
    fn iterate(
        &self,
        bucket: &str,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    /// Open a batched write transaction. `f` may call `Transaction::get/set/delete`
    /// any number of times; the transaction commits atomically if `f` returns `Ok`,
    /// and rolls back (no partial effect) if `f` returns `Err`.
    fn with_update(
        &self,
        f: &mut dyn FnMut(&mut Self::Txn<'_>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    fn backup(&self, path: &Path) -> Result<(), StoreError>;
    fn path(&self) -> &Path;
    fn close(self) -> Result<(), StoreError>;
}

/// A single batched write transaction, as passed into `Store::with_update`.
pub trait Transaction {
    fn get(&self, bucket: &str, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn set(&mut self, bucket: &str, key: &[u8], value: &[u8]) -> Result<(), StoreError>;
    fn delete(&mut self, bucket: &str, key: &[u8]) -> Result<(), StoreError>;

    fn iterate(
        &self,
        bucket: &str,
        visitor: &mut dyn FnMut(&[u8], &[u8]) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;
}
