use std::sync::Weak;

use kiva_store::Store;

use crate::collection::CollectionInner;
use crate::error::DbError;
use crate::value::Document;

/// A live handle onto one stored document. Does not extend the owning
/// collection's lifetime — holds only a weak back-reference, per the
/// "cyclic ownership" design note (SPEC_FULL.md §3).
pub struct DocumentView<S: Store> {
    pub(crate) id: String,
    pub(crate) revision: String,
    pub(crate) data: Document,
    pub(crate) collection: Weak<CollectionInner<S>>,
}

impl<S: Store> DocumentView<S> {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn revision(&self) -> &str {
        &self.revision
    }

    pub fn data(&self) -> &Document {
        &self.data
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(self.data.clone())
    }

    /// Deep clone of the current data, for callers who want a mutable
    /// working copy independent of this view.
    pub fn to_mutable_json(&self) -> Document {
        self.data.clone()
    }

    fn collection(&self) -> Result<std::sync::Arc<CollectionInner<S>>, DbError> {
        self.collection.upgrade().ok_or(DbError::Closed)
    }

    /// Re-read, apply `modifier`, and commit with optimistic-concurrency
    /// checking against the revision captured when this view was obtained.
    pub fn atomic_update(
        &self,
        modifier: impl FnOnce(Document) -> Document,
    ) -> Result<DocumentView<S>, DbError> {
        let collection = self.collection()?;
        collection.atomic_update(&self.id, &self.revision, modifier)
    }

    /// Deep-merge `patch` into the current document via `atomic_update`.
    pub fn atomic_patch(&self, patch: Document) -> Result<DocumentView<S>, DbError> {
        self.atomic_update(move |mut current| {
            for (k, v) in patch {
                current.insert(k, v);
            }
            current
        })
    }

    pub fn save(&self) -> Result<DocumentView<S>, DbError> {
        let collection = self.collection()?;
        collection.upsert(self.data.clone())
    }

    pub fn remove(&self) -> Result<Document, DbError> {
        let collection = self.collection()?;
        collection.remove(&self.id)
    }
}
