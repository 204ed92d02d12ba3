use std::sync::{Arc, RwLock};

use kiva_store::{Store, StoreError};
use serde_json::{Map, Value};

use crate::document::DocumentView;
use crate::encryption;
use crate::error::DbError;
use crate::events::{ChangeEvent, ChangeKind, EventBus, Subscriber};
use crate::hooks::{Hook, HookKind, Hooks};
use crate::index;
use crate::revision;
use crate::schema::{IndexDef, Schema};
use crate::value::Document;

fn to_store_err(e: DbError) -> StoreError {
    StoreError::Serialization(e.to_string())
}

fn metadata_with_rev(rev: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("rev".to_string(), Value::String(rev.to_string()));
    m
}

fn decode_document(bytes: &[u8]) -> Result<Document, DbError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|e| DbError::Validation {
        path: String::new(),
        message: e.to_string(),
    })?;
    Ok(value.as_object().cloned().unwrap_or_default())
}

/// The private, `Arc`-shared state behind a [`Collection`] handle. All
/// document-engine logic lives on `CollectionInner` as associated
/// functions taking `&Arc<Self>`, so [`DocumentView`] can hold only a
/// weak back-reference without extending the collection's lifetime.
pub(crate) struct CollectionInner<S: Store> {
    pub(crate) name: String,
    store: Arc<S>,
    schema: RwLock<Schema>,
    /// Guards schema's index list, the closed flag, and serializes the
    /// critical section of every mutating operation, held through KV
    /// commit and index maintenance (SPEC_FULL.md §5).
    state_lock: RwLock<()>,
    closed: RwLock<bool>,
    hooks: Hooks,
    events: EventBus,
    key: Option<[u8; 32]>,
    hasher: Option<Arc<dyn Fn(&[u8]) -> String + Send + Sync>>,
}

impl<S: Store> CollectionInner<S> {
    pub(crate) fn new(
        name: String,
        store: Arc<S>,
        schema: Schema,
        key: Option<[u8; 32]>,
        hasher: Option<Arc<dyn Fn(&[u8]) -> String + Send + Sync>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            name,
            store,
            schema: RwLock::new(schema),
            state_lock: RwLock::new(()),
            closed: RwLock::new(false),
            hooks: Hooks::default(),
            events: EventBus::new(),
            key,
            hasher,
        })
    }

    fn check_open(&self) -> Result<(), DbError> {
        if *self.closed.read().unwrap() {
            return Err(DbError::Closed);
        }
        Ok(())
    }

    fn encrypt_image(&self, doc: &Document) -> Result<Document, DbError> {
        let mut image = doc.clone();
        if let Some(key) = &self.key {
            let fields = self.schema.read().unwrap().encrypted_fields.clone();
            encryption::encrypt_fields(key, &mut image, &fields)?;
        }
        Ok(image)
    }

    fn decrypt_image(&self, mut image: Document) -> Document {
        if let Some(key) = &self.key {
            let fields = self.schema.read().unwrap().encrypted_fields.clone();
            encryption::decrypt_fields(key, &mut image, &fields);
        }
        image
    }

    fn view(self: &Arc<Self>, id: String, revision: String, data: Document) -> DocumentView<S> {
        DocumentView {
            id,
            revision,
            data,
            collection: Arc::downgrade(self),
        }
    }

    pub(crate) fn insert(this: &Arc<Self>, mut doc: Document) -> Result<DocumentView<S>, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;

        let schema = this.schema.read().unwrap().clone();
        schema.apply_defaults(&mut doc);
        this.hooks
            .run_pre(HookKind::PreInsert, Some(&doc), None)
            .map_err(DbError::Hook)?;
        schema.validate(&doc)?;
        let id = schema.extract_key(&doc)?;
        this.hooks
            .run_pre(HookKind::PreSave, Some(&doc), None)
            .map_err(DbError::Hook)?;

        let revision = revision::next(None, &doc, &schema.rev_field, this.hasher.as_deref())?;
        doc.insert(schema.rev_field.clone(), Value::String(revision.clone()));

        if this.store.get(&this.name, id.as_bytes())?.is_some() {
            return Err(DbError::AlreadyExists { id });
        }

        let image = this.encrypt_image(&doc)?;
        let image_bytes = serde_json::to_vec(&image).map_err(|e| DbError::Validation {
            path: this.name.clone(),
            message: e.to_string(),
        })?;
        let indexes = schema.indexes.clone();
        let doc_for_index = doc.clone();
        let id_for_txn = id.clone();
        let bucket = this.name.clone();
        this.store.with_update(&mut |txn| {
            txn.set(&bucket, id_for_txn.as_bytes(), &image_bytes)?;
            index::add(txn, &bucket, &indexes, &doc_for_index, &id_for_txn).map_err(to_store_err)?;
            Ok(())
        })?;

        this.hooks.run_post(HookKind::PostSave, &this.name, &id, Some(&doc), None);
        this.hooks.run_post(HookKind::PostInsert, &this.name, &id, Some(&doc), None);

        let event = ChangeEvent {
            collection: this.name.clone(),
            id: id.clone(),
            kind: ChangeKind::Insert,
            new: Some(doc.clone()),
            old: None,
            metadata: metadata_with_rev(&revision),
        };
        drop(guard);
        this.events.emit(event);

        Ok(this.view(id, revision, doc))
    }

    pub(crate) fn upsert(this: &Arc<Self>, mut doc: Document) -> Result<DocumentView<S>, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;

        let schema = this.schema.read().unwrap().clone();
        schema.apply_defaults(&mut doc);
        let id = schema.extract_key(&doc)?;

        let existing_bytes = this.store.get(&this.name, id.as_bytes())?;
        let old_doc = match &existing_bytes {
            Some(bytes) => Some(this.decrypt_image(decode_document(bytes)?)),
            None => None,
        };

        this.hooks
            .run_pre(HookKind::PreSave, Some(&doc), old_doc.as_ref())
            .map_err(DbError::Hook)?;
        schema.validate(&doc)?;
        if let Some(old) = &old_doc {
            schema.enforce_final_fields(old, &doc)?;
        }

        let previous_rev = old_doc
            .as_ref()
            .and_then(|d| d.get(&schema.rev_field))
            .and_then(|v| v.as_str());
        let revision = revision::next(previous_rev, &doc, &schema.rev_field, this.hasher.as_deref())?;
        doc.insert(schema.rev_field.clone(), Value::String(revision.clone()));

        let image = this.encrypt_image(&doc)?;
        let image_bytes = serde_json::to_vec(&image).map_err(|e| DbError::Validation {
            path: this.name.clone(),
            message: e.to_string(),
        })?;
        let indexes = schema.indexes.clone();
        let bucket = this.name.clone();
        let doc_for_index = doc.clone();
        let old_for_index = old_doc.clone();
        let id_for_txn = id.clone();
        this.store.with_update(&mut |txn| {
            if let Some(old) = &old_for_index {
                index::remove(txn, &bucket, &indexes, old, &id_for_txn).map_err(to_store_err)?;
            }
            txn.set(&bucket, id_for_txn.as_bytes(), &image_bytes)?;
            index::add(txn, &bucket, &indexes, &doc_for_index, &id_for_txn).map_err(to_store_err)?;
            Ok(())
        })?;

        let kind = if old_doc.is_some() {
            ChangeKind::Update
        } else {
            ChangeKind::Insert
        };
        if matches!(kind, ChangeKind::Insert) {
            this.hooks.run_post(HookKind::PostInsert, &this.name, &id, Some(&doc), old_doc.as_ref());
        }
        this.hooks.run_post(HookKind::PostSave, &this.name, &id, Some(&doc), old_doc.as_ref());

        let event = ChangeEvent {
            collection: this.name.clone(),
            id: id.clone(),
            kind,
            new: Some(doc.clone()),
            old: old_doc,
            metadata: metadata_with_rev(&revision),
        };
        drop(guard);
        this.events.emit(event);

        Ok(this.view(id, revision, doc))
    }

    pub(crate) fn incremental_upsert(this: &Arc<Self>, patch: Document) -> Result<DocumentView<S>, DbError> {
        let schema = this.schema.read().unwrap().clone();
        let id = schema.extract_key(&patch)?;
        let exists = this.store.get(&this.name, id.as_bytes())?.is_some();
        if !exists {
            return Self::upsert(this, patch);
        }
        let key_fields: std::collections::HashSet<String> = schema.primary_key.fields().into_iter().collect();
        let view = Self::find_by_id(this, &id)?;
        view.atomic_update(move |mut current| {
            for (k, v) in patch {
                if !key_fields.contains(&k) {
                    current.insert(k, v);
                }
            }
            current
        })
    }

    pub(crate) fn incremental_modify(
        this: &Arc<Self>,
        id: &str,
        modifier: impl FnOnce(Document) -> Document,
    ) -> Result<DocumentView<S>, DbError> {
        let view = Self::find_by_id(this, id)?;
        view.atomic_update(modifier)
    }

    pub(crate) fn atomic_update(
        this: &Arc<Self>,
        id: &str,
        expected_rev: &str,
        modifier: impl FnOnce(Document) -> Document,
    ) -> Result<DocumentView<S>, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;

        let schema = this.schema.read().unwrap().clone();
        let bytes = this
            .store
            .get(&this.name, id.as_bytes())?
            .ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let current = this.decrypt_image(decode_document(&bytes)?);

        let current_rev = current
            .get(&schema.rev_field)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        if current_rev != expected_rev {
            return Err(DbError::RevisionMismatch { id: id.to_string() });
        }

        let old_doc = current.clone();
        let mut updated = modifier(current);
        for field in schema.primary_key.fields() {
            if let Some(v) = old_doc.get(&field) {
                updated.insert(field, v.clone());
            }
        }

        schema.enforce_final_fields(&old_doc, &updated)?;
        schema.validate(&updated)?;

        let revision = revision::next(Some(&current_rev), &updated, &schema.rev_field, this.hasher.as_deref())?;
        updated.insert(schema.rev_field.clone(), Value::String(revision.clone()));

        let latest_bytes = this
            .store
            .get(&this.name, id.as_bytes())?
            .ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let latest = decode_document(&latest_bytes)?;
        let latest_rev = latest.get(&schema.rev_field).and_then(|v| v.as_str()).unwrap_or("");
        if latest_rev != current_rev {
            return Err(DbError::RevisionMismatch { id: id.to_string() });
        }

        let image = this.encrypt_image(&updated)?;
        let image_bytes = serde_json::to_vec(&image).map_err(|e| DbError::Validation {
            path: this.name.clone(),
            message: e.to_string(),
        })?;
        let indexes = schema.indexes.clone();
        let bucket = this.name.clone();
        let doc_for_index = updated.clone();
        let old_for_index = old_doc.clone();
        let id_owned = id.to_string();
        this.store.with_update(&mut |txn| {
            index::remove(txn, &bucket, &indexes, &old_for_index, &id_owned).map_err(to_store_err)?;
            txn.set(&bucket, id_owned.as_bytes(), &image_bytes)?;
            index::add(txn, &bucket, &indexes, &doc_for_index, &id_owned).map_err(to_store_err)?;
            Ok(())
        })?;

        this.hooks
            .run_post(HookKind::PostSave, &this.name, id, Some(&updated), Some(&old_doc));

        let event = ChangeEvent {
            collection: this.name.clone(),
            id: id.to_string(),
            kind: ChangeKind::Update,
            new: Some(updated.clone()),
            old: Some(old_doc),
            metadata: metadata_with_rev(&revision),
        };
        drop(guard);
        this.events.emit(event);

        Ok(this.view(id.to_string(), revision, updated))
    }

    pub(crate) fn remove(this: &Arc<Self>, id: &str) -> Result<Document, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;

        let schema = this.schema.read().unwrap().clone();
        let bytes = this
            .store
            .get(&this.name, id.as_bytes())?
            .ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let old = this.decrypt_image(decode_document(&bytes)?);

        this.hooks
            .run_pre(HookKind::PreRemove, None, Some(&old))
            .map_err(DbError::Hook)?;

        let indexes = schema.indexes.clone();
        let bucket = this.name.clone();
        let attachments_bucket = format!("{}_attachments", this.name);
        let id_owned = id.to_string();
        let old_for_index = old.clone();
        this.store.with_update(&mut |txn| {
            txn.delete(&bucket, id_owned.as_bytes())?;
            index::remove(txn, &bucket, &indexes, &old_for_index, &id_owned).map_err(to_store_err)?;
            let prefix = format!("{id_owned}_");
            let mut attachment_keys = Vec::new();
            txn.iterate(&attachments_bucket, &mut |k, _| {
                if k.starts_with(prefix.as_bytes()) {
                    attachment_keys.push(k.to_vec());
                }
                Ok(())
            })?;
            for key in attachment_keys {
                txn.delete(&attachments_bucket, &key)?;
            }
            Ok(())
        })?;

        this.hooks.run_post(HookKind::PostRemove, &this.name, id, None, Some(&old));

        let event = ChangeEvent {
            collection: this.name.clone(),
            id: id.to_string(),
            kind: ChangeKind::Delete,
            new: None,
            old: Some(old.clone()),
            metadata: Map::new(),
        };
        drop(guard);
        this.events.emit(event);

        Ok(old)
    }

    pub(crate) fn find_by_id(this: &Arc<Self>, id: &str) -> Result<DocumentView<S>, DbError> {
        let _guard = this.state_lock.read().unwrap();
        this.check_open()?;
        let schema = this.schema.read().unwrap().clone();
        let bytes = this
            .store
            .get(&this.name, id.as_bytes())?
            .ok_or_else(|| DbError::NotFound { id: id.to_string() })?;
        let doc = this.decrypt_image(decode_document(&bytes)?);
        let revision = doc.get(&schema.rev_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
        Ok(this.view(id.to_string(), revision, doc))
    }

    pub(crate) fn all(this: &Arc<Self>) -> Result<Vec<DocumentView<S>>, DbError> {
        let _guard = this.state_lock.read().unwrap();
        this.check_open()?;
        let schema = this.schema.read().unwrap().clone();
        let mut pairs = Vec::new();
        this.store.iterate(&this.name, &mut |k, v| {
            pairs.push((k.to_vec(), v.to_vec()));
            Ok(())
        })?;
        let mut views = Vec::with_capacity(pairs.len());
        for (key_bytes, value_bytes) in pairs {
            let id = String::from_utf8(key_bytes).map_err(|e| DbError::Validation {
                path: this.name.clone(),
                message: e.to_string(),
            })?;
            let doc = this.decrypt_image(decode_document(&value_bytes)?);
            let revision = doc.get(&schema.rev_field).and_then(|v| v.as_str()).unwrap_or("").to_string();
            views.push(this.view(id, revision, doc));
        }
        Ok(views)
    }

    pub(crate) fn count(this: &Arc<Self>) -> Result<usize, DbError> {
        let _guard = this.state_lock.read().unwrap();
        this.check_open()?;
        let mut count = 0usize;
        this.store.iterate(&this.name, &mut |_, _| {
            count += 1;
            Ok(())
        })?;
        Ok(count)
    }

    pub(crate) fn bulk_insert(this: &Arc<Self>, docs: Vec<Document>) -> Result<Vec<DocumentView<S>>, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;
        let schema = this.schema.read().unwrap().clone();
        let bucket = this.name.clone();
        let indexes = schema.indexes.clone();

        let mut prepared = Vec::with_capacity(docs.len());
        for mut doc in docs {
            schema.apply_defaults(&mut doc);
            this.hooks
                .run_pre(HookKind::PreInsert, Some(&doc), None)
                .map_err(DbError::Hook)?;
            schema.validate(&doc)?;
            let id = schema.extract_key(&doc)?;
            this.hooks
                .run_pre(HookKind::PreSave, Some(&doc), None)
                .map_err(DbError::Hook)?;
            let revision = revision::next(None, &doc, &schema.rev_field, this.hasher.as_deref())?;
            doc.insert(schema.rev_field.clone(), Value::String(revision.clone()));
            prepared.push((id, revision, doc));
        }

        for (id, _, _) in &prepared {
            if this.store.get(&bucket, id.as_bytes())?.is_some() {
                return Err(DbError::AlreadyExists { id: id.clone() });
            }
        }

        let mut images = Vec::with_capacity(prepared.len());
        for (_, _, doc) in &prepared {
            images.push(this.encrypt_image(doc)?);
        }

        this.store.with_update(&mut |txn| {
            for ((id, _, doc), image) in prepared.iter().zip(images.iter()) {
                let image_bytes = serde_json::to_vec(image).map_err(|e| StoreError::Serialization(e.to_string()))?;
                txn.set(&bucket, id.as_bytes(), &image_bytes)?;
                index::add(txn, &bucket, &indexes, doc, id).map_err(to_store_err)?;
            }
            Ok(())
        })?;

        for (id, _, doc) in &prepared {
            this.hooks.run_post(HookKind::PostSave, &this.name, id, Some(doc), None);
            this.hooks.run_post(HookKind::PostInsert, &this.name, id, Some(doc), None);
        }

        let events: Vec<ChangeEvent> = prepared
            .iter()
            .map(|(id, revision, doc)| ChangeEvent {
                collection: this.name.clone(),
                id: id.clone(),
                kind: ChangeKind::Insert,
                new: Some(doc.clone()),
                old: None,
                metadata: metadata_with_rev(revision),
            })
            .collect();

        drop(guard);
        for event in events {
            this.events.emit(event);
        }

        Ok(prepared
            .into_iter()
            .map(|(id, revision, doc)| this.view(id, revision, doc))
            .collect())
    }

    pub(crate) fn bulk_upsert(this: &Arc<Self>, docs: Vec<Document>) -> Result<Vec<DocumentView<S>>, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;
        let schema = this.schema.read().unwrap().clone();
        let bucket = this.name.clone();
        let indexes = schema.indexes.clone();

        let mut prepared = Vec::with_capacity(docs.len());
        for mut doc in docs {
            schema.apply_defaults(&mut doc);
            let id = schema.extract_key(&doc)?;
            let existing_bytes = this.store.get(&bucket, id.as_bytes())?;
            let old_doc = match &existing_bytes {
                Some(bytes) => Some(this.decrypt_image(decode_document(bytes)?)),
                None => None,
            };
            this.hooks
                .run_pre(HookKind::PreSave, Some(&doc), old_doc.as_ref())
                .map_err(DbError::Hook)?;
            schema.validate(&doc)?;
            if let Some(old) = &old_doc {
                schema.enforce_final_fields(old, &doc)?;
            }
            let previous_rev = old_doc
                .as_ref()
                .and_then(|d| d.get(&schema.rev_field))
                .and_then(|v| v.as_str());
            let revision = revision::next(previous_rev, &doc, &schema.rev_field, this.hasher.as_deref())?;
            doc.insert(schema.rev_field.clone(), Value::String(revision.clone()));
            let image = this.encrypt_image(&doc)?;
            prepared.push((id, revision, doc, old_doc, image));
        }

        this.store.with_update(&mut |txn| {
            for (id, _, doc, old_doc, image) in &prepared {
                if let Some(old) = old_doc {
                    index::remove(txn, &bucket, &indexes, old, id).map_err(to_store_err)?;
                }
                let image_bytes = serde_json::to_vec(image).map_err(|e| StoreError::Serialization(e.to_string()))?;
                txn.set(&bucket, id.as_bytes(), &image_bytes)?;
                index::add(txn, &bucket, &indexes, doc, id).map_err(to_store_err)?;
            }
            Ok(())
        })?;

        for (id, _, doc, old_doc, _) in &prepared {
            if old_doc.is_none() {
                this.hooks.run_post(HookKind::PostInsert, &this.name, id, Some(doc), old_doc.as_ref());
            }
            this.hooks.run_post(HookKind::PostSave, &this.name, id, Some(doc), old_doc.as_ref());
        }

        let events: Vec<ChangeEvent> = prepared
            .iter()
            .map(|(id, revision, doc, old_doc, _)| ChangeEvent {
                collection: this.name.clone(),
                id: id.clone(),
                kind: if old_doc.is_some() { ChangeKind::Update } else { ChangeKind::Insert },
                new: Some(doc.clone()),
                old: old_doc.clone(),
                metadata: metadata_with_rev(revision),
            })
            .collect();

        drop(guard);
        for event in events {
            this.events.emit(event);
        }

        Ok(prepared
            .into_iter()
            .map(|(id, revision, doc, _, _)| this.view(id, revision, doc))
            .collect())
    }

    pub(crate) fn bulk_remove(this: &Arc<Self>, ids: Vec<String>) -> Result<Vec<Document>, DbError> {
        let guard = this.state_lock.write().unwrap();
        this.check_open()?;
        let schema = this.schema.read().unwrap().clone();
        let bucket = this.name.clone();
        let indexes = schema.indexes.clone();

        let mut olds = Vec::with_capacity(ids.len());
        for id in &ids {
            let bytes = this
                .store
                .get(&bucket, id.as_bytes())?
                .ok_or_else(|| DbError::NotFound { id: id.clone() })?;
            let old = this.decrypt_image(decode_document(&bytes)?);
            this.hooks
                .run_pre(HookKind::PreRemove, None, Some(&old))
                .map_err(DbError::Hook)?;
            olds.push(old);
        }

        this.store.with_update(&mut |txn| {
            for (id, old) in ids.iter().zip(olds.iter()) {
                txn.delete(&bucket, id.as_bytes())?;
                index::remove(txn, &bucket, &indexes, old, id).map_err(to_store_err)?;
            }
            Ok(())
        })?;

        for (id, old) in ids.iter().zip(olds.iter()) {
            this.hooks.run_post(HookKind::PostRemove, &this.name, id, None, Some(old));
        }

        let events: Vec<ChangeEvent> = ids
            .iter()
            .zip(olds.iter())
            .map(|(id, old)| ChangeEvent {
                collection: this.name.clone(),
                id: id.clone(),
                kind: ChangeKind::Delete,
                new: None,
                old: Some(old.clone()),
                metadata: Map::new(),
            })
            .collect();

        drop(guard);
        for event in events {
            this.events.emit(event);
        }

        Ok(olds)
    }

    pub(crate) fn create_index(this: &Arc<Self>, fields: Vec<String>, name: Option<String>) -> Result<(), DbError> {
        let _guard = this.state_lock.write().unwrap();
        this.check_open()?;
        let candidate = match name {
            Some(n) => IndexDef::named(n, fields),
            None => IndexDef::new(fields),
        };
        {
            let schema = this.schema.read().unwrap();
            index::check_no_conflict(&schema.indexes, &candidate)?;
        }
        let bucket = this.name.clone();
        this.store
            .with_update(&mut |txn| index::rebuild(txn, &bucket, &bucket, &candidate).map_err(to_store_err))?;
        this.schema.write().unwrap().indexes.push(candidate);
        Ok(())
    }

    pub(crate) fn drop_index(this: &Arc<Self>, name: &str) -> Result<(), DbError> {
        let _guard = this.state_lock.write().unwrap();
        this.check_open()?;
        let bucket = this.name.clone();
        let name_owned = name.to_string();
        this.store
            .with_update(&mut |txn| index::drop_all(txn, &bucket, &name_owned).map_err(to_store_err))?;
        this.schema.write().unwrap().indexes.retain(|i| i.name != name);
        Ok(())
    }

    pub(crate) fn list_indexes(this: &Arc<Self>) -> Vec<IndexDef> {
        this.schema.read().unwrap().indexes.clone()
    }

    pub(crate) fn close(this: &Arc<Self>) {
        *this.closed.write().unwrap() = true;
        this.events.close();
    }
}

/// A cheap, `Arc`-backed handle to a named container of documents
/// sharing one schema.
pub struct Collection<S: Store> {
    inner: Arc<CollectionInner<S>>,
}

impl<S: Store> Clone for Collection<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: Store> Collection<S> {
    pub(crate) fn from_inner(inner: Arc<CollectionInner<S>>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Arc<CollectionInner<S>> {
        &self.inner
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn schema(&self) -> Schema {
        self.inner.schema.read().unwrap().clone()
    }

    pub fn insert(&self, doc: Document) -> Result<DocumentView<S>, DbError> {
        CollectionInner::insert(&self.inner, doc)
    }

    pub fn upsert(&self, doc: Document) -> Result<DocumentView<S>, DbError> {
        CollectionInner::upsert(&self.inner, doc)
    }

    pub fn incremental_upsert(&self, patch: Document) -> Result<DocumentView<S>, DbError> {
        CollectionInner::incremental_upsert(&self.inner, patch)
    }

    pub fn incremental_modify(
        &self,
        id: &str,
        modifier: impl FnOnce(Document) -> Document,
    ) -> Result<DocumentView<S>, DbError> {
        CollectionInner::incremental_modify(&self.inner, id, modifier)
    }

    pub fn find_by_id(&self, id: &str) -> Result<DocumentView<S>, DbError> {
        CollectionInner::find_by_id(&self.inner, id)
    }

    pub fn remove(&self, id: &str) -> Result<Document, DbError> {
        CollectionInner::remove(&self.inner, id)
    }

    pub fn all(&self) -> Result<Vec<DocumentView<S>>, DbError> {
        CollectionInner::all(&self.inner)
    }

    pub fn count(&self) -> Result<usize, DbError> {
        CollectionInner::count(&self.inner)
    }

    pub fn bulk_insert(&self, docs: Vec<Document>) -> Result<Vec<DocumentView<S>>, DbError> {
        CollectionInner::bulk_insert(&self.inner, docs)
    }

    pub fn bulk_upsert(&self, docs: Vec<Document>) -> Result<Vec<DocumentView<S>>, DbError> {
        CollectionInner::bulk_upsert(&self.inner, docs)
    }

    pub fn bulk_remove(&self, ids: Vec<String>) -> Result<Vec<Document>, DbError> {
        CollectionInner::bulk_remove(&self.inner, ids)
    }

    pub fn create_index(&self, fields: Vec<String>, name: Option<String>) -> Result<(), DbError> {
        CollectionInner::create_index(&self.inner, fields, name)
    }

    pub fn drop_index(&self, name: &str) -> Result<(), DbError> {
        CollectionInner::drop_index(&self.inner, name)
    }

    pub fn list_indexes(&self) -> Vec<IndexDef> {
        CollectionInner::list_indexes(&self.inner)
    }

    pub fn subscribe(&self) -> Subscriber {
        self.inner.events.subscribe()
    }

    pub fn on_pre_insert(&self, hook: Hook) {
        self.inner.hooks.register(HookKind::PreInsert, hook);
    }

    pub fn on_post_insert(&self, hook: Hook) {
        self.inner.hooks.register(HookKind::PostInsert, hook);
    }

    pub fn on_pre_save(&self, hook: Hook) {
        self.inner.hooks.register(HookKind::PreSave, hook);
    }

    pub fn on_post_save(&self, hook: Hook) {
        self.inner.hooks.register(HookKind::PostSave, hook);
    }

    pub fn on_pre_remove(&self, hook: Hook) {
        self.inner.hooks.register(HookKind::PreRemove, hook);
    }

    pub fn on_post_remove(&self, hook: Hook) {
        self.inner.hooks.register(HookKind::PostRemove, hook);
    }

    pub(crate) fn close(&self) {
        CollectionInner::close(&self.inner);
    }

    pub(crate) fn set_aggregator(&self, f: Arc<dyn Fn(ChangeEvent) + Send + Sync>) {
        self.inner.events.set_aggregator(f);
    }
}
