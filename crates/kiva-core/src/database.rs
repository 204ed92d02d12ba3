use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock, Weak};
use std::time::Duration;

use fs4::fs_std::FileExt;
use kiva_store::Store;

use crate::collection::{Collection, CollectionInner};
use crate::encryption;
use crate::error::DbError;
use crate::events::{ChangeEvent, EventBus, Subscriber};
use crate::migration;
use crate::schema::Schema;
use crate::value::Document;

pub type HashFn = Arc<dyn Fn(&[u8]) -> String + Send + Sync>;

/// How `Database::open` should resolve a name already registered by a
/// non-closed instance in this process (SPEC_FULL.md §4.9).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    #[default]
    Reject,
    IgnoreDuplicate,
    CloseDuplicates,
    MultiInstance,
}

#[derive(Clone)]
pub struct DatabaseOptions {
    pub name: String,
    pub path: Option<PathBuf>,
    pub password: Option<String>,
    pub duplicate_policy: DuplicatePolicy,
    pub hash_function: Option<HashFn>,
}

impl DatabaseOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            password: None,
            duplicate_policy: DuplicatePolicy::default(),
            hash_function: None,
        }
    }

    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_policy = policy;
        self
    }

    pub fn hash_function(mut self, f: HashFn) -> Self {
        self.hash_function = Some(f);
        self
    }

    fn resolved_path(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| PathBuf::from(format!("./{}.db", self.name)))
    }

    fn multi_instance(&self) -> bool {
        self.duplicate_policy == DuplicatePolicy::MultiInstance
    }
}

type Registry<S> = Mutex<HashMap<String, Weak<DatabaseInner<S>>>>;

/// Process-wide name registry, one instance per concrete `Store`
/// implementation: a `static` declared inside a generic function is
/// monomorphized once per instantiation, so each backend type gets its
/// own registry for free. Enforces "at most one non-closed database per
/// name" (SPEC_FULL.md §4.9).
fn registry<S: Store + 'static>() -> &'static Registry<S> {
    static REGISTRY: OnceLock<Registry<S>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

pub(crate) struct DatabaseInner<S: Store> {
    name: String,
    store: Arc<S>,
    path: PathBuf,
    password: Option<String>,
    hasher: Option<HashFn>,
    collections: RwLock<HashMap<String, Collection<S>>>,
    closed: RwLock<bool>,
    events: EventBus,
    active_ops: AtomicUsize,
    lock_file: Mutex<Option<fs::File>>,
    is_leader: RwLock<bool>,
    multi_instance: bool,
}

/// An active operation guard incrementing/decrementing the database's
/// idle counter for the lifetime of one externally-called mutating or
/// exporting method (SPEC_FULL.md §4.9 `RequestIdle`).
struct OpGuard<'a>(&'a AtomicUsize);

impl<'a> OpGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl<'a> Drop for OpGuard<'a> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A named root owning one KV store handle and a set of collections.
pub struct Database<S: Store> {
    inner: Arc<DatabaseInner<S>>,
}

impl<S: Store> Clone for Database<S> {
    fn clone(&self) -> Self {
        Self { inner: Arc::clone(&self.inner) }
    }
}

impl<S: Store + 'static> Database<S> {
    pub fn open(options: DatabaseOptions, open_store: impl FnOnce(&Path) -> Result<S, DbError>) -> Result<Self, DbError> {
        let path = options.resolved_path();
        let reg = registry::<S>();

        {
            let mut reg = reg.lock().unwrap();
            if let Some(existing) = reg.get(&options.name).and_then(Weak::upgrade) {
                match options.duplicate_policy {
                    DuplicatePolicy::IgnoreDuplicate => {
                        return Ok(Database { inner: existing });
                    }
                    DuplicatePolicy::CloseDuplicates => {
                        Self { inner: existing }.close();
                        reg.remove(&options.name);
                    }
                    DuplicatePolicy::MultiInstance => {}
                    DuplicatePolicy::Reject => {
                        return Err(DbError::AlreadyOpen { name: options.name.clone() });
                    }
                }
            }
        }

        let store = open_store(&path)?;
        let multi_instance = options.multi_instance();
        let inner = Arc::new(DatabaseInner {
            name: options.name.clone(),
            store: Arc::new(store),
            path,
            password: options.password,
            hasher: options.hash_function,
            collections: RwLock::new(HashMap::new()),
            closed: RwLock::new(false),
            events: EventBus::new(),
            active_ops: AtomicUsize::new(0),
            lock_file: Mutex::new(None),
            is_leader: RwLock::new(!multi_instance),
            multi_instance,
        });

        reg.lock().unwrap().insert(options.name.clone(), Arc::downgrade(&inner));
        Ok(Database { inner })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn multi_instance(&self) -> bool {
        self.inner.multi_instance
    }

    /// Return the cached collection if present, otherwise create it,
    /// applying single-field-`id`/`_rev` defaults and running migration
    /// if the schema version has advanced.
    pub fn collection(&self, name: &str, schema: Schema) -> Result<Collection<S>, DbError> {
        let _guard = OpGuard::new(&self.inner.active_ops);
        if *self.inner.closed.read().unwrap() {
            return Err(DbError::Closed);
        }

        {
            let collections = self.inner.collections.read().unwrap();
            if let Some(existing) = collections.get(name) {
                return Ok(existing.clone());
            }
        }

        migration::run(&*self.inner.store, name, &schema)?;

        let key = self.inner.password.as_deref().map(encryption::derive_key);
        let hasher = self.inner.hasher.clone();
        let collection_inner = CollectionInner::new(name.to_string(), Arc::clone(&self.inner.store), schema, key, hasher);
        let collection = Collection::from_inner(collection_inner);

        let aggregator_target = Arc::downgrade(&self.inner);
        collection.set_aggregator(Arc::new(move |event: ChangeEvent| {
            if let Some(db) = aggregator_target.upgrade() {
                db.events.emit(event);
            }
        }));

        self.inner
            .collections
            .write()
            .unwrap()
            .insert(name.to_string(), collection.clone());
        Ok(collection)
    }

    pub fn subscribe(&self) -> Subscriber {
        self.inner.events.subscribe()
    }

    pub fn close(&self) {
        let mut closed = self.inner.closed.write().unwrap();
        if *closed {
            return;
        }
        *closed = true;
        drop(closed);

        self.inner.events.close();
        for collection in self.inner.collections.read().unwrap().values() {
            collection.close();
        }
        *self.inner.lock_file.lock().unwrap() = None;
        registry::<S>().lock().unwrap().remove(&self.inner.name);
    }

    pub fn destroy(&self) -> Result<(), DbError> {
        self.close();
        if self.inner.path.exists() {
            fs::remove_dir_all(&self.inner.path).map_err(|e| DbError::Io(e.into()))?;
        }
        Ok(())
    }

    /// Poll the active-operation counter; return once it reaches zero.
    pub fn request_idle(&self, timeout: Duration) -> bool {
        let start = std::time::Instant::now();
        loop {
            if self.inner.active_ops.load(Ordering::SeqCst) == 0 {
                return true;
            }
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }

    /// Single-instance databases are always leader. Multi-instance
    /// databases acquire a non-blocking exclusive lock on `<path>.lock`,
    /// retrying every 100ms until success or `timeout` elapses.
    pub fn wait_for_leadership(&self, timeout: Duration) -> Result<bool, DbError> {
        if !self.inner.multi_instance {
            return Ok(true);
        }
        let lock_path = self.inner.path.with_extension("lock");
        let start = std::time::Instant::now();
        loop {
            let file = fs::OpenOptions::new()
                .create(true)
                .write(true)
                .open(&lock_path)
                .map_err(|e| DbError::Io(e.into()))?;
            if file.try_lock_exclusive().is_ok() {
                *self.inner.lock_file.lock().unwrap() = Some(file);
                *self.inner.is_leader.write().unwrap() = true;
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            std::thread::sleep(Duration::from_millis(100));
        }
    }

    pub fn is_leader(&self) -> bool {
        *self.inner.is_leader.read().unwrap()
    }

    /// Snapshot every collection's documents outside any single lock.
    pub fn export_json(&self) -> Result<HashMap<String, Vec<Document>>, DbError> {
        let _guard = OpGuard::new(&self.inner.active_ops);
        let names: Vec<(String, Collection<S>)> = self
            .inner
            .collections
            .read()
            .unwrap()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        let mut out = HashMap::new();
        for (name, collection) in names {
            let docs = collection.all()?.into_iter().map(|v| v.to_mutable_json()).collect();
            out.insert(name, docs);
        }
        Ok(out)
    }

    /// Create collections lazily with a default schema and bulk-upsert
    /// the exported documents into each.
    pub fn import_json(&self, data: HashMap<String, Vec<Document>>) -> Result<(), DbError> {
        let _guard = OpGuard::new(&self.inner.active_ops);
        for (name, docs) in data {
            let collection = self.collection(&name, Schema::default())?;
            collection.bulk_upsert(docs)?;
        }
        Ok(())
    }
}

/// Remove a database's on-disk directory without opening it.
pub fn remove_database_dir(path: &Path) -> Result<(), DbError> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| DbError::Io(e.into()))?;
    }
    Ok(())
}
