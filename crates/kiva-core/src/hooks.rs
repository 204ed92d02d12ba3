use std::sync::RwLock;

use crate::value::Document;

pub type Hook = Box<dyn Fn(Option<&Document>, Option<&Document>) -> Result<(), String> + Send + Sync>;

#[derive(Default)]
pub struct Hooks {
    pre_insert: RwLock<Vec<Hook>>,
    post_insert: RwLock<Vec<Hook>>,
    pre_save: RwLock<Vec<Hook>>,
    post_save: RwLock<Vec<Hook>>,
    pre_remove: RwLock<Vec<Hook>>,
    post_remove: RwLock<Vec<Hook>>,
}

#[derive(Clone, Copy, Debug)]
pub enum HookKind {
    PreInsert,
    PostInsert,
    PreSave,
    PostSave,
    PreRemove,
    PostRemove,
}

impl Hooks {
    fn slot(&self, kind: HookKind) -> &RwLock<Vec<Hook>> {
        match kind {
            HookKind::PreInsert => &self.pre_insert,
            HookKind::PostInsert => &self.post_insert,
            HookKind::PreSave => &self.pre_save,
            HookKind::PostSave => &self.post_save,
            HookKind::PreRemove => &self.pre_remove,
            HookKind::PostRemove => &self.post_remove,
        }
    }

    /// Registration is safe at any time and takes effect for subsequent calls.
    pub fn register(&self, kind: HookKind, hook: Hook) {
        self.slot(kind).write().unwrap().push(hook);
    }

    /// Run every hook of `kind` in registration order. `pre*` callers
    /// must abort the mutation on the first error; `post*` callers must
    /// only log it (see `run_post`).
    pub fn run_pre(&self, kind: HookKind, new: Option<&Document>, old: Option<&Document>) -> Result<(), String> {
        for hook in self.slot(kind).read().unwrap().iter() {
            hook(new, old)?;
        }
        Ok(())
    }

    /// Run every hook of `kind`, logging (never propagating) failures.
    pub fn run_post(&self, kind: HookKind, collection: &str, id: &str, new: Option<&Document>, old: Option<&Document>) {
        for hook in self.slot(kind).read().unwrap().iter() {
            if let Err(message) = hook(new, old) {
                tracing::warn!(collection, id, error = %message, "post-hook failed, commit stands");
            }
        }
    }
}
