use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::Value;

use crate::catalog::DocPath;

/// The cloud document store as the sync engine sees it: whole-document
/// get/set/delete plus an atomic multi-document commit. Every method is a
/// suspension point; implementations reject on transport or auth failure.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_doc(&self, path: &DocPath) -> Result<Option<Value>>;

    /// Replaces the whole document at `path`.
    async fn set_doc(&self, path: &DocPath, doc: Value) -> Result<()>;

    /// Deleting an absent document is not an error.
    async fn delete_doc(&self, path: &DocPath) -> Result<()>;

    /// Writes every document or none: a failure must leave the store
    /// untouched.
    async fn commit_batch(&self, writes: Vec<(DocPath, Value)>) -> Result<()>;
}

/// In-process document store. Used by tests and by offline tooling that
/// wants sync semantics without a server.
#[derive(Default)]
pub struct MemoryRemoteStore {
    docs: Mutex<BTreeMap<String, Value>>,
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn doc_count(&self) -> usize {
        self.lock().len()
    }

    /// Direct read for assertions, bypassing the async trait.
    #[must_use]
    pub fn peek(&self, path: &DocPath) -> Option<Value> {
        self.lock().get(&path.path()).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.docs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get_doc(&self, path: &DocPath) -> Result<Option<Value>> {
        Ok(self.lock().get(&path.path()).cloned())
    }

    async fn set_doc(&self, path: &DocPath, doc: Value) -> Result<()> {
        if !doc.is_object() {
            bail!("document at {path} must be a JSON object");
        }
        self.lock().insert(path.path(), doc);
        Ok(())
    }

    async fn delete_doc(&self, path: &DocPath) -> Result<()> {
        self.lock().remove(&path.path());
        Ok(())
    }

    async fn commit_batch(&self, writes: Vec<(DocPath, Value)>) -> Result<()> {
        // Validate everything before touching the map so a bad write cannot
        // leave a partial batch behind.
        for (path, doc) in &writes {
            if !doc.is_object() {
                bail!("document at {path} must be a JSON object");
            }
        }
        let mut docs = self.lock();
        for (path, doc) in writes {
            docs.insert(path.path(), doc);
        }
        Ok(())
    }
}
