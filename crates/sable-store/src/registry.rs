//! Id-keyed registries of persisted values.
//!
//! A [`Registry`] keeps one `tokio::sync::Mutex` per value, so operations on
//! the same id are serialized while different ids proceed independently. The
//! outer map lock is a `std::sync::RwLock` held only for lookups, never
//! across an await.
//!
//! Mutation is copy-on-write: clone the locked value, change the clone,
//! persist it, and only then replace the locked value (see
//! [`Registry::commit`]). A failed operation therefore leaves both the cache
//! and the backend untouched, and readers never see a half-applied change.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use tokio::sync::Mutex;
use tracing::warn;

use crate::error::{Result, StoreError};
use crate::traits::{PutResult, Persisted, Store, StoreExt};

/// Handle to one registry entry.
pub type Entry<V> = Arc<Mutex<V>>;

/// A write-through cache of values of one kind.
pub struct Registry<V: Persisted, S: Store> {
    store: Arc<S>,
    entries: RwLock<HashMap<String, Entry<V>>>,
}

impl<V: Persisted, S: Store> Registry<V, S> {
    /// Create an empty registry backed by `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn cached(&self, id: &str) -> Result<Option<Entry<V>>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        Ok(entries.get(id).cloned())
    }

    fn cache(&self, id: String, value: V) -> Result<Entry<V>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        // Another task may have loaded the same id meanwhile; keep theirs.
        Ok(entries
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(value)))
            .clone())
    }

    /// Persist a new value and register it.
    pub async fn insert(&self, value: V) -> Result<Entry<V>> {
        self.persist(&value).await?;
        self.cache(value.record_id(), value)
    }

    /// Look up the entry for `id`, loading it from the store if needed.
    pub async fn entry(&self, id: &str) -> Result<Option<Entry<V>>> {
        if let Some(entry) = self.cached(id)? {
            return Ok(Some(entry));
        }

        match self.store.get_value::<V>(id).await? {
            Some(value) => Ok(Some(self.cache(id.to_string(), value)?)),
            None => Ok(None),
        }
    }

    /// A snapshot of the current value of `id`.
    pub async fn get(&self, id: &str) -> Result<Option<V>> {
        match self.entry(id).await? {
            Some(entry) => Ok(Some(entry.lock().await.clone())),
            None => Ok(None),
        }
    }

    /// Write `value` to the store, rejecting stale revisions.
    pub async fn persist(&self, value: &V) -> Result<()> {
        match self.store.put_value(value).await? {
            PutResult::Inserted | PutResult::Updated | PutResult::Unchanged => Ok(()),
            PutResult::Stale { current } => {
                warn!(
                    kind = %V::KIND,
                    id = %value.record_id(),
                    current,
                    attempted = value.revision(),
                    "stale registry write rejected"
                );
                Err(StoreError::Stale {
                    kind: V::KIND.to_string(),
                    id: value.record_id(),
                    current,
                    attempted: value.revision(),
                })
            }
        }
    }

    /// Persist `next` and, once durable, make it the locked value.
    pub async fn commit(&self, slot: &mut V, next: V) -> Result<()> {
        self.persist(&next).await?;
        *slot = next;
        Ok(())
    }

    /// Every id known to the cache or the store, sorted.
    pub async fn ids(&self) -> Result<Vec<String>> {
        let mut ids: BTreeSet<String> = self.store.list_records(V::KIND).await?.into_iter().collect();
        {
            let entries = self
                .entries
                .read()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            ids.extend(entries.keys().cloned());
        }
        Ok(ids.into_iter().collect())
    }

    /// Remove `id` from the cache and the store.
    pub async fn remove(&self, id: &str) -> Result<bool> {
        let was_cached = {
            let mut entries = self
                .entries
                .write()
                .map_err(|e| StoreError::Poisoned(e.to_string()))?;
            entries.remove(id).is_some()
        };
        let was_stored = self.store.delete_record(V::KIND, id).await?;
        Ok(was_cached || was_stored)
    }

    /// Drop every cached entry. Values are reloaded from the store on demand.
    pub fn clear_cache(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::traits::RecordKind;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Counter {
        id: String,
        value: u32,
        revision: u64,
    }

    impl Persisted for Counter {
        const KIND: RecordKind = RecordKind::SharedKey;

        fn record_id(&self) -> String {
            self.id.clone()
        }

        fn revision(&self) -> u64 {
            self.revision
        }
    }

    fn counter(id: &str) -> Counter {
        Counter {
            id: id.to_string(),
            value: 0,
            revision: 1,
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let registry: Registry<Counter, _> = Registry::new(Arc::new(MemoryStore::new()));
        registry.insert(counter("a")).await.unwrap();

        assert_eq!(registry.get("a").await.unwrap(), Some(counter("a")));
        assert_eq!(registry.get("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_commit_writes_through() {
        let store = Arc::new(MemoryStore::new());
        let registry: Registry<Counter, _> = Registry::new(store.clone());
        let entry = registry.insert(counter("a")).await.unwrap();

        {
            let mut guard = entry.lock().await;
            let mut next = guard.clone();
            next.value = 7;
            next.revision += 1;
            registry.commit(&mut guard, next).await.unwrap();
        }

        let stored: Counter = store.get_value("a").await.unwrap().unwrap();
        assert_eq!(stored.value, 7);
        assert_eq!(stored.revision, 2);
    }

    #[tokio::test]
    async fn test_stale_commit_leaves_value() {
        let registry: Registry<Counter, _> = Registry::new(Arc::new(MemoryStore::new()));
        let entry = registry.insert(counter("a")).await.unwrap();

        let mut guard = entry.lock().await;
        let mut next = guard.clone();
        next.value = 9;
        // Same revision, different body.
        let err = registry.commit(&mut guard, next).await.unwrap_err();
        assert!(matches!(err, StoreError::Stale { current: 1, .. }));
        assert_eq!(guard.value, 0);
    }

    #[tokio::test]
    async fn test_lazy_reload_from_store() {
        let store = Arc::new(MemoryStore::new());
        let first: Registry<Counter, _> = Registry::new(store.clone());
        first.insert(counter("a")).await.unwrap();

        let second: Registry<Counter, _> = Registry::new(store);
        assert_eq!(second.get("a").await.unwrap(), Some(counter("a")));
        assert_eq!(second.ids().await.unwrap(), vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn test_remove() {
        let registry: Registry<Counter, _> = Registry::new(Arc::new(MemoryStore::new()));
        registry.insert(counter("a")).await.unwrap();

        assert!(registry.remove("a").await.unwrap());
        assert!(!registry.remove("a").await.unwrap());
        assert_eq!(registry.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_distinct_ids_do_not_block() {
        let registry: Registry<Counter, _> = Registry::new(Arc::new(MemoryStore::new()));
        let a = registry.insert(counter("a")).await.unwrap();
        registry.insert(counter("b")).await.unwrap();

        let _held = a.lock().await;
        // "b" is still reachable while "a" is locked.
        assert_eq!(registry.get("b").await.unwrap(), Some(counter("b")));
    }
}
