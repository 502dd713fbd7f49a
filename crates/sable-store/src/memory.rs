//! In-memory implementation of the Store trait.
//!
//! This is the default backend and the one used in tests. It has the same
//! write semantics as SQLite but keeps everything in memory.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{Result, StoreError};
use crate::traits::{classify_put, PutResult, Record, RecordKind, Store};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<(RecordKind, String), Record>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records of every kind.
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Poisoned(e.to_string())
}

#[async_trait]
impl Store for MemoryStore {
    async fn put_record(&self, record: &Record) -> Result<PutResult> {
        let mut records = self.records.write().map_err(poisoned)?;
        let key = (record.kind, record.id.clone());

        let result = classify_put(records.get(&key), record);
        if matches!(result, PutResult::Inserted | PutResult::Updated) {
            records.insert(key, record.clone());
        }
        Ok(result)
    }

    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<Option<Record>> {
        let records = self.records.read().map_err(poisoned)?;
        Ok(records.get(&(kind, id.to_string())).cloned())
    }

    async fn list_records(&self, kind: RecordKind) -> Result<Vec<String>> {
        let records = self.records.read().map_err(poisoned)?;
        let mut ids: Vec<String> = records
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<bool> {
        let mut records = self.records.write().map_err(poisoned)?;
        Ok(records.remove(&(kind, id.to_string())).is_some())
    }
}
