//! Store trait: the abstract interface for record persistence.
//!
//! The engine persists three kinds of objects (shared keys, signature groups
//! and encryption contexts). Each is stored as an opaque CBOR body keyed by
//! `(kind, id)` with a revision used for optimistic-concurrency writes.

use std::fmt;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Result, StoreError};

/// Discriminator for the persisted object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum RecordKind {
    SharedKey = 1,
    SignatureGroup = 2,
    EncryptionContext = 3,
}

impl RecordKind {
    /// Convert to the stored integer.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert from the stored integer.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(RecordKind::SharedKey),
            2 => Some(RecordKind::SignatureGroup),
            3 => Some(RecordKind::EncryptionContext),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordKind::SharedKey => "shared_key",
            RecordKind::SignatureGroup => "signature_group",
            RecordKind::EncryptionContext => "encryption_context",
        };
        f.write_str(name)
    }
}

/// One stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub id: String,
    /// Monotonic per-object revision.
    pub revision: u64,
    /// CBOR-encoded body.
    pub body: Vec<u8>,
    /// Unix ms of the last accepted write.
    pub updated_at: i64,
}

/// Result of writing a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PutResult {
    /// No record existed under this id.
    Inserted,
    /// The record was replaced by a newer revision.
    Updated,
    /// Same revision and same bytes (idempotent, not an error).
    Unchanged,
    /// A newer revision, or different bytes at the same revision, is stored.
    Stale { current: u64 },
}

/// Decide the outcome of writing `incoming` over `existing`.
///
/// Shared by every backend so that they agree on write semantics.
pub fn classify_put(existing: Option<&Record>, incoming: &Record) -> PutResult {
    match existing {
        None => PutResult::Inserted,
        Some(current) if incoming.revision > current.revision => PutResult::Updated,
        Some(current) if incoming.revision == current.revision && incoming.body == current.body => {
            PutResult::Unchanged
        }
        Some(current) => PutResult::Stale {
            current: current.revision,
        },
    }
}

/// The Store trait: async interface for record persistence.
///
/// All methods are async to support both sync (SQLite) and async backends.
/// For SQLite, `spawn_blocking` is used internally to avoid blocking the
/// runtime.
#[async_trait]
pub trait Store: Send + Sync {
    /// Write a record, subject to the revision rules of [`PutResult`].
    async fn put_record(&self, record: &Record) -> Result<PutResult>;

    /// Read a record.
    async fn get_record(&self, kind: RecordKind, id: &str) -> Result<Option<Record>>;

    /// List all ids of one kind, sorted.
    async fn list_records(&self, kind: RecordKind) -> Result<Vec<String>>;

    /// Delete a record. Returns whether one existed.
    async fn delete_record(&self, kind: RecordKind, id: &str) -> Result<bool>;
}

/// A value that can be written through a [`Store`].
pub trait Persisted: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Which kind of record this value is stored as.
    const KIND: RecordKind;

    /// Stable id of this value.
    fn record_id(&self) -> String;

    /// Current revision of this value.
    fn revision(&self) -> u64;
}

/// Encode a value to CBOR.
pub fn encode_body<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(value, &mut buf).map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a value from CBOR.
pub fn decode_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Typed access on top of [`Store`].
pub trait StoreExt: Store {
    /// Encode and write a value.
    fn put_value<V: Persisted>(
        &self,
        value: &V,
    ) -> impl std::future::Future<Output = Result<PutResult>> + Send;

    /// Read and decode a value.
    fn get_value<V: Persisted>(
        &self,
        id: &str,
    ) -> impl std::future::Future<Output = Result<Option<V>>> + Send;
}

impl<S: Store + ?Sized> StoreExt for S {
    async fn put_value<V: Persisted>(&self, value: &V) -> Result<PutResult> {
        let record = Record {
            kind: V::KIND,
            id: value.record_id(),
            revision: value.revision(),
            body: encode_body(value)?,
            updated_at: now_millis(),
        };
        self.put_record(&record).await
    }

    async fn get_value<V: Persisted>(&self, id: &str) -> Result<Option<V>> {
        match self.get_record(V::KIND, id).await? {
            Some(record) => decode_body(&record.body).map(Some),
            None => Ok(None),
        }
    }
}

/// Get current time in milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn record(revision: u64, body: &[u8]) -> Record {
        Record {
            kind: RecordKind::SharedKey,
            id: "k".into(),
            revision,
            body: body.to_vec(),
            updated_at: 0,
        }
    }

    #[test]
    fn test_classify_put() {
        let stored = record(2, b"two");

        assert_eq!(classify_put(None, &stored), PutResult::Inserted);
        assert_eq!(classify_put(Some(&stored), &record(3, b"three")), PutResult::Updated);
        assert_eq!(classify_put(Some(&stored), &record(2, b"two")), PutResult::Unchanged);
        assert_eq!(
            classify_put(Some(&stored), &record(2, b"other")),
            PutResult::Stale { current: 2 }
        );
        assert_eq!(
            classify_put(Some(&stored), &record(1, b"one")),
            PutResult::Stale { current: 2 }
        );
    }

    #[test]
    fn test_record_kind_roundtrip() {
        for kind in [
            RecordKind::SharedKey,
            RecordKind::SignatureGroup,
            RecordKind::EncryptionContext,
        ] {
            assert_eq!(RecordKind::from_u8(kind.to_u8()), Some(kind));
        }
        assert_eq!(RecordKind::from_u8(0), None);
    }

    proptest! {
        #[test]
        fn prop_older_revisions_are_stale(
            stored in 1000u64..2000,
            behind in 1u64..1000,
            body in prop::collection::vec(any::<u8>(), 0..16),
        ) {
            let older = stored - behind;
            let current = record(stored, b"current");
            prop_assert_eq!(
                classify_put(Some(&current), &record(older, &body)),
                PutResult::Stale { current: stored }
            );
            prop_assert_eq!(classify_put(Some(&current), &record(stored + 1, &body)), PutResult::Updated);
        }
    }
}
