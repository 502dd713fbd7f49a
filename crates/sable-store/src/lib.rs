//! # Sable Store
//!
//! Storage abstraction for Sable. Provides a trait-based interface for
//! persisting shared keys, signature groups and encryption contexts, with
//! SQLite and in-memory implementations, plus the id-keyed [`Registry`]
//! the managers hold their state in.
//!
//! ## Key Types
//!
//! - [`Store`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage (default, tests)
//! - [`Registry`] - Per-id locked, write-through cache of [`Persisted`] values
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sable_store::{SqliteStore, MemoryStore};
//!
//! // Open a SQLite database
//! let store = SqliteStore::open("sable.db").unwrap();
//!
//! // Or keep everything in memory
//! let store = MemoryStore::new();
//! ```
//!
//! ## Design Notes
//!
//! - **Opaque bodies**: values are stored as CBOR; only wrapped keys are ever
//!   part of a body, never plaintext keys or identities.
//! - **Optimistic writes**: an older revision, or different bytes at the same
//!   revision, is reported as [`PutResult::Stale`].

pub mod error;
pub mod memory;
pub mod migration;
pub mod registry;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use registry::{Entry, Registry};
pub use sqlite::SqliteStore;
pub use traits::{decode_body, encode_body, Persisted, PutResult, Record, RecordKind, Store, StoreExt};
