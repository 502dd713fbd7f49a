//! # Sable
//!
//! The unified API for Sable: an embedded encryption and key-management
//! engine for wallet-keyed applications.
//!
//! ## Overview
//!
//! Sable turns one Ed25519 identity into every scheme an application needs:
//!
//! - **Personal**: data only the owner can read (drafts, local history)
//! - **Direct**: pairwise encryption between two identities
//! - **Signature groups**: role-based group encryption with key rotation
//! - **Shared keys**: capability-based multi-holder keys
//! - **Encryption contexts**: conversations that start direct and move onto a
//!   shared key once enough recipients join
//!
//! Every operation returns a tagged [`EncryptionResult`]; the tag decides the
//! only legal decrypt path.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sable::{Engine, EngineConfig};
//! use sable::core::{EncryptOptions, Identity};
//!
//! async fn example() {
//!     let engine = Engine::in_memory(EngineConfig::default());
//!     let alice = Identity::generate();
//!     let bob = Identity::generate();
//!
//!     // Start a conversation with Bob
//!     let context = engine
//!         .create_encryption_context("chat", "", &bob.public_key(), &alice, None)
//!         .await
//!         .unwrap();
//!
//!     let sealed = engine
//!         .encrypt_in_context(&context.context_id, b"hello", &alice, &EncryptOptions::default())
//!         .await
//!         .unwrap();
//!     let opened = engine
//!         .decrypt_in_context(&context.context_id, &sealed, &bob)
//!         .await
//!         .unwrap();
//!     assert_eq!(opened, b"hello");
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `sable::core` - Identities, key derivation, envelopes, personal and direct encryption
//! - `sable::store` - Storage abstraction, SQLite and registries
//! - `sable::perms` - Roles, capabilities, signature groups and shared keys

pub mod context;
pub mod engine;
pub mod error;

// Re-export component crates
pub use sable_core as core;
pub use sable_perms as perms;
pub use sable_store as store;

// Re-export main types for convenience
pub use context::{ContextManager, ContextMethod, ContextOptions, ContextStore, EncryptionContext};
pub use engine::{Engine, EngineConfig};
pub use error::{EngineError, Result};

// Re-export commonly used types
pub use sable_core::{
    EncryptOptions, EncryptionMethod, EncryptionResult, ErrorKind, Identity, IdentityCredential,
    PublicKey, Signature,
};
pub use sable_perms::{Capability, HolderSpec, MemberSpec, Role, SharedKeySpec};
