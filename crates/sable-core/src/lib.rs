//! # Sable Core
//!
//! Primitives for the Sable encryption engine: identities, key derivation,
//! key wrapping, signing, the encrypted envelope, and the two schemes that
//! need no shared state (personal and direct encryption).
//!
//! This crate performs no I/O. Everything here is pure computation over
//! caller-supplied identities and payloads.
//!
//! ## Key Types
//!
//! - [`Identity`] - a validated Ed25519 credential, also used for X25519 agreement
//! - [`EncryptionResult`] - the tagged envelope every encrypt operation returns
//! - [`WrappedKey`] - a symmetric key sealed for one recipient
//! - [`EncryptionKey`] - a zeroize-on-drop ChaCha20-Poly1305 key

pub mod compression;
pub mod crypto;
pub mod direct;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod kdf;
pub mod personal;
pub mod signing;
pub mod types;
pub mod wrap;

pub use crypto::{EncryptionKey, EncryptionNonce, KeyFingerprint, X25519PublicKey};
pub use direct::{decrypt_direct, decrypt_direct_as_participant, encrypt_direct};
pub use envelope::{
    EncryptOptions, EncryptionFormat, EncryptionMethod, EncryptionResult, Metadata, SchemeHeader,
};
pub use error::{CoreError, ErrorKind, Result};
pub use identity::{Identity, IdentityCredential, PublicKey};
pub use kdf::{derive_self_key, derive_shared_secret};
pub use personal::{decrypt_personal, encrypt_personal};
pub use signing::{sign_data, verify_signature, Signature};
pub use types::{now_millis, ContextId, GroupId, KeyId, KeyVersion, INITIAL_KEY_VERSION};
pub use wrap::{unwrap_key, wrap_key, WrapMode, WrappedKey};
