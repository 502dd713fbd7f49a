//! Error types for Sable Core.

use thiserror::Error;

/// Coarse classification shared by every error type in the workspace.
///
/// Callers branch on the kind rather than on concrete variants, so that
/// "decryption failed" is never confused with "not allowed" or "not found".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Authentication-tag or signature mismatch: wrong key, tampered data,
    /// or a key version the caller does not hold the right key for.
    Authentication,
    /// The actor's role or capability does not allow the operation.
    Permission,
    /// Unknown group/key/context, or actor/target is not a holder.
    Membership,
    /// A configured member limit would be exceeded.
    Capacity,
    /// Malformed input or an envelope presented to the wrong decrypt path.
    Validation,
    /// Storage or encoding failure inside the engine.
    Internal,
}

/// Errors raised by the core primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("secret key does not match public key {0}")]
    KeyMismatch(String),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("wrong decrypt path: expected {expected} envelope, got {actual}")]
    WrongMethod { expected: String, actual: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("encryption error: {0}")]
    Encryption(String),

    #[error("compression error: {0}")]
    Compression(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

impl CoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Authentication(_) | CoreError::InvalidSignature => {
                ErrorKind::Authentication
            }
            CoreError::InvalidPublicKey(_)
            | CoreError::InvalidSecretKey(_)
            | CoreError::KeyMismatch(_)
            | CoreError::WrongMethod { .. }
            | CoreError::Validation(_)
            | CoreError::Decoding(_) => ErrorKind::Validation,
            CoreError::Encryption(_) | CoreError::Compression(_) | CoreError::Encoding(_) => {
                ErrorKind::Internal
            }
        }
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
