//! Error types for the engine.

use sable_core::{CoreError, ErrorKind};
use sable_perms::PermsError;
use sable_store::StoreError;
use thiserror::Error;

/// Errors that can occur during engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Cryptographic or envelope error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Group or shared-key error.
    #[error(transparent)]
    Perms(#[from] PermsError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Context id not known to the context store.
    #[error("unknown encryption context: {0}")]
    UnknownContext(String),

    /// Actor is not a participant of the context.
    #[error("not a context participant: {0}")]
    NotAParticipant(String),

    /// Actor may not perform this operation on the context.
    #[error("not authorized: {0}")]
    NotAuthorized(String),

    /// Context member limit exceeded.
    #[error("capacity exceeded: {attempted} recipients, limit {max}")]
    Capacity { max: usize, attempted: usize },

    /// Plaintext larger than the configured limit.
    #[error("payload too large: {size} bytes, limit {max}")]
    PayloadTooLarge { size: usize, max: usize },

    /// Invalid operation.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

impl EngineError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Core(e) => e.kind(),
            EngineError::Perms(e) => e.kind(),
            EngineError::Store(_) => ErrorKind::Internal,
            EngineError::UnknownContext(_) | EngineError::NotAParticipant(_) => {
                ErrorKind::Membership
            }
            EngineError::NotAuthorized(_) => ErrorKind::Permission,
            EngineError::Capacity { .. } => ErrorKind::Capacity,
            EngineError::PayloadTooLarge { .. } | EngineError::InvalidOperation(_) => {
                ErrorKind::Validation
            }
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
