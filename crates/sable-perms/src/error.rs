//! Error types for the permissions module.

use sable_core::{CoreError, ErrorKind};
use sable_store::StoreError;
use thiserror::Error;

/// Errors that can occur during group and shared-key operations.
#[derive(Debug, Error)]
pub enum PermsError {
    /// The actor's role or capability does not allow the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Actor or target is not a member/holder, or holds no key for a version.
    #[error("membership error: {0}")]
    NotAMember(String),

    /// Shared key id not known to the key store.
    #[error("unknown shared key: {0}")]
    UnknownKey(String),

    /// A member limit would be exceeded.
    #[error("capacity exceeded: {attempted} members, limit {max}")]
    Capacity { max: usize, attempted: usize },

    /// Malformed input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Core error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl PermsError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PermsError::PermissionDenied(_) => ErrorKind::Permission,
            PermsError::NotAMember(_) | PermsError::UnknownKey(_) => ErrorKind::Membership,
            PermsError::Capacity { .. } => ErrorKind::Capacity,
            PermsError::Validation(_) => ErrorKind::Validation,
            PermsError::Core(e) => e.kind(),
            PermsError::Store(_) => ErrorKind::Internal,
        }
    }
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermsError>;
