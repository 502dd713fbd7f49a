//! Shared-key capabilities: explicit least-privilege flags per holder.

use serde::{Deserialize, Serialize};

/// What a holder may do with a shared key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Capability {
    pub can_decrypt: bool,
    pub can_encrypt: bool,
    /// Add further holders (with no more than the sharer's own capability).
    pub can_share: bool,
    /// Remove holders and rotate the key.
    pub can_revoke: bool,
}

impl Capability {
    /// Every flag set. Always granted to the creator.
    pub const fn full() -> Self {
        Self {
            can_decrypt: true,
            can_encrypt: true,
            can_share: true,
            can_revoke: true,
        }
    }

    /// Decrypt and encrypt.
    pub const fn read_write() -> Self {
        Self {
            can_decrypt: true,
            can_encrypt: true,
            can_share: false,
            can_revoke: false,
        }
    }

    /// Decrypt only.
    pub const fn read_only() -> Self {
        Self {
            can_decrypt: true,
            can_encrypt: false,
            can_share: false,
            can_revoke: false,
        }
    }

    /// Whether every flag set here is also set in `other`.
    pub fn is_subset_of(&self, other: &Capability) -> bool {
        (!self.can_decrypt || other.can_decrypt)
            && (!self.can_encrypt || other.can_encrypt)
            && (!self.can_share || other.can_share)
            && (!self.can_revoke || other.can_revoke)
    }
}

/// Whether `capability` allows encrypting.
pub fn can_encrypt(capability: &Capability) -> bool {
    capability.can_encrypt
}

/// Whether `capability` allows decrypting.
pub fn can_decrypt(capability: &Capability) -> bool {
    capability.can_decrypt
}

/// Whether `capability` allows adding holders.
pub fn can_share(capability: &Capability) -> bool {
    capability.can_share
}

/// Whether `capability` allows removing holders and rotating.
pub fn can_revoke(capability: &Capability) -> bool {
    capability.can_revoke
}
