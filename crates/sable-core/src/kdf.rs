//! Key derivation.
//!
//! Every derived key goes through BLAKE3 in `derive_key` mode with a
//! distinct context string, so keys from different purposes never collide.

use crate::crypto::{EncryptionKey, SharedSecret, X25519PublicKey};
use crate::error::Result;
use crate::identity::{Identity, PublicKey};

/// Context for personal (self) encryption keys.
pub const PERSONAL_CONTEXT: &str = "sable v1 personal encryption key";

/// Context for pairwise (direct) encryption keys.
pub const DIRECT_CONTEXT: &str = "sable v1 direct encryption key";

/// Context for key-wrapping keys.
pub const WRAP_CONTEXT: &str = "sable v1 key wrapping key";

/// Derive the owner's personal symmetric key from their secret seed.
///
/// Deterministic: the same identity always yields the same key.
pub fn derive_self_key(owner: &Identity) -> EncryptionKey {
    let seed = owner.seed();
    EncryptionKey::from_bytes(blake3::derive_key(PERSONAL_CONTEXT, seed.as_slice()))
}

/// Derive the pairwise key between `me` and `peer`.
///
/// Both sides compute the same key: the transcript includes the two X25519
/// public keys in sorted order.
pub fn derive_shared_secret(me: &Identity, peer: &PublicKey) -> Result<EncryptionKey> {
    let my_secret = me.x25519_secret();
    let my_public = my_secret.public_key();
    let peer_public = peer.to_x25519()?;

    let shared = my_secret.diffie_hellman(&peer_public)?;

    let (first, second) = if my_public <= peer_public {
        (my_public, peer_public)
    } else {
        (peer_public, my_public)
    };

    let mut hasher = blake3::Hasher::new_derive_key(DIRECT_CONTEXT);
    hasher.update(shared.as_bytes());
    hasher.update(first.as_bytes());
    hasher.update(second.as_bytes());
    Ok(EncryptionKey::from_bytes(*hasher.finalize().as_bytes()))
}

/// Derive a wrapping key from an agreement result.
pub(crate) fn derive_wrap_key(
    shared: &SharedSecret,
    agreement_public: &X25519PublicKey,
    recipient: &X25519PublicKey,
    context: &[u8],
) -> EncryptionKey {
    let mut hasher = blake3::Hasher::new_derive_key(WRAP_CONTEXT);
    hasher.update(shared.as_bytes());
    hasher.update(agreement_public.as_bytes());
    hasher.update(recipient.as_bytes());
    hasher.update(context);
    EncryptionKey::from_bytes(*hasher.finalize().as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_key_deterministic() {
        let owner = Identity::from_seed(&[7u8; 32]);
        let a = derive_self_key(&owner);
        let b = derive_self_key(&Identity::from_seed(&[7u8; 32]));
        assert_eq!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_self_key_differs_per_owner() {
        let a = derive_self_key(&Identity::generate());
        let b = derive_self_key(&Identity::generate());
        assert_ne!(a.as_bytes(), b.as_bytes());
    }

    #[test]
    fn test_shared_secret_symmetric() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let ab = derive_shared_secret(&alice, &bob.public_key()).unwrap();
        let ba = derive_shared_secret(&bob, &alice.public_key()).unwrap();

        assert_eq!(ab.as_bytes(), ba.as_bytes());
    }

    #[test]
    fn test_shared_secret_differs_per_pair() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let carol = Identity::generate();

        let ab = derive_shared_secret(&alice, &bob.public_key()).unwrap();
        let ac = derive_shared_secret(&alice, &carol.public_key()).unwrap();

        assert_ne!(ab.as_bytes(), ac.as_bytes());
    }

    #[test]
    fn test_personal_and_direct_domains_separate() {
        let alice = Identity::generate();
        let personal = derive_self_key(&alice);
        let direct = derive_shared_secret(&alice, &alice.public_key()).unwrap();
        assert_ne!(personal.as_bytes(), direct.as_bytes());
    }
}
