//! Key wrapping via X25519 key agreement.
//!
//! A symmetric key is handed to a recipient by agreeing a one-off wrapping
//! key with their X25519 public key and sealing the raw key bytes under it.
//! The caller's `context` (for example a group id and key version) is bound
//! as associated data, so a wrapped key cannot be replayed elsewhere.

use serde::{Deserialize, Serialize};

use crate::crypto::{EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey};
use crate::error::{CoreError, Result};
use crate::identity::{Identity, PublicKey};
use crate::kdf::derive_wrap_key;

/// How the wrapping key was agreed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WrapMode {
    /// Fresh ephemeral sender key.
    Anonymous,
    /// The sender's static identity key.
    Authenticated { sender: PublicKey },
}

/// A symmetric key encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKey {
    pub mode: WrapMode,
    /// The identity this copy is for.
    pub recipient: PublicKey,
    /// Sender side of the agreement (ephemeral or static X25519 key).
    pub agreement_public: X25519PublicKey,
    pub nonce: EncryptionNonce,
    pub encrypted_key: Vec<u8>,
}

/// Wrap `key` for `recipient`.
///
/// With `sender = None` an ephemeral key is used; otherwise the sender's
/// static key, and the sender is recorded in the blob.
pub fn wrap_key(
    key: &EncryptionKey,
    recipient: &PublicKey,
    sender: Option<&Identity>,
    context: &[u8],
) -> Result<WrappedKey> {
    let recipient_x = recipient.to_x25519()?;

    let (mode, agreement_public, shared) = match sender {
        None => {
            let ephemeral = EphemeralKeyPair::generate();
            let public = ephemeral.public_key();
            let shared = ephemeral.diffie_hellman(&recipient_x)?;
            (WrapMode::Anonymous, public, shared)
        }
        Some(sender) => {
            let secret = sender.x25519_secret();
            let public = secret.public_key();
            let shared = secret.diffie_hellman(&recipient_x)?;
            (
                WrapMode::Authenticated {
                    sender: sender.public_key(),
                },
                public,
                shared,
            )
        }
    };

    let wrap_key = derive_wrap_key(&shared, &agreement_public, &recipient_x, context);
    let nonce = EncryptionNonce::generate();
    let encrypted_key = wrap_key.encrypt(key.as_bytes(), &nonce, context)?;

    Ok(WrappedKey {
        mode,
        recipient: *recipient,
        agreement_public,
        nonce,
        encrypted_key,
    })
}

/// Recover the key from `wrapped` with the recipient's identity.
///
/// Anyone other than the recipient, or a mismatched `context`, gets an
/// authentication error.
pub fn unwrap_key(wrapped: &WrappedKey, owner: &Identity, context: &[u8]) -> Result<EncryptionKey> {
    if !wrapped.recipient.ct_eq(&owner.public_key()) {
        return Err(CoreError::Authentication(
            "wrapped key belongs to a different recipient".into(),
        ));
    }

    if let WrapMode::Authenticated { sender } = &wrapped.mode {
        if sender.to_x25519()? != wrapped.agreement_public {
            return Err(CoreError::Authentication(
                "wrapped key sender does not match agreement key".into(),
            ));
        }
    }

    let secret = owner.x25519_secret();
    let recipient_x = secret.public_key();
    let shared = secret.diffie_hellman(&wrapped.agreement_public)?;
    let wrap_key = derive_wrap_key(&shared, &wrapped.agreement_public, &recipient_x, context);

    let key_bytes = zeroize::Zeroizing::new(wrap_key.decrypt(
        &wrapped.encrypted_key,
        &wrapped.nonce,
        context,
    )?);
    EncryptionKey::from_slice(&key_bytes)
        .map_err(|_| CoreError::Authentication("unwrapped key has wrong length".into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wrap_roundtrip_anonymous() {
        let bob = Identity::generate();
        let key = EncryptionKey::generate();

        let wrapped = wrap_key(&key, &bob.public_key(), None, b"ctx").unwrap();
        assert_eq!(wrapped.mode, WrapMode::Anonymous);

        let unwrapped = unwrap_key(&wrapped, &bob, b"ctx").unwrap();
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_wrap_roundtrip_authenticated() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let key = EncryptionKey::generate();

        let wrapped = wrap_key(&key, &bob.public_key(), Some(&alice), b"ctx").unwrap();
        assert_eq!(
            wrapped.mode,
            WrapMode::Authenticated {
                sender: alice.public_key()
            }
        );

        let unwrapped = unwrap_key(&wrapped, &bob, b"ctx").unwrap();
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[test]
    fn test_unwrap_by_other_identity_fails() {
        let bob = Identity::generate();
        let eve = Identity::generate();
        let key = EncryptionKey::generate();

        let mut wrapped = wrap_key(&key, &bob.public_key(), None, b"ctx").unwrap();
        let err = unwrap_key(&wrapped, &eve, b"ctx").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Authentication);

        // Relabelling the blob does not help either.
        wrapped.recipient = eve.public_key();
        assert!(unwrap_key(&wrapped, &eve, b"ctx").is_err());
    }

    #[test]
    fn test_unwrap_with_wrong_context_fails() {
        let bob = Identity::generate();
        let key = EncryptionKey::generate();

        let wrapped = wrap_key(&key, &bob.public_key(), None, b"group:v1").unwrap();
        assert!(matches!(
            unwrap_key(&wrapped, &bob, b"group:v2"),
            Err(CoreError::Authentication(_))
        ));
    }

    #[test]
    fn test_forged_sender_rejected() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let key = EncryptionKey::generate();

        let mut wrapped = wrap_key(&key, &bob.public_key(), Some(&alice), b"ctx").unwrap();
        wrapped.mode = WrapMode::Authenticated {
            sender: Identity::generate().public_key(),
        };
        assert!(unwrap_key(&wrapped, &bob, b"ctx").is_err());
    }
}
