//! Symmetric and key-agreement primitives.
//!
//! X25519 agreement (static or one-shot) feeds a KDF; the derived 32-byte
//! keys drive ChaCha20-Poly1305 with caller-supplied associated data.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey as DalekPublic, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{CoreError, Result};

/// Symmetric key length.
pub const KEY_SIZE: usize = 32;

/// AEAD nonce length.
pub const NONCE_SIZE: usize = 12;

const FINGERPRINT_CONTEXT: &str = "sable v1 key fingerprint";

fn random_array<const N: usize>() -> [u8; N] {
    let mut out = [0u8; N];
    rand::thread_rng().fill_bytes(&mut out);
    out
}

fn contributory(shared: x25519_dalek::SharedSecret) -> Result<SharedSecret> {
    if shared.was_contributory() {
        Ok(SharedSecret(shared.to_bytes()))
    } else {
        Err(CoreError::InvalidPublicKey("low-order X25519 point".into()))
    }
}

/// Montgomery-form public key used for agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_dalek(&self) -> DalekPublic {
        DalekPublic::from(self.0)
    }
}

impl From<DalekPublic> for X25519PublicKey {
    fn from(pk: DalekPublic) -> Self {
        Self(pk.to_bytes())
    }
}

/// Long-lived agreement secret, converted from an identity's signing key.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    /// Wrap scalar bytes; x25519-dalek clamps them.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn public_key(&self) -> X25519PublicKey {
        DalekPublic::from(&self.0).into()
    }

    /// Agree with `peer`. Low-order peers are refused.
    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> Result<SharedSecret> {
        contributory(self.0.diffie_hellman(&peer.to_dalek()))
    }
}

/// One-shot agreement secret for anonymous wraps.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = DalekPublic::from(&secret).into();
        Self { secret, public }
    }

    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    /// Agree with `peer`, consuming the secret.
    pub fn diffie_hellman(self, peer: &X25519PublicKey) -> Result<SharedSecret> {
        contributory(self.secret.diffie_hellman(&peer.to_dalek()))
    }
}

/// Raw agreement output. Only ever fed to the KDF.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; 32]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// A ChaCha20-Poly1305 key. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; KEY_SIZE]);

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EncryptionKey(<redacted>)")
    }
}

impl EncryptionKey {
    pub fn generate() -> Self {
        Self(random_array())
    }

    pub const fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Accepts exactly [`KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        <[u8; KEY_SIZE]>::try_from(bytes).map(Self).map_err(|_| {
            CoreError::Validation(format!("key must be {} bytes, got {}", KEY_SIZE, bytes.len()))
        })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// One-way commitment, stored beside wrapped copies of the key.
    pub fn fingerprint(&self) -> KeyFingerprint {
        KeyFingerprint(blake3::derive_key(FINGERPRINT_CONTEXT, &self.0))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }

    /// Seal `plaintext`, binding `aad`.
    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg: plaintext, aad };
        self.cipher()
            .encrypt(Nonce::from_slice(&nonce.0), payload)
            .map_err(|e| CoreError::Encryption(e.to_string()))
    }

    /// Open `ciphertext`. A wrong key, a modified ciphertext and modified
    /// `aad` all surface as the same authentication failure.
    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce, aad: &[u8]) -> Result<Vec<u8>> {
        let payload = Payload { msg: ciphertext, aad };
        self.cipher()
            .decrypt(Nonce::from_slice(&nonce.0), payload)
            .map_err(|_| CoreError::Authentication("authentication tag mismatch".into()))
    }
}

/// BLAKE3 commitment to an [`EncryptionKey`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KeyFingerprint(pub [u8; 32]);

impl KeyFingerprint {
    /// Constant-time.
    pub fn matches(&self, key: &EncryptionKey) -> bool {
        let other = key.fingerprint();
        self.0[..].ct_eq(&other.0[..]).into()
    }
}

/// AEAD nonce. Always random; never reused under one key in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; NONCE_SIZE]);

impl EncryptionNonce {
    pub fn generate() -> Self {
        Self(random_array())
    }

    pub const fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_and_ephemeral_agree() {
        let bob = X25519StaticSecret::from_bytes(random_array());
        let carol = X25519StaticSecret::from_bytes(random_array());
        assert_eq!(
            bob.diffie_hellman(&carol.public_key()).unwrap().as_bytes(),
            carol.diffie_hellman(&bob.public_key()).unwrap().as_bytes()
        );

        let once = EphemeralKeyPair::generate();
        let once_public = once.public_key();
        let sender_side = once.diffie_hellman(&bob.public_key()).unwrap();
        let receiver_side = bob.diffie_hellman(&once_public).unwrap();
        assert_eq!(sender_side.as_bytes(), receiver_side.as_bytes());
    }

    #[test]
    fn test_all_zero_peer_refused() {
        let bob = X25519StaticSecret::from_bytes(random_array());
        let err = bob.diffie_hellman(&X25519PublicKey::from_bytes([0u8; 32]));
        assert!(matches!(err, Err(CoreError::InvalidPublicKey(_))));
    }

    #[test]
    fn test_aead_binds_key_and_aad() {
        let key = EncryptionKey::generate();
        let nonce = EncryptionNonce::generate();
        let sealed = key.encrypt(b"ledger entry", &nonce, b"header-a").unwrap();

        assert_eq!(key.decrypt(&sealed, &nonce, b"header-a").unwrap(), b"ledger entry");
        assert!(matches!(
            key.decrypt(&sealed, &nonce, b"header-b"),
            Err(CoreError::Authentication(_))
        ));
        assert!(matches!(
            EncryptionKey::generate().decrypt(&sealed, &nonce, b"header-a"),
            Err(CoreError::Authentication(_))
        ));

        let mut flipped = sealed.clone();
        flipped[0] ^= 0x80;
        assert!(key.decrypt(&flipped, &nonce, b"header-a").is_err());
    }

    #[test]
    fn test_fingerprint_commits_to_one_key() {
        let key = EncryptionKey::generate();
        let copy = EncryptionKey::from_slice(key.as_bytes()).unwrap();
        assert!(key.fingerprint().matches(&copy));
        assert!(!key.fingerprint().matches(&EncryptionKey::generate()));
    }

    #[test]
    fn test_key_length_checked() {
        assert!(EncryptionKey::from_slice(&[7u8; KEY_SIZE - 1]).is_err());
        assert!(EncryptionKey::from_slice(&[7u8; KEY_SIZE + 1]).is_err());
    }
}
