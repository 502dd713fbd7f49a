//! Identities: the caller's long-lived asymmetric credential.
//!
//! A single Ed25519 key serves both purposes the engine needs. It signs
//! directly, and it agrees keys through the Ed25519 → X25519 birational map,
//! so callers never manage a second keypair.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use crate::crypto::{X25519PublicKey, X25519StaticSecret};
use crate::error::{CoreError, Result};

/// A 32-byte Ed25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PublicKey(pub [u8; 32]);

impl PublicKey {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim()).map_err(|e| CoreError::InvalidPublicKey(e.to_string()))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            CoreError::InvalidPublicKey(format!("expected 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }

    /// Parse into an ed25519-dalek verifying key, rejecting non-points.
    pub fn to_verifying_key(&self) -> Result<VerifyingKey> {
        VerifyingKey::from_bytes(&self.0).map_err(|e| CoreError::InvalidPublicKey(e.to_string()))
    }

    /// The X25519 public key used for key agreement with this identity.
    pub fn to_x25519(&self) -> Result<X25519PublicKey> {
        let verifying_key = self.to_verifying_key()?;
        Ok(X25519PublicKey::from_bytes(verifying_key.to_montgomery().to_bytes()))
    }

    /// Constant-time equality.
    pub fn ct_eq(&self, other: &PublicKey) -> bool {
        bool::from(self.0[..].ct_eq(&other.0[..]))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for PublicKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl AsRef<[u8]> for PublicKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for PublicKey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

/// The credential shape the surrounding SDK hands to the engine.
///
/// `public_key` is the hex encoding of the Ed25519 public key; `secret_key`
/// is either the 32-byte seed or the 64-byte `seed || public` encoding.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct IdentityCredential {
    /// Hex-encoded public key.
    pub public_key: String,
    /// Secret key bytes (seed or seed || public).
    pub secret_key: Vec<u8>,
}

impl IdentityCredential {
    /// Bundle a public key string and secret bytes.
    pub fn new(public_key: impl Into<String>, secret_key: impl Into<Vec<u8>>) -> Self {
        Self {
            public_key: public_key.into(),
            secret_key: secret_key.into(),
        }
    }
}

impl fmt::Debug for IdentityCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCredential")
            .field("public_key", &self.public_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// A validated identity held in memory for the duration of a call.
#[derive(Clone)]
pub struct Identity {
    signing_key: SigningKey,
}

impl Identity {
    /// Generate a new random identity.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Create from secret key bytes: a 32-byte seed or a 64-byte keypair.
    ///
    /// For the 64-byte form the trailing public half must match the seed.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self> {
        match secret.len() {
            32 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(secret);
                Ok(Self::from_seed(&seed))
            }
            64 => {
                let mut seed = Zeroizing::new([0u8; 32]);
                seed.copy_from_slice(&secret[..32]);
                let identity = Self::from_seed(&seed);
                let claimed = PublicKey::from_bytes(
                    secret[32..]
                        .try_into()
                        .map_err(|_| CoreError::InvalidSecretKey("bad keypair encoding".into()))?,
                );
                if !identity.public_key().ct_eq(&claimed) {
                    return Err(CoreError::KeyMismatch(claimed.to_hex()));
                }
                Ok(identity)
            }
            n => Err(CoreError::InvalidSecretKey(format!(
                "expected 32 or 64 bytes, got {}",
                n
            ))),
        }
    }

    /// Validate a caller credential and turn it into an identity.
    pub fn from_credential(credential: &IdentityCredential) -> Result<Self> {
        let identity = Self::from_secret_bytes(&credential.secret_key)?;
        let claimed = PublicKey::from_hex(&credential.public_key)?;
        if !identity.public_key().ct_eq(&claimed) {
            return Err(CoreError::KeyMismatch(claimed.to_hex()));
        }
        Ok(identity)
    }

    /// Export as a credential (seed form).
    pub fn credential(&self) -> IdentityCredential {
        IdentityCredential::new(self.public_key().to_hex(), self.signing_key.to_bytes().to_vec())
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    /// The underlying signing key.
    pub(crate) fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// The raw seed (secret key material).
    pub(crate) fn seed(&self) -> Zeroizing<[u8; 32]> {
        Zeroizing::new(self.signing_key.to_bytes())
    }

    /// The X25519 secret matching [`PublicKey::to_x25519`].
    pub fn x25519_secret(&self) -> X25519StaticSecret {
        X25519StaticSecret::from_bytes(self.signing_key.to_scalar_bytes())
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({:?})", self.public_key())
    }
}

impl TryFrom<&IdentityCredential> for Identity {
    type Error = CoreError;

    fn try_from(credential: &IdentityCredential) -> Result<Self> {
        Self::from_credential(credential)
    }
}
