//! Ed25519 signing and verification.

use std::fmt;

use ed25519_dalek::Signer;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{CoreError, Result};
use crate::identity::{Identity, PublicKey};

/// Length of an Ed25519 signature in bytes.
pub const SIGNATURE_SIZE: usize = 64;

/// A 64-byte Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature(pub [u8; SIGNATURE_SIZE]);

impl Signature {
    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a byte slice, which must be exactly 64 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; SIGNATURE_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::Validation(format!(
                "signature must be {} bytes, got {}",
                SIGNATURE_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct SignatureVisitor;

        impl<'de> Visitor<'de> for SignatureVisitor {
            type Value = Signature;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "{} signature bytes", SIGNATURE_SIZE)
            }

            fn visit_bytes<E: de::Error>(self, v: &[u8]) -> std::result::Result<Signature, E> {
                Signature::from_slice(v).map_err(E::custom)
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> std::result::Result<Signature, A::Error> {
                let mut bytes = [0u8; SIGNATURE_SIZE];
                for (i, slot) in bytes.iter_mut().enumerate() {
                    *slot = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                if seq.next_element::<u8>()?.is_some() {
                    return Err(de::Error::invalid_length(SIGNATURE_SIZE + 1, &self));
                }
                Ok(Signature(bytes))
            }
        }

        deserializer.deserialize_bytes(SignatureVisitor)
    }
}

/// Sign `message` with the signer's Ed25519 key.
pub fn sign_data(message: &[u8], signer: &Identity) -> Signature {
    Signature(signer.signing_key().sign(message).to_bytes())
}

/// Verify `signature` over `message` against `public`.
///
/// Uses strict verification (rejects small-order keys and non-canonical
/// encodings). Any failure, including a malformed key, is `false`.
pub fn verify_signature(message: &[u8], signature: &Signature, public: &PublicKey) -> bool {
    let verifying_key = match public.to_verifying_key() {
        Ok(key) => key,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(&signature.0);
    verifying_key.verify_strict(message, &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_sign_verify() {
        let alice = Identity::generate();
        let sig = sign_data(b"hello", &alice);
        assert!(verify_signature(b"hello", &sig, &alice.public_key()));
    }

    #[test]
    fn test_verify_wrong_message() {
        let alice = Identity::generate();
        let sig = sign_data(b"hello", &alice);
        assert!(!verify_signature(b"goodbye", &sig, &alice.public_key()));
    }

    #[test]
    fn test_verify_wrong_key() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let sig = sign_data(b"hello", &alice);
        assert!(!verify_signature(b"hello", &sig, &bob.public_key()));
    }

    #[test]
    fn test_signature_serde_cbor_and_json() {
        let sig = sign_data(b"msg", &Identity::generate());

        let mut buf = Vec::new();
        ciborium::into_writer(&sig, &mut buf).unwrap();
        let from_cbor: Signature = ciborium::from_reader(buf.as_slice()).unwrap();
        assert_eq!(sig, from_cbor);

        let json = serde_json::to_string(&sig).unwrap();
        let from_json: Signature = serde_json::from_str(&json).unwrap();
        assert_eq!(sig, from_json);
    }

    #[test]
    fn test_signature_from_slice_length() {
        assert!(Signature::from_slice(&[0u8; 63]).is_err());
        assert!(Signature::from_slice(&[0u8; 64]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_sign_verify(seed in any::<[u8; 32]>(), message in prop::collection::vec(any::<u8>(), 0..512)) {
            let identity = Identity::from_seed(&seed);
            let sig = sign_data(&message, &identity);
            prop_assert!(verify_signature(&message, &sig, &identity.public_key()));
        }

        #[test]
        fn prop_flipped_bit_fails(seed in any::<[u8; 32]>(), message in prop::collection::vec(any::<u8>(), 1..256), bit in 0usize..8) {
            let identity = Identity::from_seed(&seed);
            let sig = sign_data(&message, &identity);
            let mut tampered = message.clone();
            tampered[0] ^= 1 << bit;
            prop_assert!(!verify_signature(&tampered, &sig, &identity.public_key()));
        }
    }
}
