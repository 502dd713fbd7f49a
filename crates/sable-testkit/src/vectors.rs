//! Golden test vectors for deterministic verification.
//!
//! Ed25519 signatures are deterministic, so these RFC 8032 vectors pin the
//! signing path exactly. Any other implementation reading the same
//! credentials must produce the same public keys and signatures.

use sable_core::{sign_data, verify_signature, Identity, IdentityCredential, Signature};

/// A golden signing vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// 32-byte Ed25519 seed (hex).
    pub secret_seed: &'static str,
    /// Expected public key (hex).
    pub public_key: &'static str,
    /// Message (hex).
    pub message: &'static str,
    /// Expected signature (hex).
    pub signature: &'static str,
}

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "RFC 8032 test 1 (empty message)",
            secret_seed: "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60",
            public_key: "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a",
            message: "",
            signature: "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b",
        },
        GoldenVector {
            name: "RFC 8032 test 2 (one byte)",
            secret_seed: "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb",
            public_key: "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c",
            message: "72",
            signature: "92a009a9f0d4cab8720e820b5f642540a2b27b5416503f8fb3762223ebdb69da085ac1e43e15996e458f3613d0f11d8c387b2eaeb4302aeeb00d291612bb0c00",
        },
    ]
}

/// Build the identity described by a vector's seed.
pub fn identity_from_vector(vector: &GoldenVector) -> Result<Identity, String> {
    let seed = hex::decode(vector.secret_seed).map_err(|e| format!("{}: bad seed hex: {}", vector.name, e))?;
    let credential = IdentityCredential::new(vector.public_key, seed);
    Identity::from_credential(&credential).map_err(|e| format!("{}: {}", vector.name, e))
}

/// Check one vector: public key, signature bytes and verification.
pub fn verify_vector(vector: &GoldenVector) -> Result<(), String> {
    let identity = identity_from_vector(vector)?;
    if identity.public_key().to_hex() != vector.public_key {
        return Err(format!("{}: public key mismatch", vector.name));
    }

    let message = hex::decode(vector.message).map_err(|e| format!("{}: bad message hex: {}", vector.name, e))?;
    let signature = sign_data(&message, &identity);
    if signature.to_hex() != vector.signature {
        return Err(format!(
            "{}: signature mismatch: got {}",
            vector.name,
            signature.to_hex()
        ));
    }

    let expected = hex::decode(vector.signature)
        .map_err(|e| format!("{}: bad signature hex: {}", vector.name, e))
        .and_then(|bytes| Signature::from_slice(&bytes).map_err(|e| format!("{}: {}", vector.name, e)))?;
    if !verify_signature(&message, &expected, &identity.public_key()) {
        return Err(format!("{}: expected signature does not verify", vector.name));
    }
    Ok(())
}

/// Verify all golden vectors.
pub fn verify_all_vectors() -> Result<(), String> {
    all_vectors().iter().try_for_each(verify_vector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_verify() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_keypair_encoding_matches_seed() {
        for vector in all_vectors() {
            let mut keypair = hex::decode(vector.secret_seed).unwrap();
            keypair.extend(hex::decode(vector.public_key).unwrap());
            let from_keypair = Identity::from_secret_bytes(&keypair).unwrap();
            assert_eq!(from_keypair.public_key().to_hex(), vector.public_key);
        }
    }

    #[test]
    fn test_altered_message_fails() {
        let vector = &all_vectors()[1];
        let identity = identity_from_vector(vector).unwrap();
        let signature = sign_data(b"\x73", &identity);
        assert!(!verify_signature(b"\x72", &signature, &identity.public_key()));
    }
}
