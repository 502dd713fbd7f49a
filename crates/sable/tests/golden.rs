//! Golden test vectors for cross-implementation verification.
//!
//! Every implementation reading the same credential must produce identical:
//! - public key
//! - signature (deterministic Ed25519)
//!
//! and agree on the symmetric pairwise key in both directions.

use sable::core::{derive_shared_secret, sign_data, Identity, IdentityCredential};
use sable::{EncryptOptions, Engine, EngineConfig};
use serde::{Deserialize, Serialize};

/// A single golden test vector.
#[derive(Debug, Serialize, Deserialize)]
pub struct GoldenVector {
    pub name: String,
    pub secret_seed: String, // 32 bytes hex
    pub public_key: String,  // 32 bytes hex
    pub message: String,     // hex
    pub signature: String,   // 64 bytes hex
}

fn rfc8032_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "rfc8032_test_1".into(),
            secret_seed: "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60".into(),
            public_key: "d75a980182b10ab7d54bfed3c964073a0ee172f3daa62325af021a68f707511a".into(),
            message: String::new(),
            signature: "e5564300c360ac729086e2cc806e828a84877f1eb8e5d974d873e065224901555fb8821590a33bacc61e39701cf9b46bd25bf5f0595bbe24655141438e7a100b".into(),
        },
        GoldenVector {
            name: "rfc8032_test_2".into(),
            secret_seed: "4ccd089b28ff96da9db6c346ec114e0f5b8a319f35aba624da8cf6ed4fb8a6fb".into(),
            public_key: "3d4017c3e843895a92b70aa74d1b7ebc9c982ccf2ec4968cc0cd55f12af4660c".into(),
            message: "72".into(),
            signature: "92a009a9f0d4cab8720e820b5f642540a2b27b5416503f8fb3762223ebdb69da085ac1e43e15996e458f3613d0f11d8c387b2eaeb4302aeeb00d291612bb0c00".into(),
        },
    ]
}

#[test]
fn test_rfc8032_signatures() {
    let engine = Engine::in_memory(EngineConfig::default());
    for vector in rfc8032_vectors() {
        let credential = IdentityCredential::new(
            vector.public_key.clone(),
            hex::decode(&vector.secret_seed).unwrap(),
        );
        let identity = engine.identity_from_credential(&credential).unwrap();
        assert_eq!(identity.public_key().to_hex(), vector.public_key, "{}", vector.name);

        let message = hex::decode(&vector.message).unwrap();
        let signature = engine.sign_data(&message, &identity);
        assert_eq!(signature.to_hex(), vector.signature, "{}", vector.name);

        let raw = hex::decode(&vector.signature).unwrap();
        assert!(engine.verify_signature(&message, &raw, &vector.public_key));
    }
}

#[test]
fn test_vectors_serialize_to_json() {
    let json = serde_json::to_string_pretty(&rfc8032_vectors()).unwrap();
    let parsed: Vec<GoldenVector> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[1].message, "72");
}

#[test]
fn test_pairwise_key_symmetric_for_vector_identities() {
    let a = Identity::from_seed(&hex_seed(&rfc8032_vectors()[0].secret_seed));
    let b = Identity::from_seed(&hex_seed(&rfc8032_vectors()[1].secret_seed));

    let ab = derive_shared_secret(&a, &b.public_key()).unwrap();
    let ba = derive_shared_secret(&b, &a.public_key()).unwrap();
    assert_eq!(ab.as_bytes(), ba.as_bytes());

    // Deterministic across calls.
    let again = derive_shared_secret(&a, &b.public_key()).unwrap();
    assert_eq!(ab.as_bytes(), again.as_bytes());
}

#[tokio::test]
async fn test_keypair_and_seed_credentials_are_interchangeable() {
    let engine = Engine::in_memory(EngineConfig::default());
    let vector = &rfc8032_vectors()[0];
    let seed = hex::decode(&vector.secret_seed).unwrap();
    let mut keypair = seed.clone();
    keypair.extend(hex::decode(&vector.public_key).unwrap());

    let from_seed = engine
        .identity_from_credential(&IdentityCredential::new(vector.public_key.clone(), seed))
        .unwrap();
    let from_keypair = engine
        .identity_from_credential(&IdentityCredential::new(vector.public_key.clone(), keypair))
        .unwrap();

    let sealed = engine
        .encrypt_personal(b"same owner", &from_seed, &EncryptOptions::default())
        .await
        .unwrap();
    assert_eq!(
        engine.decrypt_personal(&sealed, &from_keypair).await.unwrap(),
        b"same owner"
    );
}

fn hex_seed(s: &str) -> [u8; 32] {
    let bytes = hex::decode(s).unwrap();
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&bytes);
    seed
}
