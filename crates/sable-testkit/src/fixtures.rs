//! Test fixtures and helpers.
//!
//! Deterministic named parties and a ready-made engine for integration tests.

use rand::RngCore;

use sable::{Engine, EngineConfig};
use sable_core::{Identity, PublicKey};
use sable_store::MemoryStore;

/// Seed for a named party; the same name always yields the same identity.
fn seed_for(label: &str, index: u32) -> [u8; 32] {
    let mut seed = [0u8; 32];
    let label = label.as_bytes();
    let len = label.len().min(28);
    seed[..len].copy_from_slice(&label[..len]);
    seed[28..].copy_from_slice(&index.to_be_bytes());
    seed
}

/// A deterministic identity for `name`.
pub fn party(name: &str) -> Identity {
    Identity::from_seed(&seed_for(name, 0))
}

/// Alice, usually the owner or creator.
pub fn alice() -> Identity {
    party("alice")
}

/// Bob, usually the first member or recipient.
pub fn bob() -> Identity {
    party("bob")
}

/// Carol.
pub fn carol() -> Identity {
    party("carol")
}

/// Eve, usually the party that gets removed.
pub fn eve() -> Identity {
    party("eve")
}

/// `count` distinct deterministic identities.
pub fn multi_party_fixtures(count: usize) -> Vec<Identity> {
    (0..count as u32)
        .map(|i| Identity::from_seed(&seed_for("member", i)))
        .collect()
}

/// Public keys of `parties`.
pub fn public_keys(parties: &[Identity]) -> Vec<PublicKey> {
    parties.iter().map(Identity::public_key).collect()
}

/// `len` random bytes.
pub fn random_payload(len: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// An in-memory engine plus the four named parties.
pub struct TestFixture {
    pub engine: Engine<MemoryStore>,
    pub alice: Identity,
    pub bob: Identity,
    pub carol: Identity,
    pub eve: Identity,
}

impl TestFixture {
    /// Create a new fixture with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Create a new fixture with `config`.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            engine: Engine::in_memory(config),
            alice: alice(),
            bob: bob(),
            carol: carol(),
            eve: eve(),
        }
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parties_are_deterministic_and_distinct() {
        assert_eq!(alice().public_key(), alice().public_key());
        assert_ne!(alice().public_key(), bob().public_key());

        let many = public_keys(&multi_party_fixtures(20));
        let mut sorted = many.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(sorted.len(), 20);
        assert!(!many.contains(&alice().public_key()));
    }

    #[test]
    fn test_random_payload_length() {
        assert_eq!(random_payload(0).len(), 0);
        assert_eq!(random_payload(100).len(), 100);
    }
}
