//! Proptest generators for property-based testing.

use std::collections::BTreeMap;

use proptest::prelude::*;

use sable_core::{EncryptOptions, Identity, PublicKey};
use sable_perms::{Capability, Role};

/// Generate an identity from a random seed.
pub fn identity() -> impl Strategy<Value = Identity> {
    any::<[u8; 32]>().prop_map(|seed| Identity::from_seed(&seed))
}

/// Generate a public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    identity().prop_map(|i| i.public_key())
}

/// Generate plaintext of up to `max_len` bytes.
pub fn plaintext(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate highly compressible plaintext.
pub fn repetitive_plaintext(max_repeats: usize) -> impl Strategy<Value = Vec<u8>> {
    ("[a-z]{1,8}", 1..=max_repeats).prop_map(|(word, n)| word.repeat(n).into_bytes())
}

/// Generate caller metadata.
pub fn metadata() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z_]{1,12}", "[ -~]{0,24}", 0..4)
}

/// Generate encrypt options.
pub fn encrypt_options() -> impl Strategy<Value = EncryptOptions> {
    (any::<bool>(), any::<bool>(), metadata()).prop_map(|(compress, include_metadata, metadata)| {
        EncryptOptions {
            compress,
            include_metadata,
            metadata,
        }
    })
}

/// Generate a role that can be given to a non-owner member.
pub fn member_role() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Viewer), Just(Role::Member), Just(Role::Admin)]
}

/// Generate a capability.
pub fn capability() -> impl Strategy<Value = Capability> {
    (any::<bool>(), any::<bool>(), any::<bool>(), any::<bool>()).prop_map(
        |(can_decrypt, can_encrypt, can_share, can_revoke)| Capability {
            can_decrypt,
            can_encrypt,
            can_share,
            can_revoke,
        },
    )
}
