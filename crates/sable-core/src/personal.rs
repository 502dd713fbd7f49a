//! Personal (self) encryption: data only the owner can read.

use tracing::debug;

use crate::envelope::{EncryptOptions, EncryptionMethod, EncryptionResult, SchemeHeader};
use crate::error::Result;
use crate::identity::Identity;
use crate::kdf::derive_self_key;

/// Encrypt `plaintext` under the owner's personal key.
pub fn encrypt_personal(
    plaintext: &[u8],
    owner: &Identity,
    options: &EncryptOptions,
) -> Result<EncryptionResult> {
    let key = derive_self_key(owner);
    let result = EncryptionResult::seal(&key, SchemeHeader::Personal, plaintext, options)?;
    debug!(owner = ?owner.public_key(), len = plaintext.len(), "personal encrypt");
    Ok(result)
}

/// Decrypt a personal envelope.
///
/// A different owner or a corrupted payload fails authentication; a
/// non-personal envelope is a validation error.
pub fn decrypt_personal(result: &EncryptionResult, owner: &Identity) -> Result<Vec<u8>> {
    result.expect_method(EncryptionMethod::Personal)?;
    let key = derive_self_key(owner);
    let plaintext = result.open(&key)?;
    debug!(owner = ?owner.public_key(), "personal decrypt");
    Ok(plaintext)
}
