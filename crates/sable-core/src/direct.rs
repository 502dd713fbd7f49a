//! Direct (pairwise) encryption between two identities.

use tracing::debug;

use crate::envelope::{EncryptOptions, EncryptionMethod, EncryptionResult, SchemeHeader};
use crate::error::{CoreError, Result};
use crate::identity::{Identity, PublicKey};
use crate::kdf::derive_shared_secret;

/// Encrypt `plaintext` for `recipient` using the pairwise key.
pub fn encrypt_direct(
    plaintext: &[u8],
    recipient: &PublicKey,
    sender: &Identity,
    options: &EncryptOptions,
) -> Result<EncryptionResult> {
    let key = derive_shared_secret(sender, recipient)?;
    let header = SchemeHeader::Direct {
        sender: sender.public_key(),
        recipient: *recipient,
    };
    let result = EncryptionResult::seal(&key, header, plaintext, options)?;
    debug!(sender = ?sender.public_key(), recipient = ?recipient, "direct encrypt");
    Ok(result)
}

/// Decrypt a direct envelope as its recipient.
///
/// Any identity other than the recorded recipient fails authentication.
pub fn decrypt_direct(result: &EncryptionResult, recipient: &Identity) -> Result<Vec<u8>> {
    result.expect_method(EncryptionMethod::Direct)?;
    let SchemeHeader::Direct {
        sender,
        recipient: intended,
    } = &result.header
    else {
        return Err(CoreError::Validation("malformed direct header".into()));
    };

    if !intended.ct_eq(&recipient.public_key()) {
        return Err(CoreError::Authentication(
            "envelope is addressed to a different recipient".into(),
        ));
    }

    let key = derive_shared_secret(recipient, sender)?;
    let plaintext = result.open(&key)?;
    debug!(sender = ?sender, recipient = ?intended, "direct decrypt");
    Ok(plaintext)
}

/// Decrypt a direct envelope from either side of the pair.
///
/// The sender can read back what they sent; the pairwise key is symmetric.
pub fn decrypt_direct_as_participant(result: &EncryptionResult, me: &Identity) -> Result<Vec<u8>> {
    result.expect_method(EncryptionMethod::Direct)?;
    let SchemeHeader::Direct { sender, recipient } = &result.header else {
        return Err(CoreError::Validation("malformed direct header".into()));
    };

    let my_public = me.public_key();
    let peer = if recipient.ct_eq(&my_public) {
        sender
    } else if sender.ct_eq(&my_public) {
        recipient
    } else {
        return Err(CoreError::Authentication(
            "caller is not a participant of this envelope".into(),
        ));
    };

    let key = derive_shared_secret(me, peer)?;
    result.open(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::personal::encrypt_personal;
    use crate::ErrorKind;
    use proptest::prelude::*;

    #[test]
    fn test_direct_roundtrip() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let options = EncryptOptions::default().with_metadata("subject", "hi");
        let result = encrypt_direct(b"hello bob", &bob.public_key(), &alice, &options).unwrap();

        assert_eq!(result.metadata.get("subject").map(String::as_str), Some("hi"));
        assert_eq!(decrypt_direct(&result, &bob).unwrap(), b"hello bob");
    }

    #[test]
    fn test_direct_third_party_fails() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let eve = Identity::generate();

        let result =
            encrypt_direct(b"hello bob", &bob.public_key(), &alice, &EncryptOptions::default())
                .unwrap();

        let err = decrypt_direct(&result, &eve).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_direct_readdressed_envelope_fails() {
        let alice = Identity::generate();
        let bob = Identity::generate();
        let eve = Identity::generate();

        let mut result =
            encrypt_direct(b"hello bob", &bob.public_key(), &alice, &EncryptOptions::default())
                .unwrap();
        result.header = SchemeHeader::Direct {
            sender: alice.public_key(),
            recipient: eve.public_key(),
        };

        let err = decrypt_direct(&result, &eve).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[test]
    fn test_direct_rejects_personal_envelope() {
        let alice = Identity::generate();
        let result = encrypt_personal(b"mine", &alice, &EncryptOptions::default()).unwrap();
        let err = decrypt_direct(&result, &alice).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_sender_can_read_back() {
        let alice = Identity::generate();
        let bob = Identity::generate();

        let result =
            encrypt_direct(b"sent", &bob.public_key(), &alice, &EncryptOptions::default()).unwrap();

        assert_eq!(decrypt_direct_as_participant(&result, &alice).unwrap(), b"sent");
        assert_eq!(decrypt_direct_as_participant(&result, &bob).unwrap(), b"sent");
        assert!(decrypt_direct_as_participant(&result, &Identity::generate()).is_err());
    }

    #[test]
    fn test_direct_invalid_recipient_key() {
        let alice = Identity::generate();
        // The Edwards identity point: small order, no usable agreement.
        let mut bytes = [0u8; 32];
        bytes[0] = 1;
        let bogus = PublicKey::from_bytes(bytes);
        let err = encrypt_direct(b"x", &bogus, &alice, &EncryptOptions::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    proptest! {
        #[test]
        fn prop_direct_roundtrip(
            a in any::<[u8; 32]>(),
            b in any::<[u8; 32]>(),
            plaintext in prop::collection::vec(any::<u8>(), 0..1024),
        ) {
            let alice = Identity::from_seed(&a);
            let bob = Identity::from_seed(&b);
            let result = encrypt_direct(&plaintext, &bob.public_key(), &alice, &EncryptOptions::default()).unwrap();
            prop_assert_eq!(decrypt_direct(&result, &bob).unwrap(), plaintext);
        }
    }
}
