//! Versioned key rings shared by signature groups and shared keys.
//!
//! A ring holds, for each key version, a fingerprint of that version's
//! symmetric key and one wrapped copy per holder. The symmetric keys
//! themselves are never stored; whoever needs one unwraps their own copy.
//!
//! Each wrap binds `label || version` as associated data, so a share cannot
//! be moved to another group, key, or version.

use serde::{Deserialize, Serialize};

use sable_core::{
    now_millis, unwrap_key, wrap_key, EncryptionKey, Identity, KeyFingerprint, KeyVersion,
    PublicKey, WrappedKey, INITIAL_KEY_VERSION,
};

use crate::error::{PermsError, Result};

/// One key version and its wrapped copies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyEpoch {
    pub version: KeyVersion,
    pub fingerprint: KeyFingerprint,
    pub shares: Vec<WrappedKey>,
    pub created_at: i64,
}

impl KeyEpoch {
    /// The share wrapped for `holder`, if any.
    pub fn share_for(&self, holder: &PublicKey) -> Option<&WrappedKey> {
        self.shares.iter().find(|s| s.recipient == *holder)
    }
}

/// The full version history of one group or shared key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyRing {
    label: Vec<u8>,
    current_version: KeyVersion,
    epochs: Vec<KeyEpoch>,
}

impl KeyRing {
    /// Create version 1 with a fresh key wrapped for every recipient.
    ///
    /// Returns the ring and the new key (for immediate use by the creator).
    pub fn genesis(
        label: Vec<u8>,
        recipients: &[PublicKey],
        sender: &Identity,
    ) -> Result<(Self, EncryptionKey)> {
        let mut ring = Self {
            label,
            current_version: INITIAL_KEY_VERSION,
            epochs: Vec::new(),
        };
        let key = EncryptionKey::generate();
        let epoch = ring.seal_epoch(INITIAL_KEY_VERSION, &key, recipients, sender)?;
        ring.epochs.push(epoch);
        Ok((ring, key))
    }

    /// The current key version.
    pub fn current_version(&self) -> KeyVersion {
        self.current_version
    }

    /// All versions, oldest first.
    pub fn epochs(&self) -> &[KeyEpoch] {
        &self.epochs
    }

    /// The epoch for `version`.
    pub fn epoch(&self, version: KeyVersion) -> Option<&KeyEpoch> {
        self.epochs.iter().find(|e| e.version == version)
    }

    /// Whether `holder` has a wrapped copy of `version`.
    pub fn holds(&self, version: KeyVersion, holder: &PublicKey) -> bool {
        self.epoch(version)
            .map(|e| e.share_for(holder).is_some())
            .unwrap_or(false)
    }

    /// Associated data bound into every wrap of `version`.
    pub fn wrap_context(&self, version: KeyVersion) -> Vec<u8> {
        let mut context = self.label.clone();
        context.extend_from_slice(&version.to_be_bytes());
        context
    }

    /// Recover the key of `version` with `holder`'s own wrapped copy.
    ///
    /// No copy for the holder at that version is a membership error; a copy
    /// that fails to unwrap or to match the fingerprint is an authentication
    /// error.
    pub fn open(&self, version: KeyVersion, holder: &Identity) -> Result<EncryptionKey> {
        let holder_public = holder.public_key();
        let epoch = self.epoch(version).ok_or_else(|| {
            PermsError::NotAMember(format!("no key material for version {}", version))
        })?;
        let share = epoch.share_for(&holder_public).ok_or_else(|| {
            PermsError::NotAMember(format!(
                "{:?} holds no key for version {}",
                holder_public, version
            ))
        })?;

        let key = unwrap_key(share, holder, &self.wrap_context(version))?;
        if !epoch.fingerprint.matches(&key) {
            return Err(sable_core::CoreError::Authentication(
                "unwrapped key does not match version fingerprint".into(),
            )
            .into());
        }
        Ok(key)
    }

    /// Recover the current key with `holder`'s copy.
    pub fn open_current(&self, holder: &Identity) -> Result<EncryptionKey> {
        self.open(self.current_version, holder)
    }

    /// Wrap the current key for additional holders.
    ///
    /// `key` must be the current version's key (checked by fingerprint).
    /// Existing copies for the same holder are replaced.
    pub fn grant(&mut self, key: &EncryptionKey, recipients: &[PublicKey], sender: &Identity) -> Result<()> {
        let version = self.current_version;
        let context = self.wrap_context(version);
        let epoch = self
            .epochs
            .iter_mut()
            .find(|e| e.version == version)
            .ok_or_else(|| PermsError::Validation("key ring has no current epoch".into()))?;

        if !epoch.fingerprint.matches(key) {
            return Err(PermsError::Validation(
                "grant key is not the current version".into(),
            ));
        }

        for recipient in recipients {
            let wrapped = wrap_key(key, recipient, Some(sender), &context)?;
            epoch.shares.retain(|s| s.recipient != *recipient);
            epoch.shares.push(wrapped);
        }
        Ok(())
    }

    /// Start a new version with a fresh key wrapped for exactly `recipients`.
    ///
    /// One wrap per recipient. Older epochs are kept so that holders can
    /// still read ciphertexts from the versions they were given.
    pub fn rotate(&mut self, recipients: &[PublicKey], sender: &Identity) -> Result<EncryptionKey> {
        let version = self
            .current_version
            .checked_add(1)
            .ok_or_else(|| PermsError::Validation("key version overflow".into()))?;
        let key = EncryptionKey::generate();
        let epoch = self.seal_epoch(version, &key, recipients, sender)?;
        self.epochs.push(epoch);
        self.current_version = version;
        Ok(key)
    }

    fn seal_epoch(
        &self,
        version: KeyVersion,
        key: &EncryptionKey,
        recipients: &[PublicKey],
        sender: &Identity,
    ) -> Result<KeyEpoch> {
        let context = self.wrap_context(version);
        let shares = recipients
            .iter()
            .map(|r| wrap_key(key, r, Some(sender), &context).map_err(PermsError::from))
            .collect::<Result<Vec<_>>>()?;

        Ok(KeyEpoch {
            version,
            fingerprint: key.fingerprint(),
            shares,
            created_at: now_millis(),
        })
    }
}
