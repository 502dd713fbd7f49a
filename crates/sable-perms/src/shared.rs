//! Shared keys: capability-based multi-holder keys.
//!
//! Structurally parallel to [`crate::group`], but each holder carries an
//! explicit [`Capability`] instead of a role. The pure transitions live on
//! [`SharedKey`]; [`SharedKeyManager`] adds the registry, per-key locking and
//! write-through persistence.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sable_core::{
    now_millis, EncryptOptions, EncryptionMethod, EncryptionResult, Identity, KeyId, KeyVersion,
    PublicKey, SchemeHeader,
};
use sable_store::{Entry, Persisted, RecordKind, Registry, Store};

use crate::capability::{can_decrypt, can_encrypt, can_revoke, can_share, Capability};
use crate::error::{PermsError, Result};
use crate::keyring::KeyRing;

/// Descriptive metadata supplied when creating a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SharedKeySpec {
    pub name: String,
    pub purpose: String,
    pub algorithm: String,
    pub derivation_method: String,
    pub properties: BTreeMap<String, String>,
}

impl Default for SharedKeySpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            purpose: String::new(),
            algorithm: "chacha20-poly1305".into(),
            derivation_method: "random".into(),
            properties: BTreeMap::new(),
        }
    }
}

impl SharedKeySpec {
    pub fn new(name: impl Into<String>, purpose: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            purpose: purpose.into(),
            ..Self::default()
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Stored metadata of a shared key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedKeyMetadata {
    pub name: String,
    pub purpose: String,
    pub creator: PublicKey,
    pub algorithm: String,
    pub derivation_method: String,
    pub properties: BTreeMap<String, String>,
    pub created_at: i64,
}

/// A public key and the capability it should get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderSpec {
    pub public_key: PublicKey,
    pub capability: Capability,
}

impl HolderSpec {
    pub fn new(public_key: PublicKey, capability: Capability) -> Self {
        Self {
            public_key,
            capability,
        }
    }
}

/// A current holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyHolder {
    pub public_key: PublicKey,
    pub capability: Capability,
    pub added_at_version: KeyVersion,
    pub added_by: PublicKey,
    pub added_at: i64,
}

/// A shared key and its holders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedKey {
    pub key_id: KeyId,
    pub metadata: SharedKeyMetadata,
    pub holders: Vec<KeyHolder>,
    pub keys: KeyRing,
    pub revision: u64,
    pub updated_at: i64,
}

impl Persisted for SharedKey {
    const KIND: RecordKind = RecordKind::SharedKey;

    fn record_id(&self) -> String {
        self.key_id.to_hex()
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// The registry of shared keys.
pub type KeyStore<S> = Registry<SharedKey, S>;

fn ring_label(key_id: &KeyId) -> Vec<u8> {
    let mut label = b"sable/shared-key/".to_vec();
    label.extend_from_slice(key_id.as_bytes());
    label
}

fn deny(key_id: &KeyId, actor: &PublicKey, action: &str) -> PermsError {
    warn!(key = ?key_id, actor = ?actor, action, "capability denied");
    PermsError::PermissionDenied(format!("{:?} lacks the capability to {}", actor, action))
}

impl SharedKey {
    /// Create a key at version 1. The creator always holds full capability.
    pub fn create(spec: SharedKeySpec, initial_holders: &[HolderSpec], creator: &Identity) -> Result<Self> {
        let creator_public = creator.public_key();
        let mut recipients = vec![creator_public];
        for holder in initial_holders {
            if recipients.contains(&holder.public_key) {
                return Err(PermsError::Validation(format!(
                    "duplicate holder {:?}",
                    holder.public_key
                )));
            }
            recipients.push(holder.public_key);
        }

        let key_id = KeyId::generate();
        let (keys, _) = KeyRing::genesis(ring_label(&key_id), &recipients, creator)?;
        let version = keys.current_version();
        let now = now_millis();

        let mut holders = vec![KeyHolder {
            public_key: creator_public,
            capability: Capability::full(),
            added_at_version: version,
            added_by: creator_public,
            added_at: now,
        }];
        holders.extend(initial_holders.iter().map(|h| KeyHolder {
            public_key: h.public_key,
            capability: h.capability,
            added_at_version: version,
            added_by: creator_public,
            added_at: now,
        }));

        Ok(Self {
            key_id,
            metadata: SharedKeyMetadata {
                name: spec.name,
                purpose: spec.purpose,
                creator: creator_public,
                algorithm: spec.algorithm,
                derivation_method: spec.derivation_method,
                properties: spec.properties,
                created_at: now,
            },
            holders,
            keys,
            revision: 1,
            updated_at: now,
        })
    }

    /// The current key version.
    pub fn key_version(&self) -> KeyVersion {
        self.keys.current_version()
    }

    /// Look up a holder.
    pub fn holder(&self, public_key: &PublicKey) -> Option<&KeyHolder> {
        self.holders.iter().find(|h| h.public_key == *public_key)
    }

    fn require_holder(&self, public_key: &PublicKey) -> Result<&KeyHolder> {
        self.holder(public_key).ok_or_else(|| {
            PermsError::NotAMember(format!(
                "{:?} is not a holder of key {:?}",
                public_key, self.key_id
            ))
        })
    }

    fn next_revision(&self) -> Self {
        let mut next = self.clone();
        next.revision += 1;
        next.updated_at = now_millis();
        next
    }

    /// Encrypt under the current version.
    pub fn encrypt(&self, plaintext: &[u8], actor: &Identity, options: &EncryptOptions) -> Result<EncryptionResult> {
        let actor_public = actor.public_key();
        let holder = self.require_holder(&actor_public)?;
        if !can_encrypt(&holder.capability) {
            return Err(deny(&self.key_id, &actor_public, "encrypt"));
        }

        let key_version = self.key_version();
        let key = self.keys.open(key_version, actor)?;
        let header = SchemeHeader::Shared {
            key_id: self.key_id,
            key_version,
        };
        let result = EncryptionResult::seal(&key, header, plaintext, options)?;
        debug!(key = ?self.key_id, key_version, sender = ?actor_public, "shared-key encrypt");
        Ok(result)
    }

    /// Decrypt an envelope produced under this key.
    pub fn decrypt(&self, result: &EncryptionResult, holder: &Identity) -> Result<Vec<u8>> {
        result.expect_method(EncryptionMethod::Shared)?;
        let SchemeHeader::Shared { key_id, key_version } = &result.header else {
            return Err(PermsError::Validation("malformed shared-key header".into()));
        };
        if *key_id != self.key_id {
            return Err(PermsError::UnknownKey(key_id.to_hex()));
        }

        let holder_public = holder.public_key();
        let record = self.require_holder(&holder_public)?;
        if !can_decrypt(&record.capability) {
            return Err(deny(&self.key_id, &holder_public, "decrypt"));
        }

        let key = self.keys.open(*key_version, holder)?;
        let plaintext = result.open(&key)?;
        debug!(key = ?self.key_id, key_version, holder = ?holder_public, "shared-key decrypt");
        Ok(plaintext)
    }

    /// Add holders at the current version.
    ///
    /// The actor needs `can_share`, and cannot grant more than they have.
    pub fn with_holders_added(&self, holders: &[HolderSpec], actor: &Identity) -> Result<Self> {
        let actor_public = actor.public_key();
        let actor_capability = self.require_holder(&actor_public)?.capability;
        if !can_share(&actor_capability) {
            return Err(deny(&self.key_id, &actor_public, "share"));
        }

        let mut new_keys = Vec::with_capacity(holders.len());
        for spec in holders {
            if !spec.capability.is_subset_of(&actor_capability) {
                return Err(deny(&self.key_id, &actor_public, "grant more than its own capability"));
            }
            if self.holder(&spec.public_key).is_some() || new_keys.contains(&spec.public_key) {
                return Err(PermsError::Validation(format!(
                    "{:?} is already a holder",
                    spec.public_key
                )));
            }
            new_keys.push(spec.public_key);
        }

        let mut next = self.next_revision();
        let key = next.keys.open_current(actor)?;
        next.keys.grant(&key, &new_keys, actor)?;
        let version = next.key_version();
        next.holders.extend(holders.iter().map(|spec| KeyHolder {
            public_key: spec.public_key,
            capability: spec.capability,
            added_at_version: version,
            added_by: actor_public,
            added_at: next.updated_at,
        }));
        Ok(next)
    }

    /// Remove holders, optionally rotating to a key they never receive.
    ///
    /// The actor needs `can_revoke`; the creator cannot be removed.
    pub fn with_holders_removed(
        &self,
        publics: &[PublicKey],
        actor: &Identity,
        rotate_keys: bool,
    ) -> Result<Self> {
        let actor_public = actor.public_key();
        let actor_capability = self.require_holder(&actor_public)?.capability;
        if !can_revoke(&actor_capability) {
            return Err(deny(&self.key_id, &actor_public, "revoke"));
        }

        for public in publics {
            if *public == self.metadata.creator {
                return Err(deny(&self.key_id, &actor_public, "remove the key creator"));
            }
            self.require_holder(public)?;
        }

        let mut next = self.next_revision();
        next.holders.retain(|h| !publics.contains(&h.public_key));
        if rotate_keys {
            let remaining: Vec<PublicKey> = next.holders.iter().map(|h| h.public_key).collect();
            next.keys.rotate(&remaining, actor)?;
        }
        Ok(next)
    }

    /// Rotate with no holder change.
    pub fn with_rotated_key(&self, actor: &Identity) -> Result<Self> {
        let actor_public = actor.public_key();
        let actor_capability = self.require_holder(&actor_public)?.capability;
        if !can_revoke(&actor_capability) {
            return Err(deny(&self.key_id, &actor_public, "rotate"));
        }

        let mut next = self.next_revision();
        let holders: Vec<PublicKey> = next.holders.iter().map(|h| h.public_key).collect();
        next.keys.rotate(&holders, actor)?;
        Ok(next)
    }
}

/// Registry-backed manager for shared keys.
///
/// Operations on one key are serialized by that key's lock; different keys
/// proceed independently.
pub struct SharedKeyManager<S: Store> {
    keys: Arc<KeyStore<S>>,
}

impl<S: Store> Clone for SharedKeyManager<S> {
    fn clone(&self) -> Self {
        Self {
            keys: self.keys.clone(),
        }
    }
}

impl<S: Store> SharedKeyManager<S> {
    /// Create a manager over `keys`.
    pub fn new(keys: Arc<KeyStore<S>>) -> Self {
        Self { keys }
    }

    /// The underlying registry.
    pub fn key_store(&self) -> &Arc<KeyStore<S>> {
        &self.keys
    }

    async fn entry(&self, key_id: &KeyId) -> Result<Entry<SharedKey>> {
        self.keys
            .entry(&key_id.to_hex())
            .await?
            .ok_or_else(|| PermsError::UnknownKey(key_id.to_hex()))
    }

    /// Create and register a new shared key.
    pub async fn create_shared_key(
        &self,
        spec: SharedKeySpec,
        initial_holders: &[HolderSpec],
        creator: &Identity,
    ) -> Result<SharedKey> {
        let key = SharedKey::create(spec, initial_holders, creator)?;
        self.keys.insert(key.clone()).await?;
        info!(key = ?key.key_id, holders = key.holders.len(), "shared key created");
        Ok(key)
    }

    /// Encrypt with a registered key.
    pub async fn encrypt_with_shared_key(
        &self,
        plaintext: &[u8],
        key_id: &KeyId,
        actor: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        let entry = self.entry(key_id).await?;
        let key = entry.lock().await;
        key.encrypt(plaintext, actor, options)
    }

    /// Decrypt an envelope; the key is found from the envelope's header.
    pub async fn decrypt_with_shared_key(
        &self,
        result: &EncryptionResult,
        holder: &Identity,
    ) -> Result<Vec<u8>> {
        result.expect_method(EncryptionMethod::Shared)?;
        let SchemeHeader::Shared { key_id, .. } = &result.header else {
            return Err(PermsError::Validation("malformed shared-key header".into()));
        };
        let entry = self.entry(key_id).await?;
        let key = entry.lock().await;
        key.decrypt(result, holder)
    }

    /// Add holders to a registered key.
    pub async fn add_holders(
        &self,
        key_id: &KeyId,
        holders: &[HolderSpec],
        actor: &Identity,
    ) -> Result<SharedKey> {
        let entry = self.entry(key_id).await?;
        let mut current = entry.lock().await;
        let next = current.with_holders_added(holders, actor)?;
        self.keys.commit(&mut current, next).await?;
        info!(key = ?key_id, added = holders.len(), "shared key holders added");
        Ok(current.clone())
    }

    /// Remove holders from a registered key.
    pub async fn remove_holders(
        &self,
        key_id: &KeyId,
        publics: &[PublicKey],
        actor: &Identity,
        rotate_keys: bool,
    ) -> Result<SharedKey> {
        let entry = self.entry(key_id).await?;
        let mut current = entry.lock().await;
        let next = current.with_holders_removed(publics, actor, rotate_keys)?;
        self.keys.commit(&mut current, next).await?;
        info!(
            key = ?key_id,
            removed = publics.len(),
            rotated = rotate_keys,
            key_version = current.key_version(),
            "shared key holders removed"
        );
        Ok(current.clone())
    }

    /// Rotate a registered key.
    pub async fn rotate_key(&self, key_id: &KeyId, actor: &Identity) -> Result<SharedKey> {
        let entry = self.entry(key_id).await?;
        let mut current = entry.lock().await;
        let next = current.with_rotated_key(actor)?;
        self.keys.commit(&mut current, next).await?;
        info!(key = ?key_id, key_version = current.key_version(), "shared key rotated");
        Ok(current.clone())
    }

    /// Snapshot of a registered key.
    pub async fn get_shared_key(&self, key_id: &KeyId) -> Result<SharedKey> {
        let entry = self.entry(key_id).await?;
        let key = entry.lock().await;
        Ok(key.clone())
    }

    /// Capability of `public` on `key_id`, if they are a holder.
    pub async fn holder_capability(
        &self,
        key_id: &KeyId,
        public: &PublicKey,
    ) -> Result<Option<Capability>> {
        let entry = self.entry(key_id).await?;
        let key = entry.lock().await;
        Ok(key.holder(public).map(|h| h.capability))
    }
}
