//! The Engine: unified API for Sable.
//!
//! The Engine brings together the encryption schemes, signature groups, the
//! shared key manager and encryption contexts behind one async interface.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use sable_core::compression::MAX_DECOMPRESSED_SIZE;
use sable_core::{
    ContextId, EncryptOptions, EncryptionResult, GroupId, Identity, IdentityCredential, KeyId,
    PublicKey, Signature,
};
use sable_perms::{
    Capability, GroupOptions, HolderSpec, KeyStore, MemberSpec, SharedKey, SharedKeyManager,
    SharedKeySpec, SignatureGroup,
};
use sable_store::{MemoryStore, Persisted, PutResult, Store, StoreError, StoreExt};

use crate::context::{ContextManager, ContextOptions, ContextStore, EncryptionContext};
use crate::error::{EngineError, Result};

/// Configuration for the Engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Largest plaintext any encrypt operation accepts.
    pub max_plaintext_size: usize,
    /// Options for groups created without explicit options.
    pub default_group_options: GroupOptions,
    /// Options for contexts created without explicit options.
    pub default_context_options: ContextOptions,
    /// Capability given to context recipients when a context transitions.
    pub recipient_capability: Capability,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_plaintext_size: 16 * 1024 * 1024,
            default_group_options: GroupOptions::default(),
            default_context_options: ContextOptions::default(),
            recipient_capability: Capability::read_write(),
        }
    }
}

/// The main Engine struct.
///
/// Groups are values held by the caller; shared keys and contexts live in
/// registries backed by the store.
pub struct Engine<S: Store> {
    store: Arc<S>,
    config: EngineConfig,
    shared_keys: SharedKeyManager<S>,
    contexts: ContextManager<S>,
}

impl Engine<MemoryStore> {
    /// An engine over a fresh in-memory store.
    pub fn in_memory(config: EngineConfig) -> Self {
        Self::new(MemoryStore::new(), config)
    }
}

impl<S: Store> Engine<S> {
    /// Create a new engine instance.
    ///
    /// `max_plaintext_size` is capped at the largest payload that can still be
    /// decompressed after a compressed round trip.
    pub fn new(store: S, mut config: EngineConfig) -> Self {
        if config.max_plaintext_size > MAX_DECOMPRESSED_SIZE {
            warn!(
                requested = config.max_plaintext_size,
                max = MAX_DECOMPRESSED_SIZE,
                "max_plaintext_size capped"
            );
            config.max_plaintext_size = MAX_DECOMPRESSED_SIZE;
        }
        let store = Arc::new(store);
        let shared_keys = SharedKeyManager::new(Arc::new(KeyStore::new(store.clone())));
        let contexts = ContextManager::new(
            Arc::new(ContextStore::new(store.clone())),
            shared_keys.clone(),
            config.recipient_capability,
        );
        Self {
            store,
            config,
            shared_keys,
            contexts,
        }
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The store reference.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The shared key manager.
    pub fn shared_keys(&self) -> &SharedKeyManager<S> {
        &self.shared_keys
    }

    /// The context manager.
    pub fn contexts(&self) -> &ContextManager<S> {
        &self.contexts
    }

    fn check_size(&self, plaintext: &[u8]) -> Result<()> {
        if plaintext.len() > self.config.max_plaintext_size {
            warn!(
                size = plaintext.len(),
                max = self.config.max_plaintext_size,
                "oversized plaintext rejected"
            );
            return Err(EngineError::PayloadTooLarge {
                size: plaintext.len(),
                max: self.config.max_plaintext_size,
            });
        }
        Ok(())
    }

    /// Validate a caller-supplied credential.
    pub fn identity_from_credential(&self, credential: &IdentityCredential) -> Result<Identity> {
        Ok(Identity::from_credential(credential)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Personal and Direct
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt for the owner alone.
    pub async fn encrypt_personal(
        &self,
        plaintext: &[u8],
        owner: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        self.check_size(plaintext)?;
        Ok(sable_core::encrypt_personal(plaintext, owner, options)?)
    }

    /// Decrypt a personal envelope.
    pub async fn decrypt_personal(&self, result: &EncryptionResult, owner: &Identity) -> Result<Vec<u8>> {
        Ok(sable_core::decrypt_personal(result, owner)?)
    }

    /// Encrypt for one recipient.
    pub async fn encrypt_direct(
        &self,
        plaintext: &[u8],
        recipient: &PublicKey,
        sender: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        self.check_size(plaintext)?;
        Ok(sable_core::encrypt_direct(plaintext, recipient, sender, options)?)
    }

    /// Decrypt a direct envelope as its recipient.
    pub async fn decrypt_direct(&self, result: &EncryptionResult, recipient: &Identity) -> Result<Vec<u8>> {
        Ok(sable_core::decrypt_direct(result, recipient)?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signature Groups
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a group; `None` uses the configured default options.
    pub async fn create_signature_group(
        &self,
        name: &str,
        owner: &Identity,
        initial_members: &[MemberSpec],
        options: Option<GroupOptions>,
    ) -> Result<SignatureGroup> {
        let options = options.unwrap_or_else(|| self.config.default_group_options.clone());
        Ok(sable_perms::create_signature_group(name, owner, initial_members, options)?)
    }

    /// Encrypt to a group at its current key version.
    pub async fn encrypt_for_signature_group(
        &self,
        plaintext: &[u8],
        group: &SignatureGroup,
        actor: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        self.check_size(plaintext)?;
        Ok(sable_perms::encrypt_for_signature_group(plaintext, group, actor, options)?)
    }

    /// Decrypt a group envelope.
    pub async fn decrypt_signature_group_data(
        &self,
        result: &EncryptionResult,
        group: &SignatureGroup,
        member: &Identity,
    ) -> Result<Vec<u8>> {
        Ok(sable_perms::decrypt_signature_group_data(result, group, member)?)
    }

    /// Add a member; returns the new group value.
    pub async fn add_member_to_signature_group(
        &self,
        group: &SignatureGroup,
        member: &MemberSpec,
        actor: &Identity,
    ) -> Result<SignatureGroup> {
        Ok(sable_perms::add_member_to_signature_group(group, member, actor)?)
    }

    /// Remove a member; returns the new group value.
    pub async fn remove_member_from_signature_group(
        &self,
        group: &SignatureGroup,
        target: &PublicKey,
        actor: &Identity,
        rotate_keys: bool,
    ) -> Result<SignatureGroup> {
        Ok(sable_perms::remove_member_from_signature_group(group, target, actor, rotate_keys)?)
    }

    /// Rotate a group's key; returns the new group value.
    pub async fn rotate_group_keys(&self, group: &SignatureGroup, actor: &Identity) -> Result<SignatureGroup> {
        Ok(sable_perms::rotate_group_keys(group, actor)?)
    }

    /// Persist a group value. Older revisions than the stored one are rejected.
    pub async fn save_group(&self, group: &SignatureGroup) -> Result<()> {
        match self.store.put_value(group).await? {
            PutResult::Stale { current } => Err(StoreError::Stale {
                kind: SignatureGroup::KIND.to_string(),
                id: group.group_id.to_hex(),
                current,
                attempted: group.revision,
            }
            .into()),
            _ => {
                debug!(group = ?group.group_id, revision = group.revision, "group saved");
                Ok(())
            }
        }
    }

    /// Load a previously saved group.
    pub async fn load_group(&self, group_id: &GroupId) -> Result<Option<SignatureGroup>> {
        Ok(self.store.get_value(&group_id.to_hex()).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shared Keys
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a shared key.
    pub async fn create_shared_key(
        &self,
        spec: SharedKeySpec,
        initial_holders: &[HolderSpec],
        creator: &Identity,
    ) -> Result<SharedKey> {
        Ok(self.shared_keys.create_shared_key(spec, initial_holders, creator).await?)
    }

    /// Encrypt with a shared key.
    pub async fn encrypt_with_shared_key(
        &self,
        plaintext: &[u8],
        key_id: &KeyId,
        actor: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        self.check_size(plaintext)?;
        Ok(self
            .shared_keys
            .encrypt_with_shared_key(plaintext, key_id, actor, options)
            .await?)
    }

    /// Decrypt a shared-key envelope.
    pub async fn decrypt_with_shared_key(&self, result: &EncryptionResult, holder: &Identity) -> Result<Vec<u8>> {
        Ok(self.shared_keys.decrypt_with_shared_key(result, holder).await?)
    }

    /// Add holders to a shared key.
    pub async fn add_holders(
        &self,
        key_id: &KeyId,
        holders: &[HolderSpec],
        actor: &Identity,
    ) -> Result<SharedKey> {
        Ok(self.shared_keys.add_holders(key_id, holders, actor).await?)
    }

    /// Remove holders from a shared key.
    pub async fn remove_holders(
        &self,
        key_id: &KeyId,
        publics: &[PublicKey],
        actor: &Identity,
        rotate_keys: bool,
    ) -> Result<SharedKey> {
        Ok(self
            .shared_keys
            .remove_holders(key_id, publics, actor, rotate_keys)
            .await?)
    }

    /// Rotate a shared key.
    pub async fn rotate_shared_key(&self, key_id: &KeyId, actor: &Identity) -> Result<SharedKey> {
        Ok(self.shared_keys.rotate_key(key_id, actor).await?)
    }

    /// Snapshot of a shared key.
    pub async fn get_shared_key(&self, key_id: &KeyId) -> Result<SharedKey> {
        Ok(self.shared_keys.get_shared_key(key_id).await?)
    }

    pub async fn holder_capability(
        &self,
        key_id: &KeyId,
        public: &PublicKey,
    ) -> Result<Option<Capability>> {
        Ok(self.shared_keys.holder_capability(key_id, public).await?)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Encryption Contexts
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a context; `None` uses the configured default options.
    pub async fn create_encryption_context(
        &self,
        name: &str,
        description: &str,
        initial_recipient: &PublicKey,
        creator: &Identity,
        options: Option<ContextOptions>,
    ) -> Result<EncryptionContext> {
        let options = options.unwrap_or_else(|| self.config.default_context_options.clone());
        self.contexts
            .create_encryption_context(name, description, initial_recipient, creator, options)
            .await
    }

    /// Encrypt in a context.
    pub async fn encrypt_in_context(
        &self,
        context_id: &ContextId,
        plaintext: &[u8],
        actor: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        self.check_size(plaintext)?;
        self.contexts
            .encrypt_in_context(context_id, plaintext, actor, options)
            .await
    }

    /// Decrypt in a context.
    pub async fn decrypt_in_context(
        &self,
        context_id: &ContextId,
        result: &EncryptionResult,
        actor: &Identity,
    ) -> Result<Vec<u8>> {
        self.contexts.decrypt_in_context(context_id, result, actor).await
    }

    /// Add recipients to a context.
    pub async fn add_recipients_to_context(
        &self,
        context_id: &ContextId,
        publics: &[PublicKey],
        actor: &Identity,
    ) -> Result<EncryptionContext> {
        self.contexts
            .add_recipients_to_context(context_id, publics, actor)
            .await
    }

    /// Remove recipients from a context.
    pub async fn remove_recipients_from_context(
        &self,
        context_id: &ContextId,
        publics: &[PublicKey],
        actor: &Identity,
        rotate_keys: bool,
    ) -> Result<EncryptionContext> {
        self.contexts
            .remove_recipients_from_context(context_id, publics, actor, rotate_keys)
            .await
    }

    /// Snapshot of a context.
    pub async fn get_context(&self, context_id: &ContextId) -> Result<EncryptionContext> {
        self.contexts.get_context(context_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Signing
    // ─────────────────────────────────────────────────────────────────────────

    /// Detached Ed25519 signature over `message`.
    pub fn sign_data(&self, message: &[u8], signer: &Identity) -> Signature {
        sable_core::sign_data(message, signer)
    }

    /// Verify a detached signature given as raw bytes against a hex public key.
    ///
    /// Any malformed input is reported as `false`.
    pub fn verify_signature(&self, message: &[u8], signature: &[u8], public_key: &str) -> bool {
        let Ok(signature) = Signature::from_slice(signature) else {
            return false;
        };
        let Ok(public) = PublicKey::from_hex(public_key) else {
            return false;
        };
        sable_core::verify_signature(message, &signature, &public)
    }
}
