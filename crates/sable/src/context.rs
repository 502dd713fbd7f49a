//! Scalable encryption contexts.
//!
//! A context is a conversation that starts as direct (pairwise) encryption
//! between its creator and one recipient. Once enough recipients have been
//! added it moves, exactly once, onto a shared key holding every participant.
//! Envelopes are always decrypted according to their own scheme, so direct
//! messages from before the move stay readable.
//!
//! Lock order is context, then shared key. Nothing in this crate takes a
//! shared-key lock and then a context lock.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sable_core::{
    decrypt_direct_as_participant, encrypt_direct, now_millis, ContextId, EncryptOptions,
    EncryptionResult, Identity, KeyId, PublicKey, SchemeHeader,
};
use sable_perms::{Capability, HolderSpec, SharedKeyManager, SharedKeySpec};
use sable_store::{Entry, Persisted, RecordKind, Registry, Store};

use crate::error::{EngineError, Result};

/// Which scheme a context currently encrypts with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextMethod {
    Direct,
    Group,
}

/// Context tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Recipient count at which a direct context moves to a shared key.
    pub auto_transition_threshold: usize,
    /// Upper bound on participants, creator included.
    pub max_members: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            auto_transition_threshold: 3,
            max_members: 50,
        }
    }
}

/// An encryption context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionContext {
    pub context_id: ContextId,
    pub name: String,
    pub description: String,
    pub creator: PublicKey,
    pub method: ContextMethod,
    pub recipients: BTreeSet<PublicKey>,
    /// Set exactly when `method` is `Group`.
    pub shared_key_id: Option<KeyId>,
    pub options: ContextOptions,
    pub revision: u64,
    pub created_at: i64,
    pub transitioned_at: Option<i64>,
}

impl EncryptionContext {
    /// Whether `public` is the creator or a current recipient.
    pub fn is_participant(&self, public: &PublicKey) -> bool {
        self.creator == *public || self.recipients.contains(public)
    }

    /// Participants, creator included.
    pub fn participant_count(&self) -> usize {
        self.recipients.len() + 1
    }

    fn group_key(&self) -> Result<KeyId> {
        self.shared_key_id.ok_or_else(|| {
            EngineError::InvalidOperation(format!(
                "context {} is in group mode without a shared key",
                self.context_id
            ))
        })
    }
}

impl Persisted for EncryptionContext {
    const KIND: RecordKind = RecordKind::EncryptionContext;

    fn record_id(&self) -> String {
        self.context_id.to_hex()
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

/// The registry of encryption contexts.
pub type ContextStore<S> = Registry<EncryptionContext, S>;

/// Manages contexts and drives their transition onto shared keys.
pub struct ContextManager<S: Store> {
    contexts: Arc<ContextStore<S>>,
    shared_keys: SharedKeyManager<S>,
    recipient_capability: Capability,
}

impl<S: Store> Clone for ContextManager<S> {
    fn clone(&self) -> Self {
        Self {
            contexts: self.contexts.clone(),
            shared_keys: self.shared_keys.clone(),
            recipient_capability: self.recipient_capability,
        }
    }
}

impl<S: Store> ContextManager<S> {
    /// Create a manager. Recipients get `recipient_capability` on the shared
    /// key when a context transitions; the creator always gets full capability.
    pub fn new(
        contexts: Arc<ContextStore<S>>,
        shared_keys: SharedKeyManager<S>,
        recipient_capability: Capability,
    ) -> Self {
        Self {
            contexts,
            shared_keys,
            recipient_capability,
        }
    }

    /// The underlying registry.
    pub fn context_store(&self) -> &Arc<ContextStore<S>> {
        &self.contexts
    }

    async fn entry(&self, context_id: &ContextId) -> Result<Entry<EncryptionContext>> {
        self.contexts
            .entry(&context_id.to_hex())
            .await?
            .ok_or_else(|| EngineError::UnknownContext(context_id.to_hex()))
    }

    /// Create a direct-mode context between `creator` and `initial_recipient`.
    pub async fn create_encryption_context(
        &self,
        name: &str,
        description: &str,
        initial_recipient: &PublicKey,
        creator: &Identity,
        options: ContextOptions,
    ) -> Result<EncryptionContext> {
        let creator_public = creator.public_key();
        if options.auto_transition_threshold < 2 {
            return Err(EngineError::InvalidOperation(format!(
                "auto transition threshold must be at least 2, got {}",
                options.auto_transition_threshold
            )));
        }
        if options.max_members < 2 {
            return Err(EngineError::Capacity {
                max: options.max_members,
                attempted: 2,
            });
        }
        if *initial_recipient == creator_public {
            return Err(EngineError::InvalidOperation(
                "the creator cannot be their own recipient".into(),
            ));
        }

        let now = now_millis();
        let context = EncryptionContext {
            context_id: ContextId::generate(),
            name: name.to_string(),
            description: description.to_string(),
            creator: creator_public,
            method: ContextMethod::Direct,
            recipients: BTreeSet::from([*initial_recipient]),
            shared_key_id: None,
            options,
            revision: 1,
            created_at: now,
            transitioned_at: None,
        };
        self.contexts.insert(context.clone()).await?;
        info!(context = %context.context_id, creator = ?creator_public, "encryption context created");
        Ok(context)
    }

    /// Encrypt with whatever scheme the context currently uses.
    ///
    /// In direct mode the creator writes to the sole recipient and a
    /// recipient writes to the creator.
    pub async fn encrypt_in_context(
        &self,
        context_id: &ContextId,
        plaintext: &[u8],
        actor: &Identity,
        options: &EncryptOptions,
    ) -> Result<EncryptionResult> {
        let entry = self.entry(context_id).await?;
        let context = entry.lock().await;
        let actor_public = actor.public_key();
        if !context.is_participant(&actor_public) {
            warn!(context = %context_id, actor = ?actor_public, "non-participant encrypt rejected");
            return Err(EngineError::NotAParticipant(format!("{:?}", actor_public)));
        }

        match context.method {
            ContextMethod::Direct => {
                let peer = if actor_public == context.creator {
                    let mut recipients = context.recipients.iter();
                    match (recipients.next(), recipients.next()) {
                        (Some(only), None) => *only,
                        _ => {
                            return Err(EngineError::InvalidOperation(format!(
                                "direct context {} has {} recipients; the creator has no single peer",
                                context_id,
                                context.recipients.len()
                            )))
                        }
                    }
                } else {
                    context.creator
                };
                debug!(context = %context_id, "context encrypt (direct)");
                Ok(encrypt_direct(plaintext, &peer, actor, options)?)
            }
            ContextMethod::Group => {
                let key_id = context.group_key()?;
                debug!(context = %context_id, key = ?key_id, "context encrypt (shared key)");
                Ok(self
                    .shared_keys
                    .encrypt_with_shared_key(plaintext, &key_id, actor, options)
                    .await?)
            }
        }
    }

    /// Decrypt according to the envelope's own scheme.
    pub async fn decrypt_in_context(
        &self,
        context_id: &ContextId,
        result: &EncryptionResult,
        actor: &Identity,
    ) -> Result<Vec<u8>> {
        let entry = self.entry(context_id).await?;
        let context = entry.lock().await;

        match &result.header {
            SchemeHeader::Direct { sender, recipient } => {
                if *sender != context.creator && *recipient != context.creator {
                    return Err(EngineError::InvalidOperation(format!(
                        "direct envelope does not involve the creator of context {}",
                        context_id
                    )));
                }
                Ok(decrypt_direct_as_participant(result, actor)?)
            }
            SchemeHeader::Shared { key_id, .. } => {
                if context.shared_key_id != Some(*key_id) {
                    return Err(EngineError::InvalidOperation(format!(
                        "shared-key envelope does not belong to context {}",
                        context_id
                    )));
                }
                Ok(self.shared_keys.decrypt_with_shared_key(result, actor).await?)
            }
            _ => Err(EngineError::InvalidOperation(format!(
                "{} envelopes cannot be decrypted in a context",
                result.method()
            ))),
        }
    }

    /// Add recipients, moving the context onto a shared key once the
    /// recipient count reaches the threshold.
    ///
    /// In direct mode only the creator may add. In group mode the new
    /// recipients are added as holders, which needs `can_share`.
    pub async fn add_recipients_to_context(
        &self,
        context_id: &ContextId,
        publics: &[PublicKey],
        actor: &Identity,
    ) -> Result<EncryptionContext> {
        let entry = self.entry(context_id).await?;
        let mut current = entry.lock().await;
        let actor_public = actor.public_key();

        if current.method == ContextMethod::Direct && actor_public != current.creator {
            warn!(context = %context_id, actor = ?actor_public, "recipient add rejected");
            return Err(EngineError::NotAuthorized(
                "only the creator may add recipients to a direct context".into(),
            ));
        }
        if publics.is_empty() {
            return Err(EngineError::InvalidOperation("no recipients given".into()));
        }
        let mut next = current.clone();
        for public in publics {
            if next.is_participant(public) {
                return Err(EngineError::InvalidOperation(format!(
                    "{:?} is already part of context {}",
                    public, context_id
                )));
            }
            next.recipients.insert(*public);
        }
        if next.participant_count() > next.options.max_members {
            return Err(EngineError::Capacity {
                max: next.options.max_members,
                attempted: next.participant_count(),
            });
        }
        next.revision += 1;

        match current.method {
            ContextMethod::Direct => {
                if next.recipients.len() >= next.options.auto_transition_threshold {
                    let key_id = self.transition(&next, actor).await?;
                    next.method = ContextMethod::Group;
                    next.shared_key_id = Some(key_id);
                    next.transitioned_at = Some(now_millis());
                    info!(
                        context = %context_id,
                        key = ?key_id,
                        recipients = next.recipients.len(),
                        "context moved to shared-key encryption"
                    );
                }
            }
            ContextMethod::Group => {
                let key_id = current.group_key()?;
                let holders: Vec<HolderSpec> = publics
                    .iter()
                    .map(|p| HolderSpec::new(*p, self.recipient_capability))
                    .collect();
                self.shared_keys.add_holders(&key_id, &holders, actor).await?;
            }
        }

        self.contexts.commit(&mut current, next).await?;
        info!(context = %context_id, added = publics.len(), "context recipients added");
        Ok(current.clone())
    }

    async fn transition(&self, context: &EncryptionContext, creator: &Identity) -> Result<KeyId> {
        let spec = SharedKeySpec::new(context.name.clone(), "encryption-context")
            .with_property("context_id", context.context_id.to_hex());
        let holders: Vec<HolderSpec> = context
            .recipients
            .iter()
            .map(|p| HolderSpec::new(*p, self.recipient_capability))
            .collect();
        let key = self.shared_keys.create_shared_key(spec, &holders, creator).await?;
        Ok(key.key_id)
    }

    /// Remove recipients from a group-mode context.
    ///
    /// Direct contexts have a single counterpart and reject removal. A context
    /// stays in group mode however few recipients remain.
    pub async fn remove_recipients_from_context(
        &self,
        context_id: &ContextId,
        publics: &[PublicKey],
        actor: &Identity,
        rotate_keys: bool,
    ) -> Result<EncryptionContext> {
        let entry = self.entry(context_id).await?;
        let mut current = entry.lock().await;

        if current.method == ContextMethod::Direct {
            return Err(EngineError::InvalidOperation(format!(
                "context {} is still direct; recipients cannot be removed",
                context_id
            )));
        }
        for public in publics {
            if !current.recipients.contains(public) {
                return Err(EngineError::NotAParticipant(format!(
                    "{:?} is not a recipient of context {}",
                    public, context_id
                )));
            }
        }

        let key_id = current.group_key()?;
        self.shared_keys
            .remove_holders(&key_id, publics, actor, rotate_keys)
            .await?;

        let mut next = current.clone();
        for public in publics {
            next.recipients.remove(public);
        }
        next.revision += 1;
        self.contexts.commit(&mut current, next).await?;
        info!(
            context = %context_id,
            removed = publics.len(),
            rotated = rotate_keys,
            "context recipients removed"
        );
        Ok(current.clone())
    }

    /// Snapshot of a context.
    pub async fn get_context(&self, context_id: &ContextId) -> Result<EncryptionContext> {
        let entry = self.entry(context_id).await?;
        let context = entry.lock().await;
        Ok(context.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sable_core::{encrypt_personal, EncryptionMethod, ErrorKind};
    use sable_perms::KeyStore;
    use sable_store::MemoryStore;

    fn manager() -> ContextManager<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let keys = SharedKeyManager::new(Arc::new(KeyStore::new(store.clone())));
        ContextManager::new(
            Arc::new(ContextStore::new(store)),
            keys,
            Capability::read_write(),
        )
    }

    fn opts() -> EncryptOptions {
        EncryptOptions::default()
    }

    async fn direct_context(
        mgr: &ContextManager<MemoryStore>,
        creator: &Identity,
        recipient: &Identity,
    ) -> EncryptionContext {
        mgr.create_encryption_context(
            "chat",
            "a conversation",
            &recipient.public_key(),
            creator,
            ContextOptions::default(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_starts_direct() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        assert_eq!(ctx.method, ContextMethod::Direct);
        assert_eq!(ctx.recipients.len(), 1);
        assert!(ctx.shared_key_id.is_none());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_options() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();

        let err = mgr
            .create_encryption_context(
                "c",
                "",
                &bob.public_key(),
                &alice,
                ContextOptions {
                    auto_transition_threshold: 1,
                    max_members: 50,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = mgr
            .create_encryption_context("c", "", &alice.public_key(), &alice, ContextOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_direct_both_directions() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let to_bob = mgr.encrypt_in_context(&ctx.context_id, b"hi bob", &alice, &opts()).await.unwrap();
        assert_eq!(to_bob.method(), EncryptionMethod::Direct);
        assert_eq!(mgr.decrypt_in_context(&ctx.context_id, &to_bob, &bob).await.unwrap(), b"hi bob");
        assert_eq!(mgr.decrypt_in_context(&ctx.context_id, &to_bob, &alice).await.unwrap(), b"hi bob");

        let to_alice = mgr.encrypt_in_context(&ctx.context_id, b"hi alice", &bob, &opts()).await.unwrap();
        assert_eq!(mgr.decrypt_in_context(&ctx.context_id, &to_alice, &alice).await.unwrap(), b"hi alice");
    }

    #[tokio::test]
    async fn test_outsider_rejected() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let eve = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let err = mgr.encrypt_in_context(&ctx.context_id, b"x", &eve, &opts()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Membership);

        let sealed = mgr.encrypt_in_context(&ctx.context_id, b"x", &alice, &opts()).await.unwrap();
        let err = mgr.decrypt_in_context(&ctx.context_id, &sealed, &eve).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_transition_at_threshold() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let carol = Identity::generate();
        let dave = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let ctx2 = mgr
            .add_recipients_to_context(&ctx.context_id, &[carol.public_key()], &alice)
            .await
            .unwrap();
        assert_eq!(ctx2.method, ContextMethod::Direct);

        // Two recipients and no transition yet: the creator has no single peer.
        let err = mgr.encrypt_in_context(&ctx.context_id, b"x", &alice, &opts()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let ctx3 = mgr
            .add_recipients_to_context(&ctx.context_id, &[dave.public_key()], &alice)
            .await
            .unwrap();
        assert_eq!(ctx3.method, ContextMethod::Group);
        assert!(ctx3.shared_key_id.is_some());
        assert!(ctx3.transitioned_at.is_some());

        let sealed = mgr.encrypt_in_context(&ctx.context_id, b"all", &alice, &opts()).await.unwrap();
        assert!(matches!(
            sealed.header,
            SchemeHeader::Shared { key_id, .. } if Some(key_id) == ctx3.shared_key_id
        ));
        for who in [&alice, &bob, &carol, &dave] {
            assert_eq!(mgr.decrypt_in_context(&ctx.context_id, &sealed, who).await.unwrap(), b"all");
        }
    }

    #[tokio::test]
    async fn test_direct_history_survives_transition() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let old = mgr.encrypt_in_context(&ctx.context_id, b"before", &alice, &opts()).await.unwrap();
        mgr.add_recipients_to_context(
            &ctx.context_id,
            &[Identity::generate().public_key(), Identity::generate().public_key()],
            &alice,
        )
        .await
        .unwrap();

        assert_eq!(mgr.decrypt_in_context(&ctx.context_id, &old, &bob).await.unwrap(), b"before");
    }

    #[tokio::test]
    async fn test_transition_is_monotonic() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let carol = Identity::generate();
        let dave = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;
        mgr.add_recipients_to_context(&ctx.context_id, &[carol.public_key(), dave.public_key()], &alice)
            .await
            .unwrap();

        let after = mgr
            .remove_recipients_from_context(
                &ctx.context_id,
                &[carol.public_key(), dave.public_key()],
                &alice,
                true,
            )
            .await
            .unwrap();
        assert_eq!(after.recipients.len(), 1);
        assert_eq!(after.method, ContextMethod::Group);

        let sealed = mgr.encrypt_in_context(&ctx.context_id, b"still group", &alice, &opts()).await.unwrap();
        assert_eq!(sealed.method(), EncryptionMethod::Shared);
        assert_eq!(mgr.decrypt_in_context(&ctx.context_id, &sealed, &bob).await.unwrap(), b"still group");
        let err = mgr.decrypt_in_context(&ctx.context_id, &sealed, &carol).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Membership);
    }

    #[tokio::test]
    async fn test_remove_while_direct_rejected() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let err = mgr
            .remove_recipients_from_context(&ctx.context_id, &[bob.public_key()], &alice, true)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_capacity_and_duplicates() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = mgr
            .create_encryption_context(
                "small",
                "",
                &bob.public_key(),
                &alice,
                ContextOptions {
                    auto_transition_threshold: 3,
                    max_members: 3,
                },
            )
            .await
            .unwrap();

        let err = mgr
            .add_recipients_to_context(&ctx.context_id, &[bob.public_key()], &alice)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = mgr
            .add_recipients_to_context(
                &ctx.context_id,
                &[Identity::generate().public_key(), Identity::generate().public_key()],
                &alice,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Capacity);

        // Nothing changed.
        let current = mgr.get_context(&ctx.context_id).await.unwrap();
        assert_eq!(current.revision, 1);
        assert_eq!(current.recipients.len(), 1);
    }

    #[tokio::test]
    async fn test_recipient_cannot_add_while_direct() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let err = mgr
            .add_recipients_to_context(&ctx.context_id, &[Identity::generate().public_key()], &bob)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Permission);
    }

    #[tokio::test]
    async fn test_foreign_envelopes_rejected() {
        let mgr = manager();
        let alice = Identity::generate();
        let bob = Identity::generate();
        let ctx = direct_context(&mgr, &alice, &bob).await;

        let personal = encrypt_personal(b"mine", &alice, &opts()).unwrap();
        let err = mgr.decrypt_in_context(&ctx.context_id, &personal, &alice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err = mgr
            .get_context(&ContextId::generate())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Membership);
    }
}
