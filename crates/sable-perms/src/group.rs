//! Signature groups: role-based group encryption.
//!
//! Groups are values. Every mutating operation takes the current group and
//! returns a new one with a bumped revision; the input is left untouched, so
//! callers can keep earlier versions around.
//!
//! Lifecycle: created (version 1, owner and initial members wrapped) →
//! member added (wrapped at the current version, version unchanged) →
//! member removed, either without rotation (membership shrinks, version
//! unchanged) or with rotation (new version wrapped for the remaining
//! members only).

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sable_core::{
    now_millis, EncryptOptions, EncryptionMethod, EncryptionResult, GroupId, Identity, KeyVersion,
    PublicKey, SchemeHeader,
};
use sable_store::{Persisted, RecordKind};

use crate::error::{PermsError, Result};
use crate::keyring::KeyRing;
use crate::role::{can_encrypt, can_manage_members, can_manage_role, can_rotate_keys, Role};

/// Group behaviour switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOptions {
    /// Whether members may be added or removed after creation.
    pub allow_dynamic_membership: bool,
    /// Upper bound on members, owner included.
    pub max_members: usize,
    /// Sign every envelope and require a valid signature on decrypt.
    pub require_signature_verification: bool,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            allow_dynamic_membership: true,
            max_members: 256,
            require_signature_verification: false,
        }
    }
}

/// A public key and the role it should get.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSpec {
    pub public_key: PublicKey,
    pub role: Role,
}

impl MemberSpec {
    pub fn new(public_key: PublicKey, role: Role) -> Self {
        Self { public_key, role }
    }
}

/// A current member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMember {
    pub public_key: PublicKey,
    pub role: Role,
    /// First key version this member was given.
    pub joined_at_version: KeyVersion,
    pub joined_at: i64,
}

/// A signature group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureGroup {
    pub group_id: GroupId,
    pub name: String,
    pub owner: PublicKey,
    pub members: Vec<GroupMember>,
    pub keys: KeyRing,
    pub options: GroupOptions,
    pub revision: u64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl SignatureGroup {
    /// The current key version.
    pub fn key_version(&self) -> KeyVersion {
        self.keys.current_version()
    }

    /// Look up a member.
    pub fn member(&self, public_key: &PublicKey) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.public_key == *public_key)
    }

    /// The role of `public_key`, if a member.
    pub fn role_of(&self, public_key: &PublicKey) -> Option<Role> {
        self.member(public_key).map(|m| m.role)
    }

    /// Whether `public_key` is a current member.
    pub fn is_member(&self, public_key: &PublicKey) -> bool {
        self.member(public_key).is_some()
    }

    /// Number of members, owner included.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    fn member_keys(&self) -> Vec<PublicKey> {
        self.members.iter().map(|m| m.public_key).collect()
    }

    fn next_revision(&self) -> Self {
        let mut next = self.clone();
        next.revision += 1;
        next.updated_at = now_millis();
        next
    }
}

impl Persisted for SignatureGroup {
    const KIND: RecordKind = RecordKind::SignatureGroup;

    fn record_id(&self) -> String {
        self.group_id.to_hex()
    }

    fn revision(&self) -> u64 {
        self.revision
    }
}

fn ring_label(group_id: &GroupId) -> Vec<u8> {
    let mut label = b"sable/group/".to_vec();
    label.extend_from_slice(group_id.as_bytes());
    label
}

fn actor_role(group: &SignatureGroup, actor: &PublicKey, action: &str) -> Result<Role> {
    group.role_of(actor).ok_or_else(|| {
        warn!(group = ?group.group_id, actor = ?actor, action, "non-member rejected");
        PermsError::PermissionDenied(format!("{:?} is not a member and cannot {}", actor, action))
    })
}

fn deny(group: &SignatureGroup, actor: &PublicKey, role: Role, action: &str) -> PermsError {
    warn!(group = ?group.group_id, actor = ?actor, ?role, action, "permission denied");
    PermsError::PermissionDenied(format!("{:?} role does not have permission to {}", role, action))
}

/// Create a group owned by `owner` with key version 1.
pub fn create_signature_group(
    name: &str,
    owner: &Identity,
    initial_members: &[MemberSpec],
    options: GroupOptions,
) -> Result<SignatureGroup> {
    let owner_public = owner.public_key();
    if name.trim().is_empty() {
        return Err(PermsError::Validation("group name must not be empty".into()));
    }

    let mut seen = vec![owner_public];
    for spec in initial_members {
        if spec.role == Role::Owner {
            return Err(PermsError::Validation(
                "initial members cannot be given the owner role".into(),
            ));
        }
        if seen.contains(&spec.public_key) {
            return Err(PermsError::Validation(format!(
                "duplicate member {:?}",
                spec.public_key
            )));
        }
        seen.push(spec.public_key);
    }

    if seen.len() > options.max_members {
        return Err(PermsError::Capacity {
            max: options.max_members,
            attempted: seen.len(),
        });
    }

    let group_id = GroupId::generate();
    let (keys, _) = KeyRing::genesis(ring_label(&group_id), &seen, owner)?;

    let now = now_millis();
    let mut members = vec![GroupMember {
        public_key: owner_public,
        role: Role::Owner,
        joined_at_version: keys.current_version(),
        joined_at: now,
    }];
    members.extend(initial_members.iter().map(|spec| GroupMember {
        public_key: spec.public_key,
        role: spec.role,
        joined_at_version: keys.current_version(),
        joined_at: now,
    }));

    info!(group = ?group_id, owner = ?owner_public, members = members.len(), "signature group created");

    Ok(SignatureGroup {
        group_id,
        name: name.to_string(),
        owner: owner_public,
        members,
        keys,
        options,
        revision: 1,
        created_at: now,
        updated_at: now,
    })
}

/// Encrypt to the group at its current key version.
///
/// Non-members and viewers are refused.
pub fn encrypt_for_signature_group(
    plaintext: &[u8],
    group: &SignatureGroup,
    actor: &Identity,
    options: &EncryptOptions,
) -> Result<EncryptionResult> {
    let actor_public = actor.public_key();
    let role = actor_role(group, &actor_public, "encrypt")?;
    if !can_encrypt(role) {
        return Err(deny(group, &actor_public, role, "encrypt"));
    }

    let key_version = group.key_version();
    let key = group.keys.open(key_version, actor)?;
    let header = SchemeHeader::Group {
        group_id: group.group_id,
        key_version,
        sender: actor_public,
    };

    let mut result = EncryptionResult::seal(&key, header, plaintext, options)?;
    if group.options.require_signature_verification {
        result.sign(actor)?;
    }

    debug!(group = ?group.group_id, key_version, sender = ?actor_public, "group encrypt");
    Ok(result)
}

/// Decrypt a group envelope.
///
/// The caller needs a wrapped copy of the envelope's key version; without
/// one the call fails with a membership error. Signatures are checked when
/// present, and required when the group asks for them; a signed envelope is
/// only accepted from a current member whose role may encrypt.
pub fn decrypt_signature_group_data(
    result: &EncryptionResult,
    group: &SignatureGroup,
    member: &Identity,
) -> Result<Vec<u8>> {
    result.expect_method(EncryptionMethod::Group)?;
    let SchemeHeader::Group {
        group_id,
        key_version,
        sender,
    } = &result.header
    else {
        return Err(PermsError::Validation("malformed group header".into()));
    };

    if *group_id != group.group_id {
        return Err(PermsError::NotAMember(format!(
            "envelope belongs to group {:?}, not {:?}",
            group_id, group.group_id
        )));
    }

    let member_public = member.public_key();
    if !group.keys.holds(*key_version, &member_public) {
        return Err(PermsError::NotAMember(format!(
            "{:?} holds no key for version {} of group {:?}",
            member_public, key_version, group.group_id
        )));
    }

    if result.signature.is_some() || group.options.require_signature_verification {
        result.verify_signature(sender)?;
        let sender_role = actor_role(group, sender, "send to the group")?;
        if !can_encrypt(sender_role) {
            return Err(deny(group, sender, sender_role, "send to the group"));
        }
    }

    let key = group.keys.open(*key_version, member)?;
    let plaintext = result.open(&key)?;
    debug!(group = ?group.group_id, key_version, member = ?member_public, "group decrypt");
    Ok(plaintext)
}

fn check_dynamic(group: &SignatureGroup, actor: &PublicKey) -> Result<()> {
    if !group.options.allow_dynamic_membership {
        warn!(group = ?group.group_id, actor = ?actor, "membership is fixed");
        return Err(PermsError::PermissionDenied(
            "group does not allow dynamic membership".into(),
        ));
    }
    Ok(())
}

/// Add a member, wrapping the current key version for them.
///
/// The new member cannot read ciphertexts from earlier versions.
pub fn add_member_to_signature_group(
    group: &SignatureGroup,
    spec: &MemberSpec,
    actor: &Identity,
) -> Result<SignatureGroup> {
    let actor_public = actor.public_key();
    check_dynamic(group, &actor_public)?;

    let role = actor_role(group, &actor_public, "manage members")?;
    if !can_manage_members(role) {
        return Err(deny(group, &actor_public, role, "manage members"));
    }
    if !can_manage_role(role, spec.role) {
        return Err(deny(group, &actor_public, role, "assign this role"));
    }
    if group.is_member(&spec.public_key) {
        return Err(PermsError::Validation(format!(
            "{:?} is already a member",
            spec.public_key
        )));
    }
    if group.member_count() + 1 > group.options.max_members {
        return Err(PermsError::Capacity {
            max: group.options.max_members,
            attempted: group.member_count() + 1,
        });
    }

    let mut next = group.next_revision();
    let key = next.keys.open_current(actor)?;
    next.keys.grant(&key, &[spec.public_key], actor)?;
    next.members.push(GroupMember {
        public_key: spec.public_key,
        role: spec.role,
        joined_at_version: next.key_version(),
        joined_at: next.updated_at,
    });

    info!(
        group = ?group.group_id,
        member = ?spec.public_key,
        role = ?spec.role,
        key_version = next.key_version(),
        "member added"
    );
    Ok(next)
}

/// Remove a member, optionally rotating to a key they never receive.
///
/// Without rotation the removed member keeps every key they were given.
pub fn remove_member_from_signature_group(
    group: &SignatureGroup,
    target: &PublicKey,
    actor: &Identity,
    rotate_keys: bool,
) -> Result<SignatureGroup> {
    let actor_public = actor.public_key();
    check_dynamic(group, &actor_public)?;

    let role = actor_role(group, &actor_public, "manage members")?;
    if !can_manage_members(role) {
        return Err(deny(group, &actor_public, role, "manage members"));
    }
    let target_role = group
        .role_of(target)
        .ok_or_else(|| PermsError::NotAMember(format!("{:?} is not a member", target)))?;
    if !can_manage_role(role, target_role) {
        return Err(deny(group, &actor_public, role, "remove this member"));
    }

    let mut next = group.next_revision();
    next.members.retain(|m| m.public_key != *target);
    if rotate_keys {
        let remaining = next.member_keys();
        next.keys.rotate(&remaining, actor)?;
    }

    info!(
        group = ?group.group_id,
        member = ?target,
        rotated = rotate_keys,
        key_version = next.key_version(),
        "member removed"
    );
    Ok(next)
}

/// Force a rotation with no membership change.
pub fn rotate_group_keys(group: &SignatureGroup, actor: &Identity) -> Result<SignatureGroup> {
    let actor_public = actor.public_key();
    let role = actor_role(group, &actor_public, "rotate keys")?;
    if !can_rotate_keys(role) {
        return Err(deny(group, &actor_public, role, "rotate keys"));
    }

    let mut next = group.next_revision();
    let members = next.member_keys();
    next.keys.rotate(&members, actor)?;

    info!(group = ?group.group_id, key_version = next.key_version(), "group keys rotated");
    Ok(next)
}
