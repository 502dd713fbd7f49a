//! Signature-group roles and the predicates that gate each operation.
//!
//! Every permission check in [`crate::group`] goes through one of these
//! functions.

use serde::{Deserialize, Serialize};

/// A member's role. Ordered: `Owner > Admin > Member > Viewer`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    /// Decrypt only.
    Viewer,
    /// Encrypt and decrypt.
    Member,
    /// Member plus membership management and rotation.
    Admin,
    /// The creator. Full control; exactly one per group.
    Owner,
}

/// Whether `role` may encrypt to the group.
pub fn can_encrypt(role: Role) -> bool {
    role >= Role::Member
}

/// Whether `role` may decrypt group data.
pub fn can_decrypt(_role: Role) -> bool {
    true
}

/// Whether `role` may add or remove members.
pub fn can_manage_members(role: Role) -> bool {
    role >= Role::Admin
}

/// Whether `role` may force a key rotation.
pub fn can_rotate_keys(role: Role) -> bool {
    role >= Role::Admin
}

/// Whether `actor` may add or remove a member holding `target`.
///
/// Nobody assigns or removes the owner; only the owner manages admins.
pub fn can_manage_role(actor: Role, target: Role) -> bool {
    if target == Role::Owner || !can_manage_members(actor) {
        return false;
    }
    actor == Role::Owner || target < Role::Admin
}
