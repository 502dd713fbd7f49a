//! # Sable Permissions
//!
//! Access control for multi-party encryption.
//!
//! ## Overview
//!
//! Two membership models share one key-distribution mechanism:
//!
//! - **Signature groups**: members carry a [`Role`]; the owner and admins
//!   manage membership and rotate keys.
//! - **Shared keys**: holders carry an explicit [`Capability`]; sharing can
//!   never grant more than the sharer has.
//!
//! Both keep their symmetric keys in a [`KeyRing`]: one epoch per key
//! version, each holding a fingerprint and one wrapped copy per holder.
//! Removing someone with rotation starts a new epoch they get no copy of,
//! so they keep what they could already read and nothing after.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use sable_core::{EncryptOptions, Identity};
//! use sable_perms::{
//!     create_signature_group, decrypt_signature_group_data, encrypt_for_signature_group,
//!     GroupOptions, MemberSpec, Role,
//! };
//!
//! let owner = Identity::generate();
//! let bob = Identity::generate();
//! let group = create_signature_group(
//!     "team",
//!     &owner,
//!     &[MemberSpec::new(bob.public_key(), Role::Member)],
//!     GroupOptions::default(),
//! )
//! .unwrap();
//!
//! let sealed = encrypt_for_signature_group(b"hi", &group, &owner, &EncryptOptions::default()).unwrap();
//! let opened = decrypt_signature_group_data(&sealed, &group, &bob).unwrap();
//! assert_eq!(opened, b"hi");
//! ```

pub mod capability;
pub mod error;
pub mod group;
pub mod keyring;
pub mod role;
pub mod shared;

pub use capability::Capability;
pub use error::{PermsError, Result};
pub use group::{
    add_member_to_signature_group, create_signature_group, decrypt_signature_group_data,
    encrypt_for_signature_group, remove_member_from_signature_group, rotate_group_keys,
    GroupMember, GroupOptions, MemberSpec, SignatureGroup,
};
pub use keyring::{KeyEpoch, KeyRing};
pub use role::Role;
pub use shared::{
    HolderSpec, KeyHolder, KeyStore, SharedKey, SharedKeyManager, SharedKeyMetadata, SharedKeySpec,
};
