//! # Sable Testkit
//!
//! Testing utilities for Sable.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: RFC 8032 signing vectors pinned against the signing path
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Deterministic named parties and a ready-made engine
//!
//! ## Golden Vectors
//!
//! ```rust
//! use sable_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use sable_core::{decrypt_personal, encrypt_personal};
//! use sable_testkit::generators::{encrypt_options, identity, plaintext};
//!
//! proptest! {
//!     #[test]
//!     fn personal_round_trip(owner in identity(), data in plaintext(256), opts in encrypt_options()) {
//!         let sealed = encrypt_personal(&data, &owner, &opts).unwrap();
//!         prop_assert_eq!(decrypt_personal(&sealed, &owner).unwrap(), data);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use sable_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! assert_ne!(fixture.alice.public_key(), fixture.bob.public_key());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{alice, bob, carol, eve, multi_party_fixtures, party, TestFixture};
pub use generators::{capability, encrypt_options, identity, member_role, plaintext};
pub use vectors::{all_vectors, verify_all_vectors, GoldenVector};
