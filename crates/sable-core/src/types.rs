//! Identifier newtypes and small shared helpers.

use std::fmt;
use std::str::FromStr;

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A key version. Starts at 1 and only ever increases.
pub type KeyVersion = u32;

/// The first version of every group or shared key.
pub const INITIAL_KEY_VERSION: KeyVersion = 1;

macro_rules! random_id {
    ($(#[$meta:meta])* $name:ident, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub [u8; 16]);

        impl $name {
            /// Generate a new random identifier.
            pub fn generate() -> Self {
                let mut bytes = [0u8; 16];
                rand::thread_rng().fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Create from raw bytes.
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(bytes)
            }

            /// Get the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; 16] {
                &self.0
            }

            /// Convert to hex string.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", $debug, &self.to_hex()[..8])
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = hex::decode(s).map_err(|e| CoreError::Decoding(e.to_string()))?;
                let arr: [u8; 16] = bytes.try_into().map_err(|_| {
                    CoreError::Decoding(format!("{} must be 16 bytes", $debug))
                })?;
                Ok(Self(arr))
            }
        }
    };
}

random_id!(
    /// Identifier of a signature group.
    GroupId,
    "GroupId"
);

random_id!(
    /// Identifier of a shared key in a key store.
    KeyId,
    "KeyId"
);

random_id!(
    /// Identifier of an encryption context.
    ContextId,
    "ContextId"
);

/// Current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}
