//! The encrypted envelope returned by every encrypt operation.
//!
//! An [`EncryptionResult`] carries a tagged [`SchemeHeader`] naming the
//! scheme and everything needed to find the key (sender/recipient, group and
//! version, shared key id and version). The header, caller metadata,
//! compression flag, format and envelope version are all bound into the AEAD
//! associated data.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::compression;
use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{CoreError, Result};
use crate::identity::{Identity, PublicKey};
use crate::signing::{sign_data, verify_signature, Signature};
use crate::types::{now_millis, GroupId, KeyId, KeyVersion};

/// Current envelope version.
pub const ENVELOPE_VERSION: u8 = 1;

/// Caller-supplied metadata carried alongside the ciphertext.
pub type Metadata = BTreeMap<String, String>;

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// Which scheme produced an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EncryptionMethod {
    Personal,
    Direct,
    Group,
    Shared,
}

impl fmt::Display for EncryptionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EncryptionMethod::Personal => "personal",
            EncryptionMethod::Direct => "direct",
            EncryptionMethod::Group => "group",
            EncryptionMethod::Shared => "shared",
        };
        f.write_str(name)
    }
}

/// Scheme tag plus the data needed to locate the decryption key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchemeHeader {
    Personal,
    Direct {
        sender: PublicKey,
        recipient: PublicKey,
    },
    Group {
        group_id: GroupId,
        key_version: KeyVersion,
        sender: PublicKey,
    },
    Shared {
        key_id: KeyId,
        key_version: KeyVersion,
    },
}

impl SchemeHeader {
    /// The scheme this header belongs to.
    pub fn method(&self) -> EncryptionMethod {
        match self {
            SchemeHeader::Personal => EncryptionMethod::Personal,
            SchemeHeader::Direct { .. } => EncryptionMethod::Direct,
            SchemeHeader::Group { .. } => EncryptionMethod::Group,
            SchemeHeader::Shared { .. } => EncryptionMethod::Shared,
        }
    }
}

/// Options accepted by every encrypt operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptOptions {
    /// zstd-compress the plaintext before encryption.
    pub compress: bool,
    /// Carry `metadata` in the envelope. When false it is dropped.
    pub include_metadata: bool,
    pub metadata: Metadata,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self {
            compress: false,
            include_metadata: true,
            metadata: Metadata::new(),
        }
    }
}

impl EncryptOptions {
    /// Set compression.
    pub fn compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// Set whether metadata is carried.
    pub fn include_metadata(mut self, include: bool) -> Self {
        self.include_metadata = include;
        self
    }

    /// Add one metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// An encrypted payload envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionResult {
    pub version: u8,
    pub format: EncryptionFormat,
    pub header: SchemeHeader,
    pub nonce: EncryptionNonce,
    /// Ciphertext including the authentication tag.
    pub ciphertext: Vec<u8>,
    pub compressed: bool,
    pub metadata: Metadata,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Detached Ed25519 signature over [`EncryptionResult::signable_bytes`].
    pub signature: Option<Signature>,
}

#[derive(Serialize)]
struct AssociatedData<'a> {
    version: u8,
    format: EncryptionFormat,
    header: &'a SchemeHeader,
    compressed: bool,
    metadata: &'a Metadata,
}

impl EncryptionResult {
    /// Encrypt `plaintext` under `key`, producing an envelope tagged `header`.
    pub fn seal(
        key: &EncryptionKey,
        header: SchemeHeader,
        plaintext: &[u8],
        options: &EncryptOptions,
    ) -> Result<Self> {
        let body = if options.compress {
            compression::compress(plaintext)?
        } else {
            plaintext.to_vec()
        };

        let metadata = if options.include_metadata {
            options.metadata.clone()
        } else {
            Metadata::new()
        };

        let mut result = Self {
            version: ENVELOPE_VERSION,
            format: EncryptionFormat::ChaCha20Poly1305,
            header,
            nonce: EncryptionNonce::generate(),
            ciphertext: Vec::new(),
            compressed: options.compress,
            metadata,
            created_at: now_millis(),
            signature: None,
        };

        let aad = result.associated_data()?;
        result.ciphertext = key.encrypt(&body, &result.nonce, &aad)?;
        Ok(result)
    }

    /// Decrypt with `key`, checking the associated data and decompressing.
    pub fn open(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        if self.version != ENVELOPE_VERSION {
            return Err(CoreError::Validation(format!(
                "unsupported envelope version {}",
                self.version
            )));
        }

        let aad = self.associated_data()?;
        let body = match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce, &aad)?,
        };

        if self.compressed {
            compression::decompress(&body)
        } else {
            Ok(body)
        }
    }

    /// The scheme that produced this envelope.
    pub fn method(&self) -> EncryptionMethod {
        self.header.method()
    }

    /// Reject envelopes from another scheme.
    pub fn expect_method(&self, expected: EncryptionMethod) -> Result<()> {
        let actual = self.method();
        if actual != expected {
            return Err(CoreError::WrongMethod {
                expected: expected.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(())
    }

    /// Canonical CBOR of everything bound into the AEAD besides the body.
    pub fn associated_data(&self) -> Result<Vec<u8>> {
        let aad = AssociatedData {
            version: self.version,
            format: self.format,
            header: &self.header,
            compressed: self.compressed,
            metadata: &self.metadata,
        };
        let mut buf = Vec::new();
        ciborium::into_writer(&aad, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Bytes covered by the detached signature: aad, nonce, ciphertext.
    pub fn signable_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = self.associated_data()?;
        bytes.extend_from_slice(self.nonce.as_bytes());
        bytes.extend_from_slice(&self.ciphertext);
        Ok(bytes)
    }

    /// Attach a signature by `signer`.
    pub fn sign(&mut self, signer: &Identity) -> Result<()> {
        let message = self.signable_bytes()?;
        self.signature = Some(sign_data(&message, signer));
        Ok(())
    }

    /// Check the attached signature against `signer`.
    ///
    /// A missing or invalid signature is an authentication failure.
    pub fn verify_signature(&self, signer: &PublicKey) -> Result<()> {
        let signature = self.signature.as_ref().ok_or(CoreError::InvalidSignature)?;
        let message = self.signable_bytes()?;
        if verify_signature(&message, signature, signer) {
            Ok(())
        } else {
            Err(CoreError::InvalidSignature)
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf).map_err(|e| CoreError::Encoding(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))
    }
}
