//! Optional zstd compression of plaintext before encryption.

use std::io::Read;

use crate::error::{CoreError, Result};

/// zstd level used when callers ask for compression.
pub const DEFAULT_LEVEL: i32 = 3;

/// Upper bound on decompressed output.
pub const MAX_DECOMPRESSED_SIZE: usize = 64 * 1024 * 1024;

/// Compress `data` at [`DEFAULT_LEVEL`].
///
/// Input larger than [`MAX_DECOMPRESSED_SIZE`] is refused, since
/// [`decompress`] could never restore it.
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() > MAX_DECOMPRESSED_SIZE {
        return Err(CoreError::Validation(format!(
            "payload of {} bytes is too large to compress (limit {})",
            data.len(),
            MAX_DECOMPRESSED_SIZE
        )));
    }
    zstd::stream::encode_all(data, DEFAULT_LEVEL).map_err(|e| CoreError::Compression(e.to_string()))
}

/// Decompress `data`, refusing output larger than [`MAX_DECOMPRESSED_SIZE`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let decoder =
        zstd::stream::read::Decoder::new(data).map_err(|e| CoreError::Compression(e.to_string()))?;

    let mut out = Vec::new();
    decoder
        .take(MAX_DECOMPRESSED_SIZE as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| CoreError::Compression(e.to_string()))?;

    if out.len() > MAX_DECOMPRESSED_SIZE {
        return Err(CoreError::Validation(format!(
            "decompressed payload exceeds {} bytes",
            MAX_DECOMPRESSED_SIZE
        )));
    }
    Ok(out)
}
