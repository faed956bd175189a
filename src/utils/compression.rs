//! Payload compression and the policy deciding when to apply it.
//!
//! The policy only compresses payloads at or above a minimum size, and only
//! keeps the compressed form when it is strictly smaller than the original.
//! Decompression is capped at `MAX_PAYLOAD_SIZE` to stop decompression bombs.

use crate::config::{DEFAULT_COMPRESSION_MIN_SIZE, MAX_PAYLOAD_SIZE};
use crate::error::{constants, MarshalError, Result};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::io::Read;
use tracing::{debug, trace};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionKind {
    Lz4,
    #[default]
    Zstd,
}

/// Maximum output size for decompression (align with MAX_PAYLOAD_SIZE to prevent DoS)
const MAX_DECOMPRESSION_SIZE: usize = MAX_PAYLOAD_SIZE;

/// Minimum entropy threshold for compression (0.0-8.0 bits per byte)
/// Data below this threshold is unlikely to compress well
const MIN_ENTROPY_THRESHOLD: f64 = 4.0;

/// Default zstd level
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

/// Calculate Shannon entropy of data (bits per byte)
/// Returns a value between 0.0 (all identical) and 8.0 (perfectly random)
fn calculate_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut freq = [0u32; 256];
    for &byte in data {
        freq[byte as usize] += 1;
    }

    let len = data.len() as f64;
    let mut entropy = 0.0;

    for &count in &freq {
        if count > 0 {
            let p = count as f64 / len;
            entropy -= p * p.log2();
        }
    }

    entropy
}

/// Entropy check on a leading sample; payloads under 1 KiB always pass.
fn looks_compressible(data: &[u8]) -> bool {
    if data.len() < 1024 {
        return true;
    }
    let sample_size = data.len().min(512);
    calculate_entropy(&data[..sample_size]) < MIN_ENTROPY_THRESHOLD
}

/// Compresses data using the specified compression algorithm
///
/// # Errors
/// Returns `MarshalError::CompressionFailure` if compression fails
pub fn compress(data: &[u8], kind: CompressionKind, level: i32) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
        CompressionKind::Zstd => {
            let mut out = Vec::new();
            zstd::stream::copy_encode(data, &mut out, level)
                .map_err(|_| MarshalError::CompressionFailure)?;
            Ok(out)
        }
    }
}

fn decompression_failed() -> MarshalError {
    MarshalError::Decode(constants::ERR_DECOMPRESSION_FAILED.to_string())
}

/// Decompresses data that was compressed with the specified algorithm
///
/// # Errors
/// Returns `MarshalError::Decode` if decompression fails or the output would
/// exceed MAX_DECOMPRESSION_SIZE
pub fn decompress(data: &[u8], kind: CompressionKind) -> Result<Vec<u8>> {
    match kind {
        CompressionKind::Lz4 => {
            // lz4_flex prepends the uncompressed size as 4-byte little-endian;
            // check it before lz4_flex allocates
            if data.len() < 4 {
                return Err(decompression_failed());
            }

            let claimed_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
            if claimed_size > MAX_DECOMPRESSION_SIZE {
                return Err(decompression_failed());
            }

            let decompressed =
                lz4_flex::decompress_size_prepended(data).map_err(|_| decompression_failed())?;
            if decompressed.len() > MAX_DECOMPRESSION_SIZE {
                return Err(decompression_failed());
            }
            Ok(decompressed)
        }
        CompressionKind::Zstd => {
            let mut out = Vec::new();
            let mut reader =
                zstd::stream::Decoder::new(data).map_err(|_| decompression_failed())?;

            // Read in chunks to enforce size limit
            let mut buffer = [0u8; 8192];
            loop {
                match reader.read(&mut buffer) {
                    Ok(0) => break,
                    Ok(n) => {
                        out.extend_from_slice(&buffer[..n]);
                        if out.len() > MAX_DECOMPRESSION_SIZE {
                            return Err(decompression_failed());
                        }
                    }
                    Err(_) => return Err(decompression_failed()),
                }
            }
            Ok(out)
        }
    }
}

/// When and how payloads are compressed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressionPolicy {
    pub kind: CompressionKind,
    /// Payloads shorter than this are never compressed.
    pub min_size: usize,
    /// zstd level; ignored for lz4.
    pub level: i32,
    /// Skip compression of high-entropy payloads without trying.
    pub adaptive: bool,
}

impl Default for CompressionPolicy {
    fn default() -> Self {
        Self {
            kind: CompressionKind::default(),
            min_size: DEFAULT_COMPRESSION_MIN_SIZE,
            level: DEFAULT_ZSTD_LEVEL,
            adaptive: false,
        }
    }
}

impl CompressionPolicy {
    /// Compress `data` if requested and worthwhile.
    /// Returns the output bytes and whether they are compressed.
    pub fn apply(&self, data: Vec<u8>, requested: bool) -> Result<(Vec<u8>, bool)> {
        if !requested || data.len() < self.min_size {
            trace!(len = data.len(), requested, "compression skipped");
            return Ok((data, false));
        }
        if self.adaptive && !looks_compressible(&data) {
            debug!(len = data.len(), "compression skipped: high entropy sample");
            return Ok((data, false));
        }

        let compressed = compress(&data, self.kind, self.level)?;
        if compressed.len() < data.len() {
            debug!(
                original = data.len(),
                compressed = compressed.len(),
                kind = ?self.kind,
                "payload compressed"
            );
            Ok((compressed, true))
        } else {
            debug!(len = data.len(), "compression not beneficial, sending original");
            Ok((data, false))
        }
    }

    /// Undo [`CompressionPolicy::apply`]: decompress only if flagged.
    pub fn restore<'a>(&self, data: &'a [u8], compressed: bool) -> Result<Cow<'a, [u8]>> {
        if compressed {
            decompress(data, self.kind).map(Cow::Owned)
        } else {
            Ok(Cow::Borrowed(data))
        }
    }
}
