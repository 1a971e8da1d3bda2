use crate::config::MAX_FRAME_SIZE;
use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Read, Write};

/// Batch compression algorithms a session can negotiate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    Zlib,
    Zstd,
    Lz4,
}

/// Wire marker for a batch that was sent without compression
pub const UNCOMPRESSED_WIRE_ID: u8 = 0xFF;

impl CompressionAlgorithm {
    /// One-byte identifier written ahead of each batch on prefixed wire
    /// versions
    pub const fn wire_id(self) -> u8 {
        match self {
            CompressionAlgorithm::Zlib => 0x00,
            CompressionAlgorithm::Zstd => 0x01,
            CompressionAlgorithm::Lz4 => 0x02,
        }
    }

    /// Inverse of [`wire_id`](Self::wire_id); `UNCOMPRESSED_WIRE_ID` is not
    /// an algorithm and maps to `None`
    pub fn from_wire_id(id: u8) -> Option<Self> {
        match id {
            0x00 => Some(CompressionAlgorithm::Zlib),
            0x01 => Some(CompressionAlgorithm::Zstd),
            0x02 => Some(CompressionAlgorithm::Lz4),
            _ => None,
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::Zlib => write!(f, "zlib"),
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
            CompressionAlgorithm::Lz4 => write!(f, "lz4"),
        }
    }
}

/// Maximum output size for decompression (aligned with MAX_FRAME_SIZE to
/// prevent decompression bombs)
const MAX_DECOMPRESSION_SIZE: usize = MAX_FRAME_SIZE;

/// Compresses data using the specified compression algorithm
///
/// # Errors
/// Returns `PipelineError::CompressionFailure` if compression fails
pub fn compress(data: &[u8], algorithm: CompressionAlgorithm, level: i32) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::Zlib => {
            let mut encoder = flate2::write::ZlibEncoder::new(
                Vec::new(),
                flate2::Compression::new(level.clamp(0, 9) as u32),
            );
            encoder
                .write_all(data)
                .map_err(|_| PipelineError::CompressionFailure)?;
            encoder
                .finish()
                .map_err(|_| PipelineError::CompressionFailure)
        }
        CompressionAlgorithm::Zstd => {
            let mut out = Vec::new();
            zstd::stream::copy_encode(data, &mut out, level)
                .map_err(|_| PipelineError::CompressionFailure)?;
            Ok(out)
        }
        CompressionAlgorithm::Lz4 => Ok(lz4_flex::compress_prepend_size(data)),
    }
}

/// Decompresses data that was compressed with the specified algorithm
///
/// Enforces a maximum output size limit to prevent decompression bombs.
/// The limit is set to MAX_FRAME_SIZE to align with the wire frame limit.
///
/// # Errors
/// Returns `PipelineError::DecompressionFailure` if:
/// - Decompression fails
/// - Output size exceeds MAX_DECOMPRESSION_SIZE
pub fn decompress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::Zlib => {
            let decoder = flate2::read::ZlibDecoder::new(data);
            read_capped(decoder)
        }
        CompressionAlgorithm::Zstd => {
            let decoder = zstd::stream::Decoder::new(data)
                .map_err(|_| PipelineError::DecompressionFailure)?;
            read_capped(decoder)
        }
        CompressionAlgorithm::Lz4 => {
            // Validate the claimed size before lz4_flex attempts allocation.
            // The uncompressed size is prepended as a 4-byte little-endian
            // integer.
            if data.len() < 4 {
                return Err(PipelineError::DecompressionFailure);
            }

            let claimed_size = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
            if claimed_size > MAX_DECOMPRESSION_SIZE {
                return Err(PipelineError::DecompressionFailure);
            }

            let decompressed = lz4_flex::decompress_size_prepended(data)
                .map_err(|_| PipelineError::DecompressionFailure)?;

            if decompressed.len() > MAX_DECOMPRESSION_SIZE {
                return Err(PipelineError::DecompressionFailure);
            }
            Ok(decompressed)
        }
    }
}

/// Read a decompression stream in chunks, enforcing the output size limit
/// on every chunk
fn read_capped<R: Read>(mut reader: R) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    let mut buffer = [0u8; 8192];
    loop {
        match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => {
                out.extend_from_slice(&buffer[..n]);
                if out.len() > MAX_DECOMPRESSION_SIZE {
                    return Err(PipelineError::DecompressionFailure);
                }
            }
            Err(_) => return Err(PipelineError::DecompressionFailure),
        }
    }
    Ok(out)
}
