//! # Utility Modules
//!
//! Supporting utilities for compression, cipher construction, and logging.
//!
//! ## Components
//! - **Compression**: zlib, zstd, and lz4 with decompression size caps
//! - **Crypto**: AES-256 CTR/CFB8 cipher construction and frame checksums
//! - **Logging**: structured logging configuration
//!
//! ## Security
//! - Decompression bomb protection (output capped at the frame limit)
//! - Memory zeroing for key material (zeroize crate)

pub mod compression;
pub mod crypto;
pub mod logging;

pub use compression::CompressionAlgorithm;
pub use crypto::SecretKey;
