//! # Error Types
//!
//! Error handling for the transport pipeline.
//!
//! This module defines all error variants that can occur while a session's
//! pipeline is being mutated or while traffic moves through it.
//!
//! ## Error Categories
//! - **Argument Errors**: malformed input to a lifecycle call (wrong cipher
//!   family, bad key material). Surfaced immediately; never retried.
//! - **State Errors**: a one-shot lifecycle transition invoked twice, or a
//!   structural precondition violated (a required stage missing from the
//!   chain). These are programming-contract violations, not runtime
//!   conditions to recover from.
//! - **Traffic Errors**: frames that fail to decode, decompress, or decrypt.
//!   These are logged and dropped on the inbound path.
//! - **I/O Errors**: failures from the underlying transport.
//!
//! All errors implement `std::error::Error` for interoperability.

use std::io;
use thiserror::Error;

/// PipelineError is the primary error type for all pipeline operations
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid frame header")]
    InvalidHeader,

    #[error("frame too large: {0} bytes")]
    OversizedFrame(usize),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("{0} is already enabled")]
    AlreadyEnabled(&'static str),

    #[error("pipeline stage not found: {0}")]
    StageMissing(String),

    #[error("pipeline stage already present: {0}")]
    StageExists(String),

    #[error("compression algorithm not supported by this wire format: {0}")]
    UnsupportedAlgorithm(String),

    #[error("compression failed")]
    CompressionFailure,

    #[error("decompression failed")]
    DecompressionFailure,

    #[error("decryption failed")]
    DecryptionFailure,

    #[error("packet codec error: {0}")]
    CodecFailure(String),

    #[error("connection closed")]
    ConnectionClosed,

    #[error("configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
