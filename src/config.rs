//! # Configuration Management
//!
//! Centralized configuration for the transport pipeline.
//!
//! This module provides structured configuration for sessions, covering
//! transport limits, compression settings, and logging, plus the fixed
//! protocol constants the pipeline is built around.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//!
//! ## Security Considerations
//! - Default compression threshold (256 bytes) balances wire size and CPU
//! - The maximum frame size caps decompression output (prevents memory
//!   exhaustion from hostile batches)

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::Level;

/// Marker byte carried by every game frame on the wire
pub const FRAME_ID: u8 = 0xFE;

/// Max allowed frame size, and the cap on decompression output (16 MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Wire version from which batches carry a one-byte compression-algorithm
/// prefix; older wire versions speak bare zlib
pub const COMPRESSION_PREFIX_WIRE_VERSION: u8 = 11;

/// Protocol version from which sessions encrypt in counter mode; older
/// sessions fall back to the legacy CFB8 cipher. Hard boundary, not
/// configurable.
pub const CTR_ENCRYPTION_PROTOCOL: u32 = 428;

/// Protocol version from which the compression algorithm is negotiated
/// in-band after connect; older sessions start with zlib pre-installed
pub const NETWORK_SETTINGS_PROTOCOL: u32 = 554;

/// Default minimum payload size before compression is applied
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 256;

/// Default compression level
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 7;

/// Main configuration structure for a proxy's session pipelines
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ProxyConfig {
    /// Transport configuration
    #[serde(default)]
    pub transport: TransportConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ProxyConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| PipelineError::ConfigError(format!("failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| PipelineError::ConfigError(format!("failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| PipelineError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Validate the configuration for common misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means the
    /// configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.transport.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Maximum allowed frame size in bytes
    pub max_frame_size: usize,

    /// Compression level applied by compression stages
    pub compression_level: i32,

    /// Minimum payload size (bytes) before compression is applied.
    /// Smaller batches are sent uncompressed to reduce overhead.
    #[serde(default)]
    pub compression_threshold: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }
}

impl TransportConfig {
    /// Validate transport configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.max_frame_size == 0 {
            errors.push("max frame size cannot be 0".to_string());
        } else if self.max_frame_size < 1024 {
            errors.push("max frame size too small (minimum: 1 KB)".to_string());
        } else if self.max_frame_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "max frame size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_frame_size
            ));
        }

        if self.compression_level < 0 || self.compression_level > 22 {
            errors.push(format!(
                "invalid compression level: {} (valid range: 0-22)",
                self.compression_level
            ));
        }

        if self.compression_threshold > self.max_frame_size {
            errors.push("compression threshold cannot be larger than max frame size".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("proxy-pipeline"),
            log_level: Level::INFO,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("invalid log level: {level_str}")))
    }
}
