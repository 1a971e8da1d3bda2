//! Structured logging configuration.
//!
//! Installs a `tracing` subscriber according to [`LoggingConfig`]. Called
//! once at startup by the embedding proxy; library code only emits events.

use crate::config::LoggingConfig;
use crate::error::{PipelineError, Result};

/// Install the global tracing subscriber
///
/// # Errors
/// Returns `PipelineError::ConfigError` if a subscriber is already
/// installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_max_level(config.log_level);

    let result = if config.json_format {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    result.map_err(|e| PipelineError::ConfigError(format!("failed to install subscriber: {e}")))
}
