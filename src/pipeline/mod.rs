//! # Transport Pipeline
//!
//! The ordered chain of transformation stages a session's bytes pass
//! through, and the stages themselves.
//!
//! ## Components
//! - **Stage / StageChain**: the named, ordered stage registry with
//!   insertion-after semantics
//! - **FrameIdStage**: wire frame marker
//! - **Compression stages**: prefixed, legacy zlib, and the removable
//!   no-op placeholder
//! - **Encryption stages**: the one-shot encoder/decoder pair
//! - **PacketCodecStage**: batch payload to decoded packets and back
//!
//! ## Chain Layout
//! ```text
//! wire <- [frame-id] [encryption-*] [compression] [packet-codec] -> app
//! ```
//! Inbound traffic runs left to right, outbound right to left.
//! Compression and encryption are inserted after `frame-id`; inserting
//! encryption later pushes compression inward, so ciphertext wraps the
//! compressed body in both directions.

pub mod chain;
pub mod codec;
pub mod compression;
pub mod encryption;
pub mod frame;
pub mod stage;

pub use chain::StageChain;
pub use codec::{CodecHelper, PacketCodec, PacketCodecStage, RawPacketCodec};
pub use compression::{compression_stage, NoopCompressionStage};
pub use encryption::{EncryptionDecoder, EncryptionEncoder};
pub use frame::FrameIdStage;
pub use stage::{Stage, Transfer};

use crate::config::{TransportConfig, NETWORK_SETTINGS_PROTOCOL};
use crate::error::Result;
use crate::utils::compression::CompressionAlgorithm;
use std::sync::Arc;

/// Build the initial stage chain for a freshly accepted session.
///
/// Sessions predating in-band compression negotiation get zlib installed
/// up front; newer sessions start with the no-op placeholder until the
/// orchestrator calls `enable_compression`. Encryption stages are never
/// part of the initial chain.
pub fn session_chain(
    protocol_version: u32,
    wire_version: u8,
    client_bound: bool,
    config: &TransportConfig,
) -> Result<StageChain> {
    let mut chain = StageChain::new();
    chain.push(stage::FRAME_ID_STAGE, Box::new(FrameIdStage))?;

    if protocol_version < NETWORK_SETTINGS_PROTOCOL {
        chain.push(
            stage::COMPRESSION_STAGE,
            compression_stage(
                CompressionAlgorithm::Zlib,
                wire_version,
                client_bound,
                config.compression_level,
                config.compression_threshold,
            )?,
        )?;
    } else {
        chain.push(stage::COMPRESSION_STAGE, Box::new(NoopCompressionStage))?;
    }

    chain.push(
        stage::PACKET_CODEC_STAGE,
        Box::new(PacketCodecStage::new(
            Arc::new(RawPacketCodec::new(protocol_version)),
            CodecHelper::default(),
        )),
    )?;
    Ok(chain)
}
