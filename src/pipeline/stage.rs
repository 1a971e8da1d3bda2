use crate::core::batch::PacketBatch;
use crate::error::Result;
use bytes::BytesMut;
use std::any::Any;

/// Name of the framing stage, the anchor for compression and encryption
/// insertion
pub const FRAME_ID_STAGE: &str = "frame-id";
/// Name of the compression stage
pub const COMPRESSION_STAGE: &str = "compression";
/// Name of the outbound encryption stage
pub const ENCRYPTION_ENCODER_STAGE: &str = "encryption-encoder";
/// Name of the inbound encryption stage
pub const ENCRYPTION_DECODER_STAGE: &str = "encryption-decoder";
/// Name of the packet codec stage
pub const PACKET_CODEC_STAGE: &str = "packet-codec";

/// The unit of work moving through a stage chain: the wire-side byte form
/// at the current boundary plus the structured batch being assembled or
/// torn down.
#[derive(Debug, Default)]
pub struct Transfer {
    /// Bytes at the wire-facing boundary of the stage currently executing
    pub wire: BytesMut,
    /// Structured view, filled progressively by the stages
    pub batch: PacketBatch,
}

impl Transfer {
    /// Start an inbound pass from raw wire bytes
    pub fn inbound(wire: BytesMut) -> Self {
        Self {
            wire,
            batch: PacketBatch::new(),
        }
    }

    /// Start an outbound pass from a batch to be serialized
    pub fn outbound(batch: PacketBatch) -> Self {
        Self {
            wire: BytesMut::new(),
            batch,
        }
    }
}

/// One named transformation step in a session's chain.
///
/// Inbound traffic visits stages in chain order via [`decode`](Stage::decode);
/// outbound traffic visits them in reverse order via
/// [`encode`](Stage::encode). Both default to pass-through so directional
/// stages only implement the side they act on.
pub trait Stage: Send {
    /// Inbound transformation (wire towards application)
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let _ = transfer;
        Ok(())
    }

    /// Outbound transformation (application towards wire)
    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let _ = transfer;
        Ok(())
    }

    /// Whether this stage is a removable no-op placeholder. The lifecycle
    /// controller checks this before replacing the compression stage.
    fn is_passthrough(&self) -> bool {
        false
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}
