use crate::config::FRAME_ID;
use crate::error::{PipelineError, Result};
use crate::pipeline::stage::{Stage, Transfer};
use bytes::{BufMut, BytesMut};
use std::any::Any;

/// Validates and strips the one-byte frame marker inbound; prepends it
/// outbound. Always the head of a session's chain.
///
/// Batch sequencing (ordered vs. unordered delivery) is handled below this
/// stage by the transport itself; a batch sequence of zero simply means
/// the transport may deliver it immediately.
#[derive(Debug, Default)]
pub struct FrameIdStage;

impl Stage for FrameIdStage {
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        if transfer.wire.first() != Some(&FRAME_ID) {
            return Err(PipelineError::InvalidHeader);
        }
        let _ = transfer.wire.split_to(1);
        Ok(())
    }

    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let mut framed = BytesMut::with_capacity(transfer.wire.len() + 1);
        framed.put_u8(FRAME_ID);
        framed.extend_from_slice(&transfer.wire);
        transfer.wire = framed;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
