//! The packet codec stage: the boundary between byte payloads and decoded
//! packets.
//!
//! A batch payload is a sequence of varint-length-prefixed packet records.
//! What a record's body means is delegated to the registered
//! [`PacketCodec`], which the orchestrator swaps when the session's
//! protocol version is renegotiated.

use crate::core::batch::PacketBatch;
use crate::core::packet::{get_uvarint, put_uvarint, GamePacket};
use crate::error::{PipelineError, Result};
use crate::pipeline::stage::{Stage, Transfer};
use bytes::{Buf, Bytes, BytesMut};
use std::any::Any;
use std::sync::Arc;

/// Serializes and deserializes individual packet records for one protocol
/// version.
pub trait PacketCodec: Send + Sync {
    /// The protocol version this codec speaks
    fn protocol_version(&self) -> u32;

    /// Serialize one packet into a record body
    fn encode(&self, helper: &CodecHelper, packet: &GamePacket) -> Result<Bytes>;

    /// Deserialize one record body into a packet
    fn decode(&self, helper: &CodecHelper, body: Bytes) -> Result<GamePacket>;
}

/// Shared limits and scratch state handed to the codec on every call
#[derive(Debug, Clone)]
pub struct CodecHelper {
    max_packet_size: usize,
}

impl CodecHelper {
    pub fn new(max_packet_size: usize) -> Self {
        Self { max_packet_size }
    }

    pub fn max_packet_size(&self) -> usize {
        self.max_packet_size
    }
}

impl Default for CodecHelper {
    fn default() -> Self {
        Self {
            max_packet_size: crate::config::MAX_FRAME_SIZE,
        }
    }
}

/// Default codec: a varint packet id followed by an opaque body. Enough
/// for a relaying proxy, which inspects ids but not bodies.
#[derive(Debug)]
pub struct RawPacketCodec {
    protocol_version: u32,
}

impl RawPacketCodec {
    pub fn new(protocol_version: u32) -> Self {
        Self { protocol_version }
    }
}

impl PacketCodec for RawPacketCodec {
    fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    fn encode(&self, _helper: &CodecHelper, packet: &GamePacket) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(packet.payload().len() + 5);
        put_uvarint(&mut buf, packet.id());
        buf.extend_from_slice(packet.payload());
        Ok(buf.freeze())
    }

    fn decode(&self, _helper: &CodecHelper, mut body: Bytes) -> Result<GamePacket> {
        let id = get_uvarint(&mut body)?;
        Ok(GamePacket::new(id, body))
    }
}

/// The tail stage of every chain. Holds the replaceable codec/helper pair.
pub struct PacketCodecStage {
    codec: Arc<dyn PacketCodec>,
    helper: CodecHelper,
}

impl PacketCodecStage {
    pub fn new(codec: Arc<dyn PacketCodec>, helper: CodecHelper) -> Self {
        Self { codec, helper }
    }

    /// Swap the codec/helper pair in place; in-flight batches keep the
    /// pair they started with because each chain pass reads it once
    pub fn set_codec(&mut self, codec: Arc<dyn PacketCodec>, helper: CodecHelper) {
        self.codec = codec;
        self.helper = helper;
    }

    pub fn codec(&self) -> &Arc<dyn PacketCodec> {
        &self.codec
    }

    pub fn helper(&self) -> &CodecHelper {
        &self.helper
    }

    pub fn protocol_version(&self) -> u32 {
        self.codec.protocol_version()
    }
}

impl Stage for PacketCodecStage {
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let mut payload = transfer
            .batch
            .payload()
            .cloned()
            .ok_or_else(|| PipelineError::CodecFailure("batch has no payload".to_string()))?;

        let mut packets = Vec::new();
        while payload.has_remaining() {
            let len = get_uvarint(&mut payload)? as usize;
            if len > self.helper.max_packet_size {
                return Err(PipelineError::OversizedFrame(len));
            }
            if len > payload.remaining() {
                return Err(PipelineError::CodecFailure(
                    "truncated packet record".to_string(),
                ));
            }
            let body = payload.split_to(len);
            packets.push(self.codec.decode(&self.helper, body)?);
        }
        transfer.batch.set_packets(packets);
        Ok(())
    }

    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        if transfer.batch.payload().is_some() {
            return Ok(());
        }
        // A relayed batch may carry only its compressed form; the
        // compression stage reuses it directly.
        if transfer.batch.compressed().is_some() {
            return Ok(());
        }

        let mut buf = BytesMut::new();
        for packet in transfer.batch.packets() {
            let body = self.codec.encode(&self.helper, packet)?;
            if body.len() > self.helper.max_packet_size {
                return Err(PipelineError::OversizedFrame(body.len()));
            }
            put_uvarint(&mut buf, body.len() as u32);
            buf.extend_from_slice(&body);
        }
        transfer.batch.set_payload(buf.freeze());
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
