//! # Connection State & Lifecycle
//!
//! One [`Connection`] per active session. It owns the transport channel,
//! tracks the session's compression algorithm and handler, routes inbound
//! batches, and performs the one-shot pipeline transitions (compression,
//! encryption) the handshake orchestrator drives.
//!
//! All methods run on the session's single execution context; the type is
//! deliberately not synchronized. Stage mutation is synchronous with
//! respect to the chain but asynchronous with respect to frames already
//! queued in the transport, whose FIFO ordering provides the cutover
//! guarantee.

pub mod handler;

#[cfg(test)]
mod tests;

pub use handler::{BatchBridge, PacketHandler, SessionHandler};

use crate::config::CTR_ENCRYPTION_PROTOCOL;
use crate::core::batch::PacketBatch;
use crate::core::packet::GamePacket;
use crate::error::{PipelineError, Result};
use crate::pipeline::codec::{CodecHelper, PacketCodec, PacketCodecStage};
use crate::pipeline::compression::compression_stage;
use crate::pipeline::encryption::{EncryptionDecoder, EncryptionEncoder};
use crate::pipeline::stage::{
    COMPRESSION_STAGE, ENCRYPTION_DECODER_STAGE, ENCRYPTION_ENCODER_STAGE, FRAME_ID_STAGE,
    PACKET_CODEC_STAGE,
};
use crate::transport::{Channel, DisconnectReason, Link};
use crate::utils::compression::CompressionAlgorithm;
use crate::utils::crypto::{create_cipher, SecretKey, AES_FAMILY};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The logical state of one network session
pub struct Connection {
    channel: Channel,
    protocol_version: u32,
    client_bound: bool,
    compression: Option<CompressionAlgorithm>,
    handler: SessionHandler,
    disconnect_listeners: Vec<Box<dyn FnOnce() + Send>>,
}

impl Connection {
    /// Wrap a transport channel for a session speaking `protocol_version`.
    ///
    /// Sessions predating in-band compression negotiation come up with
    /// zlib already agreed, matching the zlib stage their initial chain
    /// carries.
    pub fn new(channel: Channel, protocol_version: u32, client_bound: bool) -> Self {
        let compression = (protocol_version < crate::config::NETWORK_SETTINGS_PROTOCOL)
            .then_some(CompressionAlgorithm::Zlib);
        Self {
            channel,
            protocol_version,
            client_bound,
            compression,
            handler: SessionHandler::None,
            disconnect_listeners: Vec::new(),
        }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut Channel {
        &mut self.channel
    }

    pub fn protocol_version(&self) -> u32 {
        self.protocol_version
    }

    /// The compression algorithm currently agreed for this session
    pub fn compression(&self) -> Option<CompressionAlgorithm> {
        self.compression
    }

    pub fn handler(&self) -> &SessionHandler {
        &self.handler
    }

    /// Replace the handler slot; takes effect for the next inbound batch
    pub fn set_handler(&mut self, handler: SessionHandler) {
        self.handler = handler;
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.channel.remote_address()
    }

    /// Live transport-open check
    pub fn is_connected(&self) -> bool {
        self.channel.is_open()
    }

    /// Queue a batch for transmission.
    ///
    /// If the batch was compressed with a different algorithm than this
    /// session uses, its compressed cache is dropped so the compression
    /// stage re-encodes it. Fire-and-forget: encode failures are logged,
    /// write failures surface through the inactive transition.
    pub fn send_batch(&mut self, mut batch: PacketBatch) {
        self.reconcile_compression(&mut batch);
        if let Err(e) = self.channel.write_batch(batch) {
            error!(
                remote = %self.channel.remote_address(),
                error = %e,
                "failed to encode outbound batch"
            );
        }
    }

    /// Queue a single packet, wrapped in an unordered batch
    pub fn send_packet(&mut self, packet: GamePacket) {
        self.send_batch(PacketBatch::single(packet));
    }

    pub(crate) fn reconcile_compression(&self, batch: &mut PacketBatch) {
        if batch.algorithm() != self.compression {
            batch.clear_compressed();
        }
    }

    /// Switch the session to `algorithm`, replacing the pass-through
    /// placeholder in the chain.
    ///
    /// One-shot: succeeds at most once per session.
    ///
    /// # Errors
    /// Returns `PipelineError::AlreadyEnabled` if an active compression
    /// stage is installed, or `PipelineError::StageMissing` if the chain
    /// has no framing stage to anchor on. The connection's algorithm tag
    /// is only updated after the new stage is in place.
    pub fn enable_compression(&mut self, algorithm: CompressionAlgorithm) -> Result<()> {
        let wire_version = self.channel.wire_version();
        let level = self.channel.compression_level();
        let threshold = self.channel.compression_threshold();
        let remote = self.channel.remote_address();

        let chain = self.channel.chain_mut();
        if let Some(stage) = chain.get(COMPRESSION_STAGE) {
            if stage.is_passthrough() {
                let _ = chain.remove(COMPRESSION_STAGE);
            } else {
                return Err(PipelineError::AlreadyEnabled("compression"));
            }
        }

        let stage = compression_stage(algorithm, wire_version, self.client_bound, level, threshold)?;
        chain.insert_after(FRAME_ID_STAGE, COMPRESSION_STAGE, stage)?;
        self.compression = Some(algorithm);
        debug!(remote = %remote, algorithm = %algorithm, "compression enabled");
        Ok(())
    }

    /// Install the encryption stage pair for this session.
    ///
    /// One-shot and irreversible. The cipher mode is a pure function of
    /// the codec's protocol version against the fixed counter-mode
    /// threshold. Both stages anchor on the framing stage, so encryption
    /// ends up wrapping compression in both directions.
    ///
    /// # Errors
    /// Returns `PipelineError::InvalidKey` for a non-AES key family or bad
    /// key material, `PipelineError::AlreadyEnabled` if either encryption
    /// stage is present, `PipelineError::StageMissing` if the packet codec
    /// stage is absent. Nothing is inserted on failure.
    pub fn enable_encryption(&mut self, secret: &SecretKey) -> Result<()> {
        if secret.family() != AES_FAMILY {
            return Err(PipelineError::InvalidKey(format!(
                "unsupported cipher family: {}",
                secret.family()
            )));
        }

        let remote = self.channel.remote_address();
        let chain = self.channel.chain_mut();
        if chain.contains(ENCRYPTION_ENCODER_STAGE) || chain.contains(ENCRYPTION_DECODER_STAGE) {
            return Err(PipelineError::AlreadyEnabled("encryption"));
        }

        let protocol_version = chain
            .get_as::<PacketCodecStage>(PACKET_CODEC_STAGE)
            .ok_or_else(|| PipelineError::StageMissing(PACKET_CODEC_STAGE.to_string()))?
            .protocol_version();
        let use_ctr = protocol_version >= CTR_ENCRYPTION_PROTOCOL;

        let encoder =
            EncryptionEncoder::new(create_cipher(use_ctr, true, secret)?, secret.clone());
        let decoder =
            EncryptionDecoder::new(create_cipher(use_ctr, false, secret)?, secret.clone());

        chain.insert_after(FRAME_ID_STAGE, ENCRYPTION_ENCODER_STAGE, Box::new(encoder))?;
        chain.insert_after(FRAME_ID_STAGE, ENCRYPTION_DECODER_STAGE, Box::new(decoder))?;

        info!(remote = %remote, counter_mode = use_ctr, "encryption enabled");
        Ok(())
    }

    /// Swap the packet codec/helper pair in place.
    ///
    /// # Errors
    /// Returns `PipelineError::StageMissing` if the chain has no packet
    /// codec stage.
    pub fn set_codec(&mut self, codec: Arc<dyn PacketCodec>, helper: CodecHelper) -> Result<()> {
        let stage = self
            .channel
            .chain_mut()
            .get_as_mut::<PacketCodecStage>(PACKET_CODEC_STAGE)
            .ok_or_else(|| PipelineError::StageMissing(PACKET_CODEC_STAGE.to_string()))?;
        stage.set_codec(codec, helper);
        Ok(())
    }

    /// Begin closing the session. Datagram transports get a graceful
    /// session-level disconnect; stream transports are simply closed.
    /// Asynchronous: completion is the inactive transition.
    pub fn disconnect(&mut self) {
        match self.channel.link_mut() {
            Link::Datagram(link) => link.disconnect(DisconnectReason::Disconnected),
            Link::Stream(link) => link.close(),
        }
    }

    /// Register a callback for the transport-inactive transition.
    /// Append-only; listeners run in registration order, exactly once.
    pub fn add_disconnect_listener(&mut self, listener: impl FnOnce() + Send + 'static) {
        self.disconnect_listeners.push(Box::new(listener));
    }

    /// Decode one inbound wire frame and route the result. Undecodable
    /// frames are dropped with a warning; the connection stays open.
    pub fn handle_frame(&mut self, wire: BytesMut) {
        let batch = match self.channel.chain_mut().decode(wire) {
            Ok(batch) => batch,
            Err(e) => {
                warn!(
                    remote = %self.channel.remote_address(),
                    error = %e,
                    "dropping undecodable frame"
                );
                return;
            }
        };
        self.handle_batch(batch);
    }

    /// Route one decoded batch to the installed handler.
    ///
    /// Bridges receive the batch whole; packet handlers receive each
    /// packet in arrival order. With no handler the batch is dropped and
    /// reported, which is an anomaly but not an error.
    pub fn handle_batch(&mut self, batch: PacketBatch) {
        match &mut self.handler {
            SessionHandler::Bridge(bridge) => bridge.handle_batch(batch),
            SessionHandler::Packet(handler) => {
                for packet in batch.into_packets() {
                    handler.handle_packet(packet);
                }
            }
            SessionHandler::None => {
                warn!(
                    remote = %self.channel.remote_address(),
                    packets = batch.len(),
                    "received unhandled batch"
                );
            }
        }
    }

    /// The transport-inactive transition. Fires every disconnect listener
    /// in registration order, then leaves the list empty so a second
    /// invocation is a no-op.
    pub fn on_inactive(&mut self) {
        let listeners = std::mem::take(&mut self.disconnect_listeners);
        for listener in listeners {
            listener();
        }
    }
}
