//! # Transport Abstraction
//!
//! Two heterogeneous transports behind one seam: a reliable/ordered
//! datagram link and a plain stream link. A [`Channel`] couples either
//! link with the session's stage chain, so everything above this module
//! deals only in batches.
//!
//! ## Components
//! - **StreamLink**: length-prefixed frames over a byte stream
//! - **DatagramLink**: whole ordered frames from an external session layer
//! - **Channel**: link + stage chain + negotiated wire version

pub mod datagram;
pub mod stream;

pub use datagram::{DatagramLink, DisconnectReason, SessionControl, SessionSignal};
pub use stream::{StreamLink, WireCodec};

use crate::config::TransportConfig;
use crate::core::batch::PacketBatch;
use crate::error::Result;
use crate::pipeline::StageChain;
use bytes::{Bytes, BytesMut};
use std::net::SocketAddr;

/// The underlying transport of one session
pub enum Link {
    /// Reliable/ordered datagram transport with session-level disconnect
    Datagram(DatagramLink),
    /// Plain stream transport
    Stream(StreamLink),
}

impl Link {
    /// Queue a frame for transmission. FIFO ordering is guaranteed by the
    /// transport's write path; failures surface through the inactive
    /// transition.
    pub fn write(&self, frame: Bytes) {
        match self {
            Link::Datagram(link) => link.write(frame),
            Link::Stream(link) => link.write(frame),
        }
    }

    pub fn close(&self) {
        match self {
            Link::Datagram(link) => link.close(),
            Link::Stream(link) => link.close(),
        }
    }

    /// Live transport-open check; never cached
    pub fn is_open(&self) -> bool {
        match self {
            Link::Datagram(link) => link.is_open(),
            Link::Stream(link) => link.is_open(),
        }
    }

    pub fn remote_address(&self) -> SocketAddr {
        match self {
            Link::Datagram(link) => link.remote_address(),
            Link::Stream(link) => link.remote_address(),
        }
    }

    /// Receive the next inbound frame; `None` marks the transport-inactive
    /// transition
    pub async fn recv(&mut self) -> Option<BytesMut> {
        match self {
            Link::Datagram(link) => link.recv().await,
            Link::Stream(link) => link.recv().await,
        }
    }
}

/// A session's transport channel: the link plus the stage chain applied to
/// everything that crosses it.
///
/// Owned exclusively by the session's `Connection` for its whole lifetime;
/// all mutation happens on the session's single execution context.
pub struct Channel {
    chain: StageChain,
    link: Link,
    wire_version: u8,
    compression_level: i32,
    compression_threshold: usize,
}

impl Channel {
    pub fn new(link: Link, chain: StageChain, wire_version: u8, config: &TransportConfig) -> Self {
        Self {
            chain,
            link,
            wire_version,
            compression_level: config.compression_level,
            compression_threshold: config.compression_threshold,
        }
    }

    pub fn chain(&self) -> &StageChain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut StageChain {
        &mut self.chain
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut Link {
        &mut self.link
    }

    pub fn wire_version(&self) -> u8 {
        self.wire_version
    }

    pub fn compression_level(&self) -> i32 {
        self.compression_level
    }

    pub fn compression_threshold(&self) -> usize {
        self.compression_threshold
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.link.remote_address()
    }

    pub fn is_open(&self) -> bool {
        self.link.is_open()
    }

    /// Run the outbound chain and queue the resulting frame
    pub fn write_batch(&mut self, batch: PacketBatch) -> Result<()> {
        let frame = self.chain.encode(batch)?;
        self.link.write(frame);
        Ok(())
    }

    /// Receive the next inbound frame; `None` marks the transport-inactive
    /// transition
    pub async fn recv(&mut self) -> Option<BytesMut> {
        self.link.recv().await
    }
}
