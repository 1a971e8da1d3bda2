//! Plain stream transport.
//!
//! Frames ride a length-prefixed wire codec over the stream. A spawned
//! reader/writer task pair owns the socket halves; the link itself is just
//! the channel endpoints plus a shutdown token, so sessions and tests can
//! also assemble one from raw parts without any socket.

use crate::config::MAX_FRAME_SIZE;
use crate::error::{PipelineError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::{Decoder, Encoder, FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Length-prefixed frame codec for stream transports
///
/// ```text
/// [Length(4, BE)] [Frame(N)]
/// ```
#[derive(Debug, Clone)]
pub struct WireCodec {
    max_frame_size: usize,
}

impl WireCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }
}

impl Default for WireCodec {
    fn default() -> Self {
        Self::new(MAX_FRAME_SIZE)
    }
}

impl Decoder for WireCodec {
    type Item = BytesMut;
    type Error = PipelineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<BytesMut>> {
        if src.len() < 4 {
            return Ok(None);
        }

        let mut length_bytes = [0u8; 4];
        length_bytes.copy_from_slice(&src[..4]);
        let length = u32::from_be_bytes(length_bytes) as usize;

        if length > self.max_frame_size {
            return Err(PipelineError::OversizedFrame(length));
        }
        if src.len() < 4 + length {
            src.reserve(4 + length - src.len());
            return Ok(None);
        }

        src.advance(4);
        Ok(Some(src.split_to(length)))
    }
}

impl Encoder<Bytes> for WireCodec {
    type Error = PipelineError;

    fn encode(&mut self, frame: Bytes, dst: &mut BytesMut) -> Result<()> {
        if frame.len() > self.max_frame_size {
            return Err(PipelineError::OversizedFrame(frame.len()));
        }
        dst.reserve(4 + frame.len());
        dst.put_u32(frame.len() as u32);
        dst.extend_from_slice(&frame);
        Ok(())
    }
}

/// A live stream transport endpoint.
///
/// Writes are fire-and-forget through an unbounded FIFO; the writer task
/// preserves submission order. The inbound receiver yielding `None` is the
/// transport-inactive transition.
pub struct StreamLink {
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: mpsc::UnboundedReceiver<BytesMut>,
    shutdown: CancellationToken,
}

impl StreamLink {
    /// Take ownership of a connected stream and spawn its I/O tasks.
    /// Must be called within a tokio runtime.
    pub fn spawn(stream: TcpStream) -> Result<Self> {
        let remote = stream.peer_addr()?;
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Bytes>();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<BytesMut>();
        let shutdown = CancellationToken::new();

        let (read_half, write_half) = stream.into_split();
        let mut frames_in = FramedRead::new(read_half, WireCodec::default());
        let mut frames_out = FramedWrite::new(write_half, WireCodec::default());

        let reader_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = reader_shutdown.cancelled() => break,
                    item = frames_in.next() => match item {
                        Some(Ok(frame)) => {
                            if inbound_tx.send(frame).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            warn!(remote = %remote, error = %e, "stream read failed");
                            break;
                        }
                        None => break,
                    },
                }
            }
            // Dropping inbound_tx here is what surfaces the inactive
            // transition to the session; make the writer follow suit.
            reader_shutdown.cancel();
        });

        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = writer_shutdown.cancelled() => break,
                    maybe = outbound_rx.recv() => match maybe {
                        Some(frame) => {
                            if let Err(e) = frames_out.send(frame).await {
                                debug!(remote = %remote, error = %e, "stream write failed");
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
        });

        Ok(Self {
            remote,
            outbound: outbound_tx,
            inbound: inbound_rx,
            shutdown,
        })
    }

    /// Assemble a link from raw channel parts, for in-process transports
    /// and tests
    pub fn from_parts(
        remote: SocketAddr,
        outbound: mpsc::UnboundedSender<Bytes>,
        inbound: mpsc::UnboundedReceiver<BytesMut>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            remote,
            outbound,
            inbound,
            shutdown,
        }
    }

    pub fn write(&self, frame: Bytes) {
        if self.outbound.send(frame).is_err() {
            debug!(remote = %self.remote, "write after close dropped");
        }
    }

    pub fn close(&self) {
        self.shutdown.cancel();
    }

    pub fn is_open(&self) -> bool {
        !self.shutdown.is_cancelled() && !self.outbound.is_closed()
    }

    pub fn remote_address(&self) -> SocketAddr {
        self.remote
    }

    /// Receive the next inbound frame; `None` marks the transport-inactive
    /// transition
    pub async fn recv(&mut self) -> Option<BytesMut> {
        self.inbound.recv().await
    }
}
