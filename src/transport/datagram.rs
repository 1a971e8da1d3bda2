//! Reliable/ordered datagram transport.
//!
//! The datagram session layer (acknowledgements, ordering, MTU splitting)
//! is an external collaborator; this module only models the handle a
//! session holds on it. Frames arrive whole and in order through the
//! inbound channel, writes go out through the session's FIFO, and the
//! session-level disconnect primitive is reached through
//! [`SessionControl`].

use bytes::{Bytes, BytesMut};
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Reason codes understood by the datagram session layer
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DisconnectReason {
    /// Graceful, locally initiated disconnect
    Disconnected,
    /// The session's keepalive window elapsed
    TimedOut,
    /// The remote peer vanished mid-session
    ConnectionLost,
}

impl DisconnectReason {
    /// Wire code carried in the session-level disconnect notification
    pub const fn code(self) -> u8 {
        match self {
            DisconnectReason::Disconnected => 0x00,
            DisconnectReason::TimedOut => 0x01,
            DisconnectReason::ConnectionLost => 0x02,
        }
    }
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::Disconnected => write!(f, "disconnected"),
            DisconnectReason::TimedOut => write!(f, "timed out"),
            DisconnectReason::ConnectionLost => write!(f, "connection lost"),
        }
    }
}

/// Control signals accepted by the external session layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSignal {
    Disconnect(DisconnectReason),
}

/// Handle on the external datagram session's control channel
#[derive(Clone)]
pub struct SessionControl {
    control: mpsc::UnboundedSender<SessionSignal>,
}

impl SessionControl {
    pub fn new(control: mpsc::UnboundedSender<SessionSignal>) -> Self {
        Self { control }
    }

    /// Ask the session layer to run its disconnect sequence. Completion is
    /// observed through the transport-inactive transition, not here.
    pub fn disconnect(&self, reason: DisconnectReason) {
        let _ = self.control.send(SessionSignal::Disconnect(reason));
    }
}

/// A live reliable/ordered datagram endpoint
pub struct DatagramLink {
    remote: SocketAddr,
    outbound: mpsc::UnboundedSender<Bytes>,
    inbound: mpsc::UnboundedReceiver<BytesMut>,
    session: SessionControl,
    shutdown: CancellationToken,
}

impl DatagramLink {
    pub fn from_parts(
        remote: SocketAddr,
        outbound: mpsc::UnboundedSender<Bytes>,
        inbound: mpsc::UnboundedReceiver<BytesMut>,
        session: SessionControl,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            remote,
            outbound,
            inbound,
            session,
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

    /// Session-level disconnect with a reason code. Asynchronous: the
    /// session layer drains queued traffic first, then the inactive
    /// transition fires.
    pub fn disconnect(&self, reason: DisconnectReason) {
        debug!(remote = %self.remote, reason = %reason, "requesting session disconnect");
        self.session.disconnect(reason);
    }

    pub fn session(&self) -> &SessionControl {
        &self.session
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
