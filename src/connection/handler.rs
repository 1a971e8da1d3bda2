use crate::core::batch::PacketBatch;
use crate::core::packet::GamePacket;
use std::fmt;

/// Consumes individual decoded packets
pub trait PacketHandler: Send {
    fn handle_packet(&mut self, packet: GamePacket);
}

/// Consumes whole batches without decomposition; the relay path of the
/// proxy, which forwards traffic to a peer session untouched
pub trait BatchBridge: Send {
    fn handle_batch(&mut self, batch: PacketBatch);
}

impl<F> PacketHandler for F
where
    F: FnMut(GamePacket) + Send,
{
    fn handle_packet(&mut self, packet: GamePacket) {
        self(packet)
    }
}

impl<F> BatchBridge for F
where
    F: FnMut(PacketBatch) + Send,
{
    fn handle_batch(&mut self, batch: PacketBatch) {
        self(batch)
    }
}

/// The capability-polymorphic handler slot of a session.
///
/// Replaceable at any time by the owning orchestrator; the dispatch router
/// pattern-matches on it per inbound batch.
#[derive(Default)]
pub enum SessionHandler {
    /// No handler installed; inbound batches are dropped with a warning
    #[default]
    None,
    /// Per-packet delivery in arrival order
    Packet(Box<dyn PacketHandler>),
    /// Whole-batch delivery for pass-through relaying
    Bridge(Box<dyn BatchBridge>),
}

impl SessionHandler {
    pub fn packet(handler: impl PacketHandler + 'static) -> Self {
        SessionHandler::Packet(Box::new(handler))
    }

    pub fn bridge(bridge: impl BatchBridge + 'static) -> Self {
        SessionHandler::Bridge(Box::new(bridge))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, SessionHandler::None)
    }
}

impl fmt::Debug for SessionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionHandler::None => write!(f, "SessionHandler::None"),
            SessionHandler::Packet(_) => write!(f, "SessionHandler::Packet"),
            SessionHandler::Bridge(_) => write!(f, "SessionHandler::Bridge"),
        }
    }
}
