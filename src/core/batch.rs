use crate::core::packet::GamePacket;
use crate::utils::compression::CompressionAlgorithm;
use bytes::Bytes;

/// A group of packets exchanged as one transport-level unit.
///
/// A batch exists in up to three representations at once: the decoded
/// packet list, the serialized uncompressed `payload`, and the compressed
/// body as it appeared (or will appear) on the wire. The compressed form is
/// kept as a cache so a relaying bridge can resend a batch without paying
/// for recompression; the send path drops the cache whenever the batch's
/// algorithm no longer matches the connection's.
///
/// A batch is created once per inbound read or outbound send and is not
/// persisted past that exchange.
#[derive(Debug, Default, Clone)]
pub struct PacketBatch {
    sequence: u32,
    packets: Vec<GamePacket>,
    algorithm: Option<CompressionAlgorithm>,
    compressed: Option<Bytes>,
    payload: Option<Bytes>,
}

impl PacketBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a single packet. Sequence number zero marks the batch as
    /// unordered/immediate for the framing layer.
    pub fn single(packet: GamePacket) -> Self {
        Self {
            sequence: 0,
            packets: vec![packet],
            ..Self::default()
        }
    }

    pub fn from_packets(sequence: u32, packets: Vec<GamePacket>) -> Self {
        Self {
            sequence,
            packets,
            ..Self::default()
        }
    }

    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn packets(&self) -> &[GamePacket] {
        &self.packets
    }

    /// Consume the batch, yielding packets in arrival order
    pub fn into_packets(self) -> Vec<GamePacket> {
        self.packets
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }

    /// Append a packet. Both byte caches are invalidated: a modified batch
    /// no longer matches its serialized forms.
    pub fn push(&mut self, packet: GamePacket) {
        self.packets.push(packet);
        self.payload = None;
        self.compressed = None;
    }

    /// Replace the decoded view without touching the byte caches. Used by
    /// the inbound codec stage, which populates packets *from* the caches.
    pub fn set_packets(&mut self, packets: Vec<GamePacket>) {
        self.packets = packets;
    }

    /// The algorithm this batch was encoded/decoded with; `None` means
    /// uncompressed or not yet tagged
    pub fn algorithm(&self) -> Option<CompressionAlgorithm> {
        self.algorithm
    }

    pub fn set_algorithm(&mut self, algorithm: Option<CompressionAlgorithm>) {
        self.algorithm = algorithm;
    }

    pub fn compressed(&self) -> Option<&Bytes> {
        self.compressed.as_ref()
    }

    pub fn set_compressed(&mut self, compressed: Bytes) {
        self.compressed = Some(compressed);
    }

    /// Drop the compressed cache, forcing the compression stage to
    /// recompress on the next send
    pub fn clear_compressed(&mut self) {
        self.compressed = None;
    }

    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn set_payload(&mut self, payload: Bytes) {
        self.payload = Some(payload);
    }
}
