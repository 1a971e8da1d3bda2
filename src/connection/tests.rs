// test-only module included via connection/mod.rs
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use super::*;
use crate::config::{TransportConfig, NETWORK_SETTINGS_PROTOCOL};
use crate::pipeline::{session_chain, RawPacketCodec};
use crate::transport::{DatagramLink, SessionControl, SessionSignal, StreamLink};
use crate::utils::crypto::KEY_LEN;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const MODERN_PROTOCOL: u32 = NETWORK_SETTINGS_PROTOCOL;
const TEST_ADDR: &str = "127.0.0.1:19132";

struct StreamHarness {
    connection: Connection,
    wire_out: mpsc::UnboundedReceiver<Bytes>,
    wire_in: mpsc::UnboundedSender<BytesMut>,
    shutdown: CancellationToken,
}

fn stream_connection(protocol_version: u32) -> StreamHarness {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let shutdown = CancellationToken::new();
    let link = Link::Stream(StreamLink::from_parts(
        TEST_ADDR.parse().unwrap(),
        out_tx,
        in_rx,
        shutdown.clone(),
    ));
    let config = TransportConfig::default();
    let chain = session_chain(protocol_version, 11, false, &config).unwrap();
    let channel = Channel::new(link, chain, 11, &config);
    StreamHarness {
        connection: Connection::new(channel, protocol_version, false),
        wire_out: out_rx,
        wire_in: in_tx,
        shutdown,
    }
}

fn aes_key() -> SecretKey {
    SecretKey::aes([3u8; KEY_LEN])
}

fn chain_names(connection: &Connection) -> Vec<String> {
    connection
        .channel()
        .chain()
        .names()
        .map(str::to_string)
        .collect()
}

// ============================================================================
// LIFECYCLE: COMPRESSION
// ============================================================================

#[test]
fn test_enable_compression_replaces_passthrough() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    assert_eq!(harness.connection.compression(), None);

    harness
        .connection
        .enable_compression(CompressionAlgorithm::Zlib)
        .expect("first enable should succeed");

    assert_eq!(
        harness.connection.compression(),
        Some(CompressionAlgorithm::Zlib)
    );
    assert_eq!(
        chain_names(&harness.connection),
        ["frame-id", "compression", "packet-codec"]
    );
}

#[test]
fn test_enable_compression_is_one_shot() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .enable_compression(CompressionAlgorithm::Zlib)
        .unwrap();

    let second = harness
        .connection
        .enable_compression(CompressionAlgorithm::Zlib);
    assert!(matches!(
        second,
        Err(PipelineError::AlreadyEnabled("compression"))
    ));
    // The tag set by the first successful call is untouched
    assert_eq!(
        harness.connection.compression(),
        Some(CompressionAlgorithm::Zlib)
    );
}

#[test]
fn test_enable_compression_fails_on_legacy_preset() {
    // Legacy sessions come up with a real zlib stage already installed
    let mut harness = stream_connection(MODERN_PROTOCOL - 1);
    assert_eq!(
        harness.connection.compression(),
        Some(CompressionAlgorithm::Zlib)
    );

    let result = harness
        .connection
        .enable_compression(CompressionAlgorithm::Zstd);
    assert!(matches!(
        result,
        Err(PipelineError::AlreadyEnabled("compression"))
    ));
    assert_eq!(
        harness.connection.compression(),
        Some(CompressionAlgorithm::Zlib)
    );
}

// ============================================================================
// LIFECYCLE: ENCRYPTION
// ============================================================================

#[test]
fn test_enable_encryption_rejects_foreign_cipher_family() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    let before = chain_names(&harness.connection);

    let des = SecretKey::new("DES", vec![0u8; KEY_LEN]);
    let result = harness.connection.enable_encryption(&des);

    assert!(matches!(result, Err(PipelineError::InvalidKey(_))));
    assert_eq!(chain_names(&harness.connection), before);
}

#[test]
fn test_enable_encryption_is_one_shot() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness.connection.enable_encryption(&aes_key()).unwrap();

    let second = harness.connection.enable_encryption(&aes_key());
    assert!(matches!(
        second,
        Err(PipelineError::AlreadyEnabled("encryption"))
    ));
}

#[test]
fn test_encryption_wraps_compression() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .enable_compression(CompressionAlgorithm::Zlib)
        .unwrap();
    harness.connection.enable_encryption(&aes_key()).unwrap();

    // Encryption anchors on frame-id after compression did, so it sits
    // closer to the wire.
    assert_eq!(
        chain_names(&harness.connection),
        [
            "frame-id",
            "encryption-decoder",
            "encryption-encoder",
            "compression",
            "packet-codec"
        ]
    );
}

#[test]
fn test_encryption_independent_of_compression_order() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness.connection.enable_encryption(&aes_key()).unwrap();
    harness
        .connection
        .enable_compression(CompressionAlgorithm::Zstd)
        .unwrap();

    // Compression keeps its place between framing/encryption and the codec
    assert_eq!(
        chain_names(&harness.connection),
        [
            "frame-id",
            "encryption-decoder",
            "encryption-encoder",
            "compression",
            "packet-codec"
        ]
    );
    assert_eq!(
        harness.connection.compression(),
        Some(CompressionAlgorithm::Zstd)
    );
}

#[test]
fn test_enable_encryption_does_not_change_compression_tag() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness.connection.enable_encryption(&aes_key()).unwrap();
    assert_eq!(harness.connection.compression(), None);
}

// ============================================================================
// CODEC SWAP
// ============================================================================

#[test]
fn test_set_codec_swaps_in_place() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .set_codec(Arc::new(RawPacketCodec::new(800)), CodecHelper::default())
        .unwrap();

    let stage = harness
        .connection
        .channel()
        .chain()
        .get_as::<PacketCodecStage>(PACKET_CODEC_STAGE)
        .unwrap();
    assert_eq!(stage.protocol_version(), 800);
}

#[test]
fn test_set_codec_requires_codec_stage() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .channel_mut()
        .chain_mut()
        .remove(PACKET_CODEC_STAGE)
        .unwrap();

    let result = harness
        .connection
        .set_codec(Arc::new(RawPacketCodec::new(800)), CodecHelper::default());
    assert!(matches!(result, Err(PipelineError::StageMissing(_))));
}

// ============================================================================
// DISPATCH ROUTER
// ============================================================================

#[test]
fn test_packet_handler_sees_packets_in_arrival_order() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    harness
        .connection
        .set_handler(SessionHandler::packet(move |packet: GamePacket| {
            sink.lock().unwrap().push(packet.id());
        }));

    let batch = PacketBatch::from_packets(
        1,
        vec![
            GamePacket::new(1, Bytes::from_static(b"p1")),
            GamePacket::new(2, Bytes::from_static(b"p2")),
            GamePacket::new(3, Bytes::from_static(b"p3")),
        ],
    );
    harness.connection.handle_batch(batch);

    assert_eq!(*seen.lock().unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_bridge_receives_whole_batch_exactly_once() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    let deliveries = Arc::new(Mutex::new(Vec::new()));
    let sink = deliveries.clone();
    harness
        .connection
        .set_handler(SessionHandler::bridge(move |batch: PacketBatch| {
            sink.lock().unwrap().push(batch.len());
        }));

    let batch = PacketBatch::from_packets(
        1,
        vec![
            GamePacket::new(1, Bytes::new()),
            GamePacket::new(2, Bytes::new()),
        ],
    );
    harness.connection.handle_batch(batch);

    // One delivery carrying both packets, never decomposed
    assert_eq!(*deliveries.lock().unwrap(), vec![2]);
}

#[test]
fn test_unhandled_batch_is_dropped_and_connection_stays_open() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    assert!(harness.connection.handler().is_none());

    let batch = PacketBatch::from_packets(
        1,
        vec![
            GamePacket::new(1, Bytes::new()),
            GamePacket::new(2, Bytes::new()),
        ],
    );
    harness.connection.handle_batch(batch);

    assert!(harness.connection.is_connected());
}

// ============================================================================
// SEND PATH
// ============================================================================

#[test]
fn test_send_clears_stale_compressed_cache() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .enable_compression(CompressionAlgorithm::Zstd)
        .unwrap();

    let mut batch = PacketBatch::new();
    batch.set_algorithm(Some(CompressionAlgorithm::Zlib));
    batch.set_compressed(Bytes::from_static(b"zlib-body"));

    harness.connection.reconcile_compression(&mut batch);
    assert!(batch.compressed().is_none());
}

#[test]
fn test_send_keeps_matching_compressed_cache() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .enable_compression(CompressionAlgorithm::Zlib)
        .unwrap();

    let mut batch = PacketBatch::new();
    batch.set_algorithm(Some(CompressionAlgorithm::Zlib));
    batch.set_compressed(Bytes::from_static(b"zlib-body"));

    harness.connection.reconcile_compression(&mut batch);
    assert!(batch.compressed().is_some());
}

#[test]
fn test_send_packet_roundtrips_through_mirror_chain() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .send_packet(GamePacket::new(42, Bytes::from_static(b"ping")));

    let frame = harness.wire_out.try_recv().expect("a frame should be queued");

    // A mirror of the session's initial chain decodes what was sent
    let mut mirror = session_chain(MODERN_PROTOCOL, 11, true, &TransportConfig::default()).unwrap();
    let batch = mirror.decode(BytesMut::from(&frame[..])).unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.packets()[0], GamePacket::new(42, Bytes::from_static(b"ping")));
}

#[test]
fn test_handle_frame_drops_garbage_without_closing() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness
        .connection
        .handle_frame(BytesMut::from(&[0x00, 0x01, 0x02][..]));
    assert!(harness.connection.is_connected());
}

// ============================================================================
// DISCONNECT & INACTIVE TRANSITION
// ============================================================================

#[test]
fn test_disconnect_listeners_fire_in_order_exactly_once() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    let order = Arc::new(Mutex::new(Vec::new()));
    for tag in ["L1", "L2", "L3"] {
        let order = order.clone();
        harness
            .connection
            .add_disconnect_listener(move || order.lock().unwrap().push(tag));
    }

    // Never before the inactive transition
    assert!(order.lock().unwrap().is_empty());

    harness.connection.on_inactive();
    assert_eq!(*order.lock().unwrap(), vec!["L1", "L2", "L3"]);

    harness.connection.on_inactive();
    assert_eq!(order.lock().unwrap().len(), 3);
}

#[test]
fn test_stream_disconnect_closes_link() {
    let mut harness = stream_connection(MODERN_PROTOCOL);
    assert!(harness.connection.is_connected());

    harness.connection.disconnect();
    assert!(!harness.connection.is_connected());
    assert!(harness.shutdown.is_cancelled());
}

#[test]
fn test_datagram_disconnect_uses_session_primitive() {
    let (control_tx, mut control_rx) = mpsc::unbounded_channel();
    let (out_tx, _out_rx) = mpsc::unbounded_channel();
    let (_in_tx, in_rx) = mpsc::unbounded_channel();
    let link = Link::Datagram(DatagramLink::from_parts(
        TEST_ADDR.parse().unwrap(),
        out_tx,
        in_rx,
        SessionControl::new(control_tx),
        CancellationToken::new(),
    ));
    let config = TransportConfig::default();
    let chain = session_chain(MODERN_PROTOCOL, 11, false, &config).unwrap();
    let mut connection = Connection::new(
        Channel::new(link, chain, 11, &config),
        MODERN_PROTOCOL,
        false,
    );

    connection.disconnect();

    assert_eq!(
        control_rx.try_recv().unwrap(),
        SessionSignal::Disconnect(DisconnectReason::Disconnected)
    );
    // Completion is asynchronous; the link is still open until the session
    // layer finishes its sequence
    assert!(connection.is_connected());
}

// ============================================================================
// END-TO-END TRAFFIC
// ============================================================================

#[test]
fn test_inbound_frame_reaches_handler_after_full_negotiation() {
    let mut sender = stream_connection(MODERN_PROTOCOL);
    let mut receiver = stream_connection(MODERN_PROTOCOL);

    let key = aes_key();
    for connection in [&mut sender.connection, &mut receiver.connection] {
        connection
            .enable_compression(CompressionAlgorithm::Zlib)
            .unwrap();
        connection.enable_encryption(&key).unwrap();
    }

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    receiver
        .connection
        .set_handler(SessionHandler::packet(move |packet: GamePacket| {
            sink.lock().unwrap().push(packet);
        }));

    let payload = Bytes::from(vec![7u8; 2048]);
    sender
        .connection
        .send_packet(GamePacket::new(9, payload.clone()));
    let frame = sender.wire_out.try_recv().unwrap();

    receiver.connection.handle_frame(BytesMut::from(&frame[..]));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], GamePacket::new(9, payload));
}

#[tokio::test]
async fn test_inbound_frames_flow_through_channel() {
    let mut harness = stream_connection(MODERN_PROTOCOL);

    harness
        .wire_in
        .send(BytesMut::from(&b"raw frame"[..]))
        .unwrap();
    let frame = harness.connection.channel_mut().recv().await.unwrap();
    assert_eq!(&frame[..], b"raw frame");

    // Dropping the peer's sender is the inactive transition
    drop(harness.wire_in);
    assert!(harness.connection.channel_mut().recv().await.is_none());
}

static LISTENER_PANICS: AtomicUsize = AtomicUsize::new(0);

#[test]
fn test_listener_panic_aborts_remaining_listeners() {
    // Documented sharp edge: no isolation between listener failures
    let mut harness = stream_connection(MODERN_PROTOCOL);
    harness.connection.add_disconnect_listener(|| {
        LISTENER_PANICS.fetch_add(1, Ordering::SeqCst);
        panic!("listener failure");
    });
    harness.connection.add_disconnect_listener(|| {
        LISTENER_PANICS.fetch_add(100, Ordering::SeqCst);
    });

    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        harness.connection.on_inactive();
    }));

    assert!(result.is_err());
    assert_eq!(LISTENER_PANICS.load(Ordering::SeqCst), 1);
}
