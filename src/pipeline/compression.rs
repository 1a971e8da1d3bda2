//! Batch compression stages.
//!
//! Two wire formats exist. From wire version
//! [`COMPRESSION_PREFIX_WIRE_VERSION`] upward every batch starts with a
//! one-byte algorithm id (`0xFF` marking an uncompressed batch, used below
//! the size threshold). Older wire versions speak bare zlib with no prefix
//! and no threshold.
//!
//! Inbound, the stage keeps the compressed body on the batch as a cache:
//! a bridging relay can then resend the batch without recompressing, as
//! long as the destination uses the same algorithm.

use crate::config::COMPRESSION_PREFIX_WIRE_VERSION;
use crate::error::{PipelineError, Result};
use crate::pipeline::stage::{Stage, Transfer};
use crate::utils::compression::{
    compress, decompress, CompressionAlgorithm, UNCOMPRESSED_WIRE_ID,
};
use bytes::{BufMut, Bytes, BytesMut};
use std::any::Any;

/// Select the compression stage implementation for a session.
///
/// # Errors
/// Returns `PipelineError::UnsupportedAlgorithm` when the legacy wire
/// format is asked to carry anything but zlib.
pub fn compression_stage(
    algorithm: CompressionAlgorithm,
    wire_version: u8,
    client_bound: bool,
    level: i32,
    threshold: usize,
) -> Result<Box<dyn Stage>> {
    if wire_version >= COMPRESSION_PREFIX_WIRE_VERSION {
        Ok(Box::new(PrefixedCompressionStage::new(
            algorithm,
            level,
            threshold,
            client_bound,
        )))
    } else if algorithm == CompressionAlgorithm::Zlib {
        Ok(Box::new(ZlibCompressionStage::new(level, client_bound)))
    } else {
        Err(PipelineError::UnsupportedAlgorithm(algorithm.to_string()))
    }
}

/// Pass-through placeholder installed before compression is negotiated.
/// Distinguished by [`Stage::is_passthrough`] so `enable_compression` can
/// replace it.
#[derive(Debug, Default)]
pub struct NoopCompressionStage;

impl Stage for NoopCompressionStage {
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let body = transfer.wire.split().freeze();
        transfer.batch.set_algorithm(None);
        transfer.batch.set_payload(body);
        Ok(())
    }

    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let payload = transfer
            .batch
            .payload()
            .cloned()
            .ok_or_else(|| PipelineError::CodecFailure("batch has no payload".to_string()))?;
        transfer.wire = BytesMut::from(&payload[..]);
        Ok(())
    }

    fn is_passthrough(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Compression stage for prefixed wire versions
pub struct PrefixedCompressionStage {
    algorithm: CompressionAlgorithm,
    level: i32,
    threshold: usize,
    client_bound: bool,
}

impl PrefixedCompressionStage {
    pub fn new(
        algorithm: CompressionAlgorithm,
        level: i32,
        threshold: usize,
        client_bound: bool,
    ) -> Self {
        Self {
            algorithm,
            level,
            threshold,
            client_bound,
        }
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    /// Whether this stage encodes towards the client side of the proxy
    pub fn client_bound(&self) -> bool {
        self.client_bound
    }
}

impl Stage for PrefixedCompressionStage {
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        if transfer.wire.is_empty() {
            return Err(PipelineError::DecompressionFailure);
        }
        let marker = transfer.wire.split_to(1)[0];
        let body = transfer.wire.split().freeze();

        if marker == UNCOMPRESSED_WIRE_ID {
            transfer.batch.set_algorithm(None);
            transfer.batch.set_payload(body);
            return Ok(());
        }

        let algorithm = CompressionAlgorithm::from_wire_id(marker)
            .ok_or(PipelineError::DecompressionFailure)?;
        let payload = decompress(&body, algorithm)?;
        transfer.batch.set_algorithm(Some(algorithm));
        transfer.batch.set_compressed(body);
        transfer.batch.set_payload(Bytes::from(payload));
        Ok(())
    }

    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let mut out = BytesMut::new();

        // Reuse the compressed body captured on the inbound side when the
        // algorithms line up; the send path has already dropped stale caches.
        if transfer.batch.algorithm() == Some(self.algorithm) {
            if let Some(cached) = transfer.batch.compressed() {
                out.put_u8(self.algorithm.wire_id());
                out.extend_from_slice(cached);
                transfer.wire = out;
                return Ok(());
            }
        }

        let payload = transfer
            .batch
            .payload()
            .cloned()
            .ok_or_else(|| PipelineError::CodecFailure("batch has no payload".to_string()))?;

        if payload.len() < self.threshold {
            out.put_u8(UNCOMPRESSED_WIRE_ID);
            out.extend_from_slice(&payload);
        } else {
            let compressed = compress(&payload, self.algorithm, self.level)?;
            out.put_u8(self.algorithm.wire_id());
            out.extend_from_slice(&compressed);
        }
        transfer.wire = out;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Bare-zlib compression stage for legacy wire versions. Every batch is
/// compressed; there is no prefix byte and no threshold.
pub struct ZlibCompressionStage {
    level: i32,
    client_bound: bool,
}

impl ZlibCompressionStage {
    pub fn new(level: i32, client_bound: bool) -> Self {
        Self {
            level,
            client_bound,
        }
    }

    pub fn client_bound(&self) -> bool {
        self.client_bound
    }
}

impl Stage for ZlibCompressionStage {
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let body = transfer.wire.split().freeze();
        let payload = decompress(&body, CompressionAlgorithm::Zlib)?;
        transfer.batch.set_algorithm(Some(CompressionAlgorithm::Zlib));
        transfer.batch.set_compressed(body);
        transfer.batch.set_payload(Bytes::from(payload));
        Ok(())
    }

    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        if transfer.batch.algorithm() == Some(CompressionAlgorithm::Zlib) {
            if let Some(cached) = transfer.batch.compressed() {
                transfer.wire = BytesMut::from(&cached[..]);
                return Ok(());
            }
        }

        let payload = transfer
            .batch
            .payload()
            .cloned()
            .ok_or_else(|| PipelineError::CodecFailure("batch has no payload".to_string()))?;
        let compressed = compress(&payload, CompressionAlgorithm::Zlib, self.level)?;
        transfer.wire = BytesMut::from(&compressed[..]);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::core::batch::PacketBatch;

    fn outbound_with_payload(payload: &'static [u8]) -> Transfer {
        let mut batch = PacketBatch::new();
        batch.set_payload(Bytes::from_static(payload));
        Transfer::outbound(batch)
    }

    #[test]
    fn test_prefixed_roundtrip() {
        let mut stage = PrefixedCompressionStage::new(CompressionAlgorithm::Zlib, 7, 0, false);

        let mut out = outbound_with_payload(b"a payload worth compressing, repeated repeated");
        stage.encode(&mut out).unwrap();
        assert_eq!(out.wire[0], CompressionAlgorithm::Zlib.wire_id());

        let mut inbound = Transfer::inbound(out.wire);
        stage.decode(&mut inbound).unwrap();
        assert_eq!(
            inbound.batch.payload().unwrap(),
            &Bytes::from_static(b"a payload worth compressing, repeated repeated")
        );
        assert_eq!(inbound.batch.algorithm(), Some(CompressionAlgorithm::Zlib));
        assert!(inbound.batch.compressed().is_some());
    }

    #[test]
    fn test_prefixed_below_threshold_stays_uncompressed() {
        let mut stage = PrefixedCompressionStage::new(CompressionAlgorithm::Zstd, 1, 1024, false);

        let mut out = outbound_with_payload(b"tiny");
        stage.encode(&mut out).unwrap();
        assert_eq!(out.wire[0], UNCOMPRESSED_WIRE_ID);
        assert_eq!(&out.wire[1..], b"tiny");

        let mut inbound = Transfer::inbound(out.wire);
        stage.decode(&mut inbound).unwrap();
        assert_eq!(inbound.batch.algorithm(), None);
        assert_eq!(inbound.batch.payload().unwrap(), &Bytes::from_static(b"tiny"));
    }

    #[test]
    fn test_prefixed_reuses_compressed_cache() {
        let mut stage = PrefixedCompressionStage::new(CompressionAlgorithm::Zlib, 7, 0, false);

        let mut batch = PacketBatch::new();
        batch.set_algorithm(Some(CompressionAlgorithm::Zlib));
        batch.set_compressed(Bytes::from_static(b"pretend-compressed"));
        let mut out = Transfer::outbound(batch);
        stage.encode(&mut out).unwrap();

        assert_eq!(out.wire[0], CompressionAlgorithm::Zlib.wire_id());
        assert_eq!(&out.wire[1..], b"pretend-compressed");
    }

    #[test]
    fn test_prefixed_ignores_cache_for_other_algorithm() {
        let mut stage = PrefixedCompressionStage::new(CompressionAlgorithm::Zstd, 1, 0, false);

        let mut batch = PacketBatch::new();
        batch.set_algorithm(Some(CompressionAlgorithm::Zlib));
        batch.set_compressed(Bytes::from_static(b"zlib-bytes"));
        batch.set_payload(Bytes::from_static(b"the actual payload"));
        let mut out = Transfer::outbound(batch);
        stage.encode(&mut out).unwrap();

        assert_eq!(out.wire[0], CompressionAlgorithm::Zstd.wire_id());
        let mut inbound = Transfer::inbound(out.wire);
        stage.decode(&mut inbound).unwrap();
        assert_eq!(
            inbound.batch.payload().unwrap(),
            &Bytes::from_static(b"the actual payload")
        );
    }

    #[test]
    fn test_prefixed_unknown_marker_rejected() {
        let mut stage = PrefixedCompressionStage::new(CompressionAlgorithm::Zlib, 7, 0, false);
        let mut inbound = Transfer::inbound(BytesMut::from(&[0x77, 1, 2][..]));
        assert!(stage.decode(&mut inbound).is_err());
    }

    #[test]
    fn test_legacy_zlib_roundtrip() {
        let mut stage = ZlibCompressionStage::new(7, true);

        let mut out = outbound_with_payload(b"legacy wire batches always compress");
        stage.encode(&mut out).unwrap();

        let mut inbound = Transfer::inbound(out.wire);
        stage.decode(&mut inbound).unwrap();
        assert_eq!(
            inbound.batch.payload().unwrap(),
            &Bytes::from_static(b"legacy wire batches always compress")
        );
        assert_eq!(inbound.batch.algorithm(), Some(CompressionAlgorithm::Zlib));
    }

    #[test]
    fn test_factory_rejects_non_zlib_on_legacy_wire() {
        let result = compression_stage(CompressionAlgorithm::Zstd, 10, false, 1, 0);
        assert!(matches!(
            result,
            Err(PipelineError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn test_noop_is_passthrough() {
        let stage = NoopCompressionStage;
        assert!(stage.is_passthrough());

        let real = PrefixedCompressionStage::new(CompressionAlgorithm::Zlib, 7, 0, false);
        assert!(!real.is_passthrough());
    }

    #[test]
    fn test_noop_roundtrip() {
        let mut stage = NoopCompressionStage;
        let mut out = outbound_with_payload(b"raw");
        stage.encode(&mut out).unwrap();
        assert_eq!(&out.wire[..], b"raw");

        let mut inbound = Transfer::inbound(out.wire);
        stage.decode(&mut inbound).unwrap();
        assert_eq!(inbound.batch.algorithm(), None);
        assert_eq!(inbound.batch.payload().unwrap(), &Bytes::from_static(b"raw"));
    }
}
