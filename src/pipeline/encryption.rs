//! Frame encryption stages.
//!
//! Encryption is a one-shot, irreversible transition for a session: once
//! the encoder/decoder pair is in the chain it is never removed or
//! re-keyed. The pair sits directly behind the framing stage, making it
//! the outermost transformation relative to compression.
//!
//! Each direction keeps its own cipher state and send/receive counter.
//! A frame on the wire is `cipher(body || checksum)` where the checksum
//! binds the body to the counter and session key.

use crate::error::{PipelineError, Result};
use crate::pipeline::stage::{Stage, Transfer};
use crate::utils::crypto::{frame_checksum, PacketCipher, SecretKey, CHECKSUM_LEN};
use std::any::Any;
use std::mem;

/// Outbound half of the encryption pair
pub struct EncryptionEncoder {
    cipher: PacketCipher,
    key: SecretKey,
    counter: u64,
}

impl EncryptionEncoder {
    pub fn new(cipher: PacketCipher, key: SecretKey) -> Self {
        Self {
            cipher,
            key,
            counter: 0,
        }
    }
}

impl Stage for EncryptionEncoder {
    fn encode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let mut body = mem::take(&mut transfer.wire);

        let checksum = frame_checksum(self.counter, &body, &self.key);
        self.counter += 1;
        body.extend_from_slice(&checksum);
        self.cipher.apply(&mut body[..]);

        transfer.wire = body;
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Inbound half of the encryption pair
pub struct EncryptionDecoder {
    cipher: PacketCipher,
    key: SecretKey,
    counter: u64,
}

impl EncryptionDecoder {
    pub fn new(cipher: PacketCipher, key: SecretKey) -> Self {
        Self {
            cipher,
            key,
            counter: 0,
        }
    }
}

impl Stage for EncryptionDecoder {
    fn decode(&mut self, transfer: &mut Transfer) -> Result<()> {
        let mut body = mem::take(&mut transfer.wire);
        self.cipher.apply(&mut body[..]);

        if body.len() < CHECKSUM_LEN {
            return Err(PipelineError::DecryptionFailure);
        }
        let trailer = body.split_off(body.len() - CHECKSUM_LEN);
        let expected = frame_checksum(self.counter, &body, &self.key);
        self.counter += 1;
        if trailer[..] != expected {
            return Err(PipelineError::DecryptionFailure);
        }

        transfer.wire = body;
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
    use crate::utils::crypto::{create_cipher, KEY_LEN};
    use bytes::BytesMut;

    fn pair(use_ctr: bool) -> (EncryptionEncoder, EncryptionDecoder) {
        let key = SecretKey::aes([42u8; KEY_LEN]);
        let encoder = EncryptionEncoder::new(create_cipher(use_ctr, true, &key).unwrap(), key.clone());
        let decoder = EncryptionDecoder::new(create_cipher(use_ctr, false, &key).unwrap(), key);
        (encoder, decoder)
    }

    fn outbound(body: &[u8]) -> Transfer {
        let mut transfer = Transfer::outbound(Default::default());
        transfer.wire = BytesMut::from(body);
        transfer
    }

    #[test]
    fn test_roundtrip_ctr() {
        let (mut encoder, mut decoder) = pair(true);

        for body in [&b"first frame"[..], &b"second frame"[..]] {
            let mut out = outbound(body);
            encoder.encode(&mut out).unwrap();
            assert_ne!(&out.wire[..], body);

            let mut inbound = Transfer::inbound(out.wire);
            decoder.decode(&mut inbound).unwrap();
            assert_eq!(&inbound.wire[..], body);
        }
    }

    #[test]
    fn test_roundtrip_cfb8() {
        let (mut encoder, mut decoder) = pair(false);

        let mut out = outbound(b"legacy cipher frame");
        encoder.encode(&mut out).unwrap();
        let mut inbound = Transfer::inbound(out.wire);
        decoder.decode(&mut inbound).unwrap();
        assert_eq!(&inbound.wire[..], b"legacy cipher frame");
    }

    #[test]
    fn test_tampered_frame_rejected() {
        let (mut encoder, mut decoder) = pair(true);

        let mut out = outbound(b"do not touch");
        encoder.encode(&mut out).unwrap();
        out.wire[3] ^= 0x01;

        let mut inbound = Transfer::inbound(out.wire);
        assert!(matches!(
            decoder.decode(&mut inbound),
            Err(PipelineError::DecryptionFailure)
        ));
    }

    #[test]
    fn test_out_of_order_frame_rejected() {
        let (mut encoder, mut decoder) = pair(true);

        // Encode two frames but deliver only the second; the receive
        // counter no longer matches.
        let mut first = outbound(b"one");
        encoder.encode(&mut first).unwrap();
        let mut second = outbound(b"two");
        encoder.encode(&mut second).unwrap();

        let mut inbound = Transfer::inbound(second.wire);
        assert!(decoder.decode(&mut inbound).is_err());
    }

    #[test]
    fn test_short_frame_rejected() {
        let (_, mut decoder) = pair(true);
        let mut inbound = Transfer::inbound(BytesMut::from(&b"abc"[..]));
        assert!(decoder.decode(&mut inbound).is_err());
    }
}
