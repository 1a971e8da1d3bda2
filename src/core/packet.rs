use crate::error::{PipelineError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// A single decoded protocol packet: its numeric id and an opaque body.
///
/// Interpreting the body is the job of the registered packet codec and its
/// downstream consumers; the pipeline only moves packets around.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GamePacket {
    id: u32,
    payload: Bytes,
}

impl GamePacket {
    pub fn new(id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

/// Write `value` as an unsigned LEB128 varint
pub fn put_uvarint(buf: &mut BytesMut, mut value: u32) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

/// Read an unsigned LEB128 varint
///
/// # Errors
/// Returns `PipelineError::CodecFailure` on a truncated or over-long
/// encoding.
pub fn get_uvarint(buf: &mut impl Buf) -> Result<u32> {
    let mut value = 0u32;
    for shift in (0..35).step_by(7) {
        if !buf.has_remaining() {
            return Err(PipelineError::CodecFailure("truncated varint".to_string()));
        }
        let byte = buf.get_u8();
        value |= u32::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(PipelineError::CodecFailure("varint too long".to_string()))
}
