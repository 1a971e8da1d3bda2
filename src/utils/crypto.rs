//! Cipher construction for the encryption stages.
//!
//! Sessions encrypt with AES-256 in one of two modes: counter mode for
//! protocol versions at or above the fixed threshold, and the legacy CFB8
//! mode below it. The IV is derived from the session key the same way on
//! both peers, so no IV exchange happens on the wire. Each encrypted frame
//! additionally carries a truncated SHA-256 trailer binding the frame to
//! its send counter and the session key.

use crate::error::{PipelineError, Result};
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use aes::Aes256;
use sha2::{Digest, Sha256};
use std::fmt;
use zeroize::Zeroizing;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type Aes256Cfb8Enc = cfb8::Encryptor<Aes256>;
type Aes256Cfb8Dec = cfb8::Decryptor<Aes256>;

/// The single cipher family accepted by `enable_encryption`
pub const AES_FAMILY: &str = "AES";

/// Required session key length in bytes
pub const KEY_LEN: usize = 32;

/// Length of the integrity trailer appended to every encrypted frame
pub const CHECKSUM_LEN: usize = 8;

/// A negotiated session secret, tagged with its cipher family.
///
/// Key material is zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    family: String,
    bytes: Zeroizing<Vec<u8>>,
}

impl SecretKey {
    pub fn new(family: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            family: family.into(),
            bytes: Zeroizing::new(bytes),
        }
    }

    /// Convenience constructor for an AES-family key
    pub fn aes(bytes: [u8; KEY_LEN]) -> Self {
        Self::new(AES_FAMILY, bytes.to_vec())
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretKey")
            .field("family", &self.family)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A directional packet cipher owned by one encryption stage.
///
/// Counter mode is symmetric; CFB8 keeps distinct encrypt/decrypt state.
pub enum PacketCipher {
    Ctr(Aes256Ctr),
    Cfb8Encrypt(Aes256Cfb8Enc),
    Cfb8Decrypt(Aes256Cfb8Dec),
}

impl PacketCipher {
    /// Apply the keystream to `data` in place
    pub fn apply(&mut self, data: &mut [u8]) {
        match self {
            PacketCipher::Ctr(cipher) => cipher.apply_keystream(data),
            PacketCipher::Cfb8Encrypt(cipher) => {
                for byte in data.iter_mut() {
                    cipher.encrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(
                        byte,
                    )));
                }
            }
            PacketCipher::Cfb8Decrypt(cipher) => {
                for byte in data.iter_mut() {
                    cipher.decrypt_block_mut(GenericArray::from_mut_slice(std::slice::from_mut(
                        byte,
                    )));
                }
            }
        }
    }
}

impl fmt::Debug for PacketCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mode = match self {
            PacketCipher::Ctr(_) => "ctr",
            PacketCipher::Cfb8Encrypt(_) => "cfb8-encrypt",
            PacketCipher::Cfb8Decrypt(_) => "cfb8-decrypt",
        };
        write!(f, "PacketCipher({mode})")
    }
}

/// Construct the cipher for one direction of a session.
///
/// `use_ctr` selects counter mode; otherwise the legacy CFB8 mode is used.
/// `encrypt` selects the direction, which only matters for CFB8.
///
/// # Errors
/// Returns `PipelineError::InvalidKey` if the key material is not exactly
/// [`KEY_LEN`] bytes.
pub fn create_cipher(use_ctr: bool, encrypt: bool, key: &SecretKey) -> Result<PacketCipher> {
    if key.bytes().len() != KEY_LEN {
        return Err(PipelineError::InvalidKey(format!(
            "expected a {KEY_LEN}-byte key, got {} bytes",
            key.bytes().len()
        )));
    }

    let key_bytes = GenericArray::from_slice(key.bytes());
    if use_ctr {
        // Counter-mode IV: first 12 key bytes, padded, ending in the block
        // counter seed
        let mut iv = [0u8; 16];
        iv[..12].copy_from_slice(&key.bytes()[..12]);
        iv[15] = 2;
        Ok(PacketCipher::Ctr(Aes256Ctr::new(
            key_bytes,
            GenericArray::from_slice(&iv),
        )))
    } else {
        // Legacy CFB8 IV: first 16 key bytes
        let iv = GenericArray::from_slice(&key.bytes()[..16]);
        if encrypt {
            Ok(PacketCipher::Cfb8Encrypt(Aes256Cfb8Enc::new(key_bytes, iv)))
        } else {
            Ok(PacketCipher::Cfb8Decrypt(Aes256Cfb8Dec::new(key_bytes, iv)))
        }
    }
}

/// Integrity trailer for one encrypted frame: the first [`CHECKSUM_LEN`]
/// bytes of SHA-256 over the send counter, the frame body, and the key
pub fn frame_checksum(counter: u64, body: &[u8], key: &SecretKey) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(counter.to_le_bytes());
    hasher.update(body);
    hasher.update(key.bytes());
    let digest = hasher.finalize();

    let mut out = [0u8; CHECKSUM_LEN];
    out.copy_from_slice(&digest[..CHECKSUM_LEN]);
    out
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn test_key() -> SecretKey {
        SecretKey::aes([7u8; KEY_LEN])
    }

    #[test]
    fn test_ctr_roundtrip() {
        let key = test_key();
        let mut encrypt = create_cipher(true, true, &key).unwrap();
        let mut decrypt = create_cipher(true, false, &key).unwrap();

        let mut data = b"counter mode is a symmetric keystream".to_vec();
        encrypt.apply(&mut data);
        assert_ne!(&data, b"counter mode is a symmetric keystream");
        decrypt.apply(&mut data);
        assert_eq!(&data, b"counter mode is a symmetric keystream");
    }

    #[test]
    fn test_cfb8_roundtrip() {
        let key = test_key();
        let mut encrypt = create_cipher(false, true, &key).unwrap();
        let mut decrypt = create_cipher(false, false, &key).unwrap();

        let mut data = b"legacy cfb8 mode".to_vec();
        encrypt.apply(&mut data);
        assert_ne!(&data, b"legacy cfb8 mode");
        decrypt.apply(&mut data);
        assert_eq!(&data, b"legacy cfb8 mode");
    }

    #[test]
    fn test_cipher_state_continues_across_frames() {
        let key = test_key();
        let mut encrypt = create_cipher(true, true, &key).unwrap();
        let mut decrypt = create_cipher(true, false, &key).unwrap();

        for frame in [&b"first"[..], &b"second"[..], &b"third"[..]] {
            let mut data = frame.to_vec();
            encrypt.apply(&mut data);
            decrypt.apply(&mut data);
            assert_eq!(data, frame);
        }
    }

    #[test]
    fn test_short_key_rejected() {
        let key = SecretKey::new(AES_FAMILY, vec![1u8; 16]);
        let result = create_cipher(true, true, &key);
        assert!(matches!(result, Err(PipelineError::InvalidKey(_))));
    }

    #[test]
    fn test_checksum_binds_counter_and_body() {
        let key = test_key();
        let a = frame_checksum(0, b"payload", &key);
        let b = frame_checksum(1, b"payload", &key);
        let c = frame_checksum(0, b"payloae", &key);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, frame_checksum(0, b"payload", &key));
    }
}
