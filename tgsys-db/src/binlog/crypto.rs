//! Key derivation and record-stream encryption for the binlog.
//!
//! Passwords run through PBKDF2-HMAC-SHA512 with a per-file salt; raw
//! keys are used as-is. The record stream is AES-256 in counter mode so
//! appends continue the keystream without rewriting, and the file header
//! is authenticated with HMAC-SHA256 under the derived key.

// Layer 1: Standard library
// (none)

// Layer 2: Third-party
use aes::cipher::{BlockEncrypt, KeyInit};
use aes::{Aes256, Block};
use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};

// Layer 3: Internal
use crate::db_key::DbKey;

/// PBKDF2 iteration count for password-derived keys. Changing this
/// breaks existing encrypted files.
pub const PBKDF2_ITERATIONS: u32 = 100_000;

pub(crate) const SALT_LEN: usize = 32;
pub(crate) const IV_LEN: usize = 16;
pub(crate) const MAC_LEN: usize = 32;
pub(crate) const KEY_LEN: usize = 32;

/// Derive the 256-bit stream key, or `None` for an empty key.
pub(crate) fn derive_key(db_key: &DbKey, salt: &[u8; SALT_LEN]) -> Option<[u8; KEY_LEN]> {
    match db_key {
        DbKey::Empty => None,
        DbKey::Password(password) => {
            let mut out = [0u8; KEY_LEN];
            pbkdf2::pbkdf2_hmac::<Sha512>(
                password.as_bytes(),
                salt,
                PBKDF2_ITERATIONS,
                &mut out,
            );
            Some(out)
        }
        DbKey::RawKey(raw) => Some(*raw),
    }
}

/// HMAC-SHA256 over `data` under the derived key.
pub(crate) fn header_mac(key: &[u8; KEY_LEN], data: &[u8]) -> [u8; MAC_LEN] {
    // HMAC accepts keys of any length; this cannot fail.
    let Ok(mut mac) = <Hmac<Sha256> as Mac>::new_from_slice(key) else {
        return [0u8; MAC_LEN];
    };
    mac.update(data);
    let digest = mac.finalize().into_bytes();
    let mut out = [0u8; MAC_LEN];
    out.copy_from_slice(&digest);
    out
}

/// Seekable AES-256-CTR keystream applied over the record stream.
///
/// Position 0 corresponds to the first byte after the file header;
/// appending continues wherever the stream last stopped.
pub(crate) struct CtrStream {
    cipher: Aes256,
    iv: [u8; IV_LEN],
    position: u64,
}

impl CtrStream {
    pub(crate) fn new(key: &[u8; KEY_LEN], iv: &[u8; IV_LEN]) -> Self {
        Self {
            cipher: Aes256::new(key.into()),
            iv: *iv,
            position: 0,
        }
    }

    /// Move to an absolute stream position.
    pub(crate) fn seek(&mut self, position: u64) {
        self.position = position;
    }

    /// XOR `data` with the keystream at the current position, advancing
    /// it. Encryption and decryption are the same operation.
    pub(crate) fn apply(&mut self, data: &mut [u8]) {
        let mut index = 0usize;
        while index < data.len() {
            let block_index = self.position / 16;
            let offset = (self.position % 16) as usize;
            let keystream = self.keystream_block(block_index);
            let take = usize::min(16 - offset, data.len() - index);
            for i in 0..take {
                data[index + i] ^= keystream[offset + i];
            }
            index += take;
            self.position += take as u64;
        }
    }

    fn keystream_block(&self, block_index: u64) -> [u8; 16] {
        // The counter block is the IV treated as a 128-bit big-endian
        // integer plus the block index.
        let counter = u128::from_be_bytes(self.iv).wrapping_add(u128::from(block_index));
        let mut block = Block::from(counter.to_be_bytes());
        self.cipher.encrypt_block(&mut block);
        block.into()
    }
}
