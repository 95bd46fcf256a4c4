//! Session cipher: ChaCha20Poly1305 keyed by an ECDH shared secret

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use zeroize::Zeroizing;

use crate::{CryptoError, CryptoResult, NONCE_SIZE, SHARED_SECRET_SIZE, TAG_SIZE};

/// Which side of the handshake this cipher belongs to (affects nonces)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// We initiated the connection
    Initiator,
    /// We accepted the connection
    Responder,
}

/// Established symmetric session state.
///
/// One instance per secured connection; the owning task is the only
/// mutator.
pub struct SessionCipher {
    cipher: ChaCha20Poly1305,
    send_counter: u64,
    recv_counter: u64,
    direction: Direction,
}

impl SessionCipher {
    /// Key a cipher from an ECDH shared secret.
    pub fn new(
        shared_secret: &[u8; SHARED_SECRET_SIZE],
        direction: Direction,
    ) -> CryptoResult<Self> {
        let key = Zeroizing::new(*shared_secret);
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| CryptoError::Engine(e.to_string()))?;

        Ok(Self {
            cipher,
            send_counter: 0,
            recv_counter: 0,
            direction,
        })
    }

    /// Nonce layout: [4-byte direction prefix][8-byte counter].
    fn nonce(&self, counter: u64, sending: bool) -> [u8; NONCE_SIZE] {
        let mut nonce = [0u8; NONCE_SIZE];

        // Direction prefix keeps the two sides' nonce streams disjoint
        let prefix: u32 = match (self.direction, sending) {
            (Direction::Initiator, true) => 0x00000000,
            (Direction::Initiator, false) => 0xFFFFFFFF,
            (Direction::Responder, true) => 0xFFFFFFFF,
            (Direction::Responder, false) => 0x00000000,
        };

        nonce[0..4].copy_from_slice(&prefix.to_le_bytes());
        nonce[4..12].copy_from_slice(&counter.to_le_bytes());

        nonce
    }

    /// Encrypt one message. Output is the ciphertext plus the 16-byte tag.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        if self.send_counter == u64::MAX {
            return Err(CryptoError::NonceOverflow);
        }

        let nonce_bytes = self.nonce(self.send_counter, true);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| CryptoError::Engine(e.to_string()))?;

        self.send_counter += 1;

        Ok(ciphertext)
    }

    /// Decrypt and authenticate one message.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        if ciphertext.len() < TAG_SIZE {
            return Err(CryptoError::DecryptFailed);
        }

        if self.recv_counter == u64::MAX {
            return Err(CryptoError::NonceOverflow);
        }

        let nonce_bytes = self.nonce(self.recv_counter, false);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::DecryptFailed)?;

        self.recv_counter += 1;

        Ok(plaintext)
    }
}
