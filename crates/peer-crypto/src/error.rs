//! Crypto error types

use thiserror::Error;

/// Cryptographic operation error
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Malformed key material: {0}")]
    InvalidFormat(String),

    #[error("Crypto engine failure: {0}")]
    Engine(String),

    #[error("Decryption failed: authentication tag mismatch")]
    DecryptFailed,

    #[error("Nonce overflow: maximum message count exceeded")]
    NonceOverflow,
}

pub type CryptoResult<T> = Result<T, CryptoError>;
