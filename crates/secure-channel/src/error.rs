//! Upgrade error types

use byte_stream::StreamError;
use peer_crypto::CryptoError;
use thiserror::Error;

/// Secure-channel upgrade error
#[derive(Debug, Error)]
pub enum UpgradeError {
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

impl UpgradeError {
    /// Fold any fault raised while handshaking into a handshake failure,
    /// keeping the cause in the message.
    pub(crate) fn during_handshake(self) -> Self {
        match self {
            Self::HandshakeFailed(_) => self,
            other => Self::HandshakeFailed(other.to_string()),
        }
    }
}

pub type UpgradeResult<T> = Result<T, UpgradeError>;
