//! The logical connection handed to upper layers

use byte_stream::CloseSignal;
use bytes::Bytes;
use peer_crypto::PublicKey;
use tracing::debug;

use crate::{SecureConnection, UpgradeResult};

/// Authenticated, encrypted logical connection.
///
/// Reads and writes forward to the secured connection's framed message
/// operations. A fault during secured I/O closes the connection; the
/// fault is returned to the caller once and the close notification fires
/// once.
pub struct Connection {
    secure: Box<dyn SecureConnection>,
    remote_peer: PublicKey,
}

impl Connection {
    /// Wrap a completed handshake's secured connection. The peer identity
    /// is taken from the verified handshake result; no earlier state ever
    /// exposes one.
    pub fn new(secure: Box<dyn SecureConnection>) -> Self {
        let remote_peer = *secure.remote_identity();
        Self {
            secure,
            remote_peer,
        }
    }

    /// The authenticated remote peer identity.
    pub fn remote_peer(&self) -> &PublicKey {
        &self.remote_peer
    }

    /// Read one decrypted message.
    pub async fn read(&mut self) -> UpgradeResult<Bytes> {
        match self.secure.read_message().await {
            Ok(payload) => Ok(payload),
            Err(err) => {
                self.shutdown_on_fault().await;
                Err(err)
            }
        }
    }

    /// Write one message, encrypted.
    pub async fn write(&mut self, payload: &[u8]) -> UpgradeResult<()> {
        match self.secure.write_message(payload).await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.shutdown_on_fault().await;
                Err(err)
            }
        }
    }

    /// Close the connection and, through it, the raw stream. Idempotent.
    pub async fn close(&mut self) -> UpgradeResult<()> {
        self.secure.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.secure.is_closed()
    }

    /// One-shot close notification.
    pub fn closed(&self) -> CloseSignal {
        self.secure.closed()
    }

    async fn shutdown_on_fault(&mut self) {
        if let Err(err) = self.secure.close().await {
            debug!(error = %err, "close after connection fault failed");
        }
    }
}
