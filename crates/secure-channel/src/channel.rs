//! Pluggable handshake and secured-connection contracts

use async_trait::async_trait;
use byte_stream::{ByteStream, CloseSignal};
use bytes::Bytes;
use peer_crypto::PublicKey;

use crate::UpgradeResult;

/// A secure-channel protocol: one concrete handshake algorithm.
///
/// `upgrade` consumes the raw stream and either returns a secured
/// connection bound to the verified remote identity, or closes the raw
/// stream and reports a handshake failure.
#[async_trait]
pub trait SecureChannel: Send + Sync {
    async fn upgrade(
        &self,
        stream: ByteStream,
        initiator: bool,
    ) -> UpgradeResult<Box<dyn SecureConnection>>;
}

/// A stream whose messages are encrypted, produced only by a completed
/// handshake. Owns the raw stream; closing cascades down to it.
#[async_trait]
pub trait SecureConnection: Send {
    /// Read and decrypt one framed message.
    async fn read_message(&mut self) -> UpgradeResult<Bytes>;

    /// Encrypt and write one framed message.
    async fn write_message(&mut self, payload: &[u8]) -> UpgradeResult<()>;

    /// The remote peer's verified public key.
    fn remote_identity(&self) -> &PublicKey;

    /// Close the underlying raw stream. Idempotent.
    async fn close(&mut self) -> UpgradeResult<()>;

    fn is_closed(&self) -> bool;

    /// One-shot close notification of the underlying stream.
    fn closed(&self) -> CloseSignal;
}
