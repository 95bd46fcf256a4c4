//! Upgrade driver: initiator and responder paths

use std::future::Future;
use std::sync::Arc;

use byte_stream::ByteStream;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{Connection, SecureChannel, UpgradeResult};

/// Drives a pluggable secure channel over raw streams.
#[derive(Clone)]
pub struct Upgrader {
    channel: Arc<dyn SecureChannel>,
}

impl Upgrader {
    pub fn new(channel: Arc<dyn SecureChannel>) -> Self {
        Self { channel }
    }

    /// Initiator path: upgrade a dialed raw stream.
    ///
    /// On handshake failure the raw stream has already been closed; the
    /// failure propagates to the caller.
    pub async fn secure(&self, stream: ByteStream) -> UpgradeResult<Connection> {
        let secure = self.channel.upgrade(stream, true).await?;
        let conn = Connection::new(secure);
        debug!(peer = %conn.remote_peer(), "outbound connection secured");
        Ok(conn)
    }

    /// Responder path: upgrade one accepted raw stream.
    ///
    /// A failed handshake is contained: the raw stream is closed, the
    /// failure logged, and `None` returned, so the acceptor keeps serving
    /// other connections.
    pub async fn accept(&self, stream: ByteStream) -> Option<Connection> {
        let remote = stream.remote_addr();
        match self.channel.upgrade(stream, false).await {
            Ok(secure) => {
                let conn = Connection::new(secure);
                debug!(peer = %conn.remote_peer(), "inbound connection secured");
                Some(conn)
            }
            Err(err) => {
                warn!(?remote, error = %err, "inbound handshake failed");
                None
            }
        }
    }

    /// Accept loop: upgrade each inbound raw stream on its own task and
    /// hand the secured connection to `handler`. One peer's failed
    /// handshake never aborts the loop.
    pub async fn serve<H, Fut>(&self, mut incoming: mpsc::Receiver<ByteStream>, handler: H)
    where
        H: Fn(Connection) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler = Arc::new(handler);
        while let Some(stream) = incoming.recv().await {
            let upgrader = self.clone();
            let handler = Arc::clone(&handler);
            tokio::spawn(async move {
                if let Some(conn) = upgrader.accept(stream).await {
                    handler(conn).await;
                }
            });
        }
        info!("accept loop finished: no more inbound streams");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use byte_stream::{IoTransport, StreamError};
    use peer_crypto::{PrivateKey, PublicKey};

    use crate::{SignedKeyExchange, UpgradeError};

    fn stream_pair() -> (ByteStream, ByteStream) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            ByteStream::new(IoTransport::new(a)),
            ByteStream::new(IoTransport::new(b)),
        )
    }

    fn upgrader(identity: PrivateKey) -> Upgrader {
        Upgrader::new(Arc::new(SignedKeyExchange::new(identity)))
    }

    #[tokio::test]
    async fn test_end_to_end_upgrade() {
        let dialer_key = PrivateKey::generate();
        let listener_key = PrivateKey::generate();
        let dialer_id = dialer_key.public_key();
        let listener_id = listener_key.public_key();

        let dialer = upgrader(dialer_key);
        let listener = upgrader(listener_key);

        let (a, b) = stream_pair();
        let (outbound, inbound) = futures::join!(dialer.secure(a), listener.accept(b));

        let mut outbound = outbound.unwrap();
        let mut inbound = inbound.expect("inbound handshake should succeed");

        assert_eq!(*outbound.remote_peer(), listener_id);
        assert_eq!(*inbound.remote_peer(), dialer_id);

        outbound.write(b"ahoy from the dialer").await.unwrap();
        assert_eq!(&inbound.read().await.unwrap()[..], b"ahoy from the dialer");

        inbound.write(b"ahoy back").await.unwrap();
        assert_eq!(&outbound.read().await.unwrap()[..], b"ahoy back");
    }

    #[tokio::test]
    async fn test_failed_inbound_handshake_is_contained() {
        let listener = upgrader(PrivateKey::generate());

        // A peer that speaks garbage instead of a hello
        let (mut rogue, honest) = stream_pair();
        let garbage = async {
            let _ = rogue.write_all(&[0xff; 8]).await;
        };
        let (_, upgraded) = futures::join!(garbage, listener.accept(honest));
        assert!(upgraded.is_none());

        // The same listener still serves a later well-behaved peer
        let dialer = upgrader(PrivateKey::generate());
        let (a, b) = stream_pair();
        let (outbound, inbound) = futures::join!(dialer.secure(a), listener.accept(b));
        assert!(outbound.is_ok());
        assert!(inbound.is_some());
    }

    #[tokio::test]
    async fn test_failed_outbound_handshake_propagates() {
        let dialer = upgrader(PrivateKey::generate());

        let (a, mut b) = stream_pair();
        let respond_garbage = async {
            // Consume the dialer's hello, then answer with an oversized
            // frame header
            let mut prefix = [0u8; 4];
            b.read_exact(&mut prefix).await.unwrap();
            let mut hello = vec![0u8; u32::from_be_bytes(prefix) as usize];
            b.read_exact(&mut hello).await.unwrap();
            b.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        };

        let (result, ()) = futures::join!(dialer.secure(a), respond_garbage);
        assert!(matches!(result, Err(UpgradeError::HandshakeFailed(_))));
    }

    #[tokio::test]
    async fn test_close_cascades_and_fires_once() {
        let dialer = upgrader(PrivateKey::generate());
        let listener = upgrader(PrivateKey::generate());

        let (a, b) = stream_pair();
        let (outbound, inbound) = futures::join!(dialer.secure(a), listener.accept(b));
        let _outbound = outbound.unwrap();
        let mut inbound = inbound.unwrap();

        let first = inbound.closed();
        let second = inbound.closed();

        inbound.close().await.unwrap();
        inbound.close().await.unwrap();
        assert!(inbound.is_closed());

        first.wait().await;
        second.wait().await;

        // Operations on the closed connection fail with a stream error
        let err = inbound.read().await.unwrap_err();
        assert!(matches!(err, UpgradeError::Stream(StreamError::Eof)));
    }

    #[tokio::test]
    async fn test_serve_isolates_failed_handshakes() {
        let listener = upgrader(PrivateKey::generate());
        let (stream_tx, stream_rx) = mpsc::channel(4);
        let (done_tx, mut done_rx) = mpsc::channel::<PublicKey>(4);

        // Rogue peer first
        let (mut rogue, honest) = stream_pair();
        tokio::spawn(async move {
            let _ = rogue.write_all(&[0xff; 8]).await;
        });
        stream_tx.send(honest).await.unwrap();

        // Then a well-behaved one
        let dialer_key = PrivateKey::generate();
        let dialer_id = dialer_key.public_key();
        let dialer = upgrader(dialer_key);
        let (a, b) = stream_pair();
        let dial = tokio::spawn(async move { dialer.secure(a).await });
        stream_tx.send(b).await.unwrap();
        drop(stream_tx);

        listener
            .serve(stream_rx, move |conn| {
                let done = done_tx.clone();
                async move {
                    let _ = done.send(*conn.remote_peer()).await;
                }
            })
            .await;

        assert!(dial.await.unwrap().is_ok());
        // Only the well-behaved peer reaches the handler
        assert_eq!(done_rx.recv().await, Some(dialer_id));
        assert_eq!(done_rx.recv().await, None);
    }
}
