//! Signature-authenticated key exchange
//!
//! Each side sends one hello: a fresh ephemeral key, its identity key,
//! and a recoverable signature by the identity key over the ephemeral
//! key bytes. ECDH over the ephemerals keys the session cipher; the
//! verified identity key becomes the connection's remote identity.

use async_trait::async_trait;
use byte_stream::{ByteStream, CloseSignal, StreamError};
use bytes::Bytes;
use peer_crypto::{Direction, PrivateKey, PublicKey, SessionCipher, Signature};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{
    LENGTH_PREFIX_SIZE, MAX_MESSAGE_SIZE, SecureChannel, SecureConnection, UpgradeError,
    UpgradeResult,
};

/// Largest hello frame a peer may send
const MAX_HELLO_SIZE: usize = 1024;

/// Handshake hello, exchanged exactly once per side.
///
/// Field lengths are enforced by the parse functions after decoding.
#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    /// Ephemeral public key for this session (SEC1 compressed)
    ephemeral: Vec<u8>,
    /// Long-lived identity public key (SEC1 compressed)
    identity: Vec<u8>,
    /// Identity-key signature over the ephemeral key bytes
    signature: Vec<u8>,
}

impl Hello {
    fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}

async fn send_frame(stream: &mut ByteStream, payload: &[u8]) -> UpgradeResult<()> {
    let len = u32::try_from(payload.len())
        .map_err(|_| UpgradeError::HandshakeFailed("frame exceeds u32 range".into()))?;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    Ok(())
}

async fn recv_frame(stream: &mut ByteStream, max_len: usize) -> UpgradeResult<Vec<u8>> {
    let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
    stream.read_exact(&mut prefix).await?;
    let len = u32::from_be_bytes(prefix) as usize;
    if len > max_len {
        return Err(UpgradeError::Stream(StreamError::LimitExceeded {
            requested: len,
            limit: max_len,
        }));
    }

    let mut payload = vec![0u8; len];
    stream.read_exact(&mut payload).await?;
    Ok(payload)
}

async fn recv_hello(stream: &mut ByteStream) -> UpgradeResult<Hello> {
    let bytes = recv_frame(stream, MAX_HELLO_SIZE).await?;
    Hello::from_bytes(&bytes)
        .map_err(|e| UpgradeError::HandshakeFailed(format!("malformed hello: {e}")))
}

/// Signature-authenticated secure channel over secp256k1 identities.
pub struct SignedKeyExchange {
    identity: PrivateKey,
}

impl SignedKeyExchange {
    pub fn new(identity: PrivateKey) -> Self {
        Self { identity }
    }

    /// The local identity this channel authenticates as.
    pub fn local_identity(&self) -> PublicKey {
        self.identity.public_key()
    }

    async fn run_handshake(
        &self,
        stream: &mut ByteStream,
        initiator: bool,
    ) -> UpgradeResult<(SessionCipher, PublicKey)> {
        let ephemeral = PrivateKey::generate();
        let ephemeral_pub = ephemeral.public_key().to_bytes();

        let hello = Hello {
            ephemeral: ephemeral_pub.to_vec(),
            identity: self.identity.public_key().to_bytes().to_vec(),
            signature: self.identity.sign(&ephemeral_pub).to_bytes().to_vec(),
        };
        let hello_bytes = hello
            .to_bytes()
            .map_err(|e| UpgradeError::HandshakeFailed(format!("encoding hello: {e}")))?;

        // The initiator speaks first; the responder answers once the
        // initiator's hello has arrived
        let peer_hello = if initiator {
            send_frame(stream, &hello_bytes).await?;
            recv_hello(stream).await?
        } else {
            let peer = recv_hello(stream).await?;
            send_frame(stream, &hello_bytes).await?;
            peer
        };

        let peer_identity = PublicKey::from_bytes(&peer_hello.identity)?;
        let peer_ephemeral = PublicKey::from_bytes(&peer_hello.ephemeral)?;
        let signature = Signature::from_bytes(&peer_hello.signature)?;

        if !peer_identity.verify(&peer_hello.ephemeral, &signature) {
            return Err(UpgradeError::HandshakeFailed(
                "peer signature does not match claimed identity".into(),
            ));
        }

        let shared = ephemeral.shared_secret(&peer_ephemeral);
        let direction = if initiator {
            Direction::Initiator
        } else {
            Direction::Responder
        };
        let cipher = SessionCipher::new(&shared, direction)?;

        trace!(peer = %peer_identity, "handshake complete");
        Ok((cipher, peer_identity))
    }
}

#[async_trait]
impl SecureChannel for SignedKeyExchange {
    async fn upgrade(
        &self,
        mut stream: ByteStream,
        initiator: bool,
    ) -> UpgradeResult<Box<dyn SecureConnection>> {
        match self.run_handshake(&mut stream, initiator).await {
            Ok((cipher, peer_identity)) => Ok(Box::new(ExchangeConnection {
                stream,
                cipher,
                peer_identity,
            })),
            Err(err) => {
                // The raw stream never leaves this call on failure
                if let Err(close_err) = stream.close().await {
                    debug!(error = %close_err, "closing raw stream after failed handshake");
                }
                Err(err.during_handshake())
            }
        }
    }
}

/// Secured connection produced by [`SignedKeyExchange`].
///
/// Frames are a 4-byte big-endian ciphertext length followed by the
/// AEAD ciphertext.
pub struct ExchangeConnection {
    stream: ByteStream,
    cipher: SessionCipher,
    peer_identity: PublicKey,
}

#[async_trait]
impl SecureConnection for ExchangeConnection {
    async fn read_message(&mut self) -> UpgradeResult<Bytes> {
        let ciphertext = recv_frame(&mut self.stream, MAX_MESSAGE_SIZE).await?;
        let plaintext = self.cipher.decrypt(&ciphertext)?;
        Ok(Bytes::from(plaintext))
    }

    async fn write_message(&mut self, payload: &[u8]) -> UpgradeResult<()> {
        if payload.len() > MAX_MESSAGE_SIZE {
            return Err(UpgradeError::Stream(StreamError::LimitExceeded {
                requested: payload.len(),
                limit: MAX_MESSAGE_SIZE,
            }));
        }
        let ciphertext = self.cipher.encrypt(payload)?;
        send_frame(&mut self.stream, &ciphertext).await
    }

    fn remote_identity(&self) -> &PublicKey {
        &self.peer_identity
    }

    async fn close(&mut self) -> UpgradeResult<()> {
        Ok(self.stream.close().await?)
    }

    fn is_closed(&self) -> bool {
        self.stream.is_closed()
    }

    fn closed(&self) -> CloseSignal {
        self.stream.closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byte_stream::IoTransport;

    fn stream_pair() -> (ByteStream, ByteStream) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            ByteStream::new(IoTransport::new(a)),
            ByteStream::new(IoTransport::new(b)),
        )
    }

    #[test]
    fn test_hello_roundtrip() {
        let identity = PrivateKey::generate();
        let ephemeral = PrivateKey::generate().public_key().to_bytes();
        let hello = Hello {
            ephemeral: ephemeral.to_vec(),
            identity: identity.public_key().to_bytes().to_vec(),
            signature: identity.sign(&ephemeral).to_bytes().to_vec(),
        };

        let decoded = Hello::from_bytes(&hello.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.ephemeral, hello.ephemeral);
        assert_eq!(decoded.identity, hello.identity);
        assert_eq!(decoded.signature, hello.signature);
    }

    #[tokio::test]
    async fn test_exchange_connections_converge() {
        let initiator_key = PrivateKey::generate();
        let responder_key = PrivateKey::generate();
        let initiator_id = initiator_key.public_key();
        let responder_id = responder_key.public_key();

        let initiator = SignedKeyExchange::new(initiator_key);
        let responder = SignedKeyExchange::new(responder_key);

        let (a, b) = stream_pair();
        let (outbound, inbound) =
            futures::join!(initiator.upgrade(a, true), responder.upgrade(b, false));
        let mut outbound = outbound.unwrap();
        let mut inbound = inbound.unwrap();

        assert_eq!(*outbound.remote_identity(), responder_id);
        assert_eq!(*inbound.remote_identity(), initiator_id);

        outbound.write_message(b"over the wire").await.unwrap();
        assert_eq!(&inbound.read_message().await.unwrap()[..], b"over the wire");

        inbound.write_message(b"and back").await.unwrap();
        assert_eq!(&outbound.read_message().await.unwrap()[..], b"and back");
    }

    #[tokio::test]
    async fn test_forged_identity_is_rejected() {
        let (mut rogue, honest) = stream_pair();
        let responder = SignedKeyExchange::new(PrivateKey::generate());

        let forge = async {
            let ephemeral = PrivateKey::generate().public_key().to_bytes();
            // Signed by one key, claiming another
            let signer = PrivateKey::generate();
            let claimed = PrivateKey::generate();
            let hello = Hello {
                ephemeral: ephemeral.to_vec(),
                identity: claimed.public_key().to_bytes().to_vec(),
                signature: signer.sign(&ephemeral).to_bytes().to_vec(),
            };
            send_frame(&mut rogue, &hello.to_bytes().unwrap())
                .await
                .unwrap();
        };

        let (_, upgraded) = futures::join!(forge, responder.upgrade(honest, false));
        match upgraded {
            Err(UpgradeError::HandshakeFailed(reason)) => {
                assert!(reason.contains("identity"));
            }
            Err(other) => panic!("unexpected error kind: {other}"),
            Ok(_) => panic!("forged hello must not upgrade"),
        }
    }

    #[tokio::test]
    async fn test_oversized_hello_is_rejected() {
        let (mut rogue, honest) = stream_pair();
        let responder = SignedKeyExchange::new(PrivateKey::generate());

        let oversize = async {
            // Length prefix promising far more than the hello bound
            rogue.write_all(&u32::MAX.to_be_bytes()).await.unwrap();
        };

        let (_, upgraded) = futures::join!(oversize, responder.upgrade(honest, false));
        assert!(matches!(upgraded, Err(UpgradeError::HandshakeFailed(_))));
    }
}
