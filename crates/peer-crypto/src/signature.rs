//! Recoverable ECDSA signatures

use std::fmt;

use secp256k1::Message;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use sha2::{Digest, Sha256};

use crate::keys::decode_hex;
use crate::{CryptoContext, CryptoError, CryptoResult, PrivateKey, PublicKey, SIGNATURE_SIZE};

/// SHA-256 message digest, the fixed pre-signing hash.
fn digest(message: &[u8]) -> Message {
    let hash: [u8; 32] = Sha256::digest(message).into();
    Message::from_digest(hash)
}

/// Recoverable signature over the SHA-256 digest of a message.
#[derive(Clone, Copy)]
pub struct Signature {
    inner: RecoverableSignature,
}

impl Signature {
    /// Parse the 65-byte `r || s || recovery-id` layout.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != SIGNATURE_SIZE {
            return Err(CryptoError::InvalidFormat(format!(
                "signature must be {SIGNATURE_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let recovery = bytes[SIGNATURE_SIZE - 1];
        if recovery > 3 {
            return Err(CryptoError::InvalidFormat(format!(
                "recovery id {recovery} out of range"
            )));
        }
        let id = RecoveryId::from_i32(i32::from(recovery))
            .map_err(|e| CryptoError::InvalidFormat(e.to_string()))?;
        let inner = RecoverableSignature::from_compact(&bytes[..SIGNATURE_SIZE - 1], id)
            .map_err(|e| CryptoError::InvalidFormat(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse from hex text.
    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        Self::from_bytes(&decode_hex(text)?)
    }

    /// Serialize as `r || s || recovery-id`.
    pub fn to_bytes(&self) -> [u8; SIGNATURE_SIZE] {
        let (id, compact) = self.inner.serialize_compact();
        let mut out = [0u8; SIGNATURE_SIZE];
        out[..SIGNATURE_SIZE - 1].copy_from_slice(&compact);
        out[SIGNATURE_SIZE - 1] = id.to_i32() as u8;
        out
    }

    /// Lowercase hex of the serialized form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    /// Recover the signing public key from this signature and the message.
    pub fn recover(&self, message: &[u8]) -> CryptoResult<PublicKey> {
        let msg = digest(message);
        CryptoContext::with(|ctx| {
            ctx.engine()
                .recover_ecdsa(&msg, &self.inner)
                .map(|inner| PublicKey { inner })
                .map_err(|e| CryptoError::Engine(e.to_string()))
        })
    }
}

impl PartialEq for Signature {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for Signature {}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({})", self.to_hex())
    }
}

impl PrivateKey {
    /// Sign a message with this key.
    pub fn sign(&self, message: &[u8]) -> Signature {
        let msg = digest(message);
        CryptoContext::with(|ctx| Signature {
            inner: ctx.engine().sign_ecdsa_recoverable(&msg, &self.inner),
        })
    }
}

impl PublicKey {
    /// Verify a signature: recover the candidate key and compare in
    /// canonical form. Mismatch and unrecoverable input return `false`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        match signature.recover(message) {
            Ok(candidate) => candidate == *self,
            Err(_) => false,
        }
    }
}
