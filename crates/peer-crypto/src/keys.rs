//! Private and public identity keys

use std::fmt;
use std::hash::{Hash, Hasher};

use rand::RngCore;
use rand::rngs::OsRng;
use secp256k1::ecdh::SharedSecret;
use zeroize::Zeroizing;

use crate::{
    CryptoContext, CryptoError, CryptoResult, PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE,
    SHARED_SECRET_SIZE, UNCOMPRESSED_PUBLIC_KEY_SIZE,
};

/// Decode hex text, ignoring case and embedded whitespace.
pub(crate) fn decode_hex(text: &str) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let stripped = Zeroizing::new(
        text.chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect::<String>(),
    );
    hex::decode(stripped.as_str())
        .map(Zeroizing::new)
        .map_err(|e| CryptoError::InvalidFormat(format!("bad hex: {e}")))
}

/// secp256k1 private key backing a peer identity.
///
/// Never printed or logged; `Debug` is opaque. Call [`wipe`](Self::wipe)
/// when disposing of a key.
pub struct PrivateKey {
    pub(crate) inner: secp256k1::SecretKey,
}

impl PrivateKey {
    /// Generate a fresh key from the OS random source.
    ///
    /// Rejection-samples until the scalar passes curve-order validation;
    /// virtually always the first draw.
    pub fn generate() -> Self {
        let mut buf = Zeroizing::new([0u8; PRIVATE_KEY_SIZE]);
        let mut attempts = 0u32;
        loop {
            OsRng.fill_bytes(&mut buf[..]);
            match secp256k1::SecretKey::from_slice(&buf[..]) {
                Ok(inner) => {
                    if attempts > 0 {
                        tracing::debug!(attempts, "rejection sampling retried during key generation");
                    }
                    return Self { inner };
                }
                Err(_) => attempts += 1,
            }
        }
    }

    /// Parse a raw 32-byte scalar.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        if bytes.len() != PRIVATE_KEY_SIZE {
            return Err(CryptoError::InvalidFormat(format!(
                "private key must be {PRIVATE_KEY_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        let inner = secp256k1::SecretKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidFormat(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse from hex text.
    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        let bytes = decode_hex(text)?;
        Self::from_bytes(&bytes)
    }

    /// Raw scalar bytes.
    pub fn to_bytes(&self) -> [u8; PRIVATE_KEY_SIZE] {
        self.inner.secret_bytes()
    }

    /// Lowercase hex of the raw scalar.
    pub fn to_hex(&self) -> String {
        let bytes = Zeroizing::new(self.to_bytes());
        hex::encode(&bytes[..])
    }

    /// Derive the matching public key. Deterministic for a given key.
    pub fn public_key(&self) -> PublicKey {
        CryptoContext::with(|ctx| PublicKey {
            inner: secp256k1::PublicKey::from_secret_key(ctx.engine(), &self.inner),
        })
    }

    /// ECDH shared secret with a peer's public key.
    pub fn shared_secret(&self, peer: &PublicKey) -> [u8; SHARED_SECRET_SIZE] {
        SharedSecret::new(&peer.inner, &self.inner).secret_bytes()
    }

    /// Overwrite the scalar in place. The key is unusable afterwards.
    pub fn wipe(&mut self) {
        self.inner.non_secure_erase();
    }
}

impl PartialEq for PrivateKey {
    fn eq(&self, other: &Self) -> bool {
        self.inner.secret_bytes() == other.inner.secret_bytes()
    }
}

impl Eq for PrivateKey {}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(..)")
    }
}

/// secp256k1 public key identifying a peer.
#[derive(Clone, Copy)]
pub struct PublicKey {
    pub(crate) inner: secp256k1::PublicKey,
}

impl PublicKey {
    /// Parse a SEC1-encoded point.
    ///
    /// Compressed (33 bytes, tag `0x02`/`0x03`) and uncompressed or
    /// hybrid (65 bytes, tag `0x04`/`0x06`/`0x07`) encodings are
    /// accepted.
    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let expected = match bytes.first() {
            Some(0x02 | 0x03) => PUBLIC_KEY_SIZE,
            Some(0x04 | 0x06 | 0x07) => UNCOMPRESSED_PUBLIC_KEY_SIZE,
            Some(tag) => {
                return Err(CryptoError::InvalidFormat(format!(
                    "unrecognized public key tag 0x{tag:02x}"
                )));
            }
            None => return Err(CryptoError::InvalidFormat("empty public key".into())),
        };
        if bytes.len() != expected {
            return Err(CryptoError::InvalidFormat(format!(
                "public key with tag 0x{:02x} must be {expected} bytes, got {}",
                bytes[0],
                bytes.len()
            )));
        }
        let inner = secp256k1::PublicKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidFormat(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse from hex text.
    pub fn from_hex(text: &str) -> CryptoResult<Self> {
        Self::from_bytes(&decode_hex(text)?)
    }

    /// Canonical serialized form: SEC1 compressed.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.inner.serialize()
    }

    /// Uncompressed SEC1 form (`0x04` tag).
    pub fn to_uncompressed(&self) -> [u8; UNCOMPRESSED_PUBLIC_KEY_SIZE] {
        self.inner.serialize_uncompressed()
    }

    /// Lowercase hex of the canonical form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }
}

// Equality and hashing go through the canonical serialized form so that
// keys parsed from different encodings of the same point compare equal.
impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.to_bytes());
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
