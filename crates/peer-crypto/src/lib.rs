//! Peer Crypto - secp256k1 identity primitives for Hawser
//!
//! Provides private/public key handling, recoverable ECDSA signatures,
//! and the ChaCha20Poly1305 session cipher keyed by ECDH.

mod cipher;
mod context;
mod error;
mod keys;
mod signature;

pub use cipher::*;
pub use context::*;
pub use error::*;
pub use keys::*;
pub use signature::*;

/// Private key size (256-bit scalar / 32 bytes)
pub const PRIVATE_KEY_SIZE: usize = 32;

/// Serialized public key size (SEC1 compressed / 33 bytes)
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Serialized uncompressed public key size (65 bytes)
pub const UNCOMPRESSED_PUBLIC_KEY_SIZE: usize = 65;

/// Serialized signature size: r and s plus one recovery id byte
pub const SIGNATURE_SIZE: usize = 2 * PRIVATE_KEY_SIZE + 1;

/// Shared secret size (256 bits / 32 bytes)
pub const SHARED_SECRET_SIZE: usize = 32;

/// Nonce size for ChaCha20Poly1305 (96 bits / 12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits / 16 bytes)
pub const TAG_SIZE: usize = 16;
