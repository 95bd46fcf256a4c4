//! Byte Stream - uniform stream contract over raw transports
//!
//! Normalizes a concrete transport's read/write/close semantics into one
//! adapter with a small error taxonomy, so upper layers never depend on
//! transport-specific fault types.

mod error;
mod stream;
mod transport;

pub use error::*;
pub use stream::*;
pub use transport::*;

/// Default bound on a single requested read (16 MiB)
pub const DEFAULT_MAX_READ: usize = 16 * 1024 * 1024;
