//! Thread-local secp256k1 engine handle

use std::cell::OnceCell;

use rand::rngs::OsRng;
use secp256k1::{All, Secp256k1};

thread_local! {
    static ENGINE: OnceCell<CryptoContext> = const { OnceCell::new() };
}

/// Handle to the secp256k1 engine owned by the current thread.
///
/// Each OS thread gets its own engine, created lazily on first use and
/// torn down when the thread exits. The engine is never shared between
/// threads and no lock guards it. Engine faults surface as
/// [`CryptoError::Engine`](crate::CryptoError::Engine) on the failing
/// operation, so no error state outlives a call.
pub struct CryptoContext {
    engine: Secp256k1<All>,
}

impl CryptoContext {
    fn init() -> Self {
        let mut engine = Secp256k1::new();
        // Blinds the engine's precomputation tables
        engine.randomize(&mut OsRng);
        Self { engine }
    }

    /// Run `f` against the current thread's engine, creating it on first
    /// use within that thread.
    pub fn with<T>(f: impl FnOnce(&CryptoContext) -> T) -> T {
        ENGINE.with(|cell| f(cell.get_or_init(CryptoContext::init)))
    }

    pub(crate) fn engine(&self) -> &Secp256k1<All> {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use crate::PrivateKey;

    #[test]
    fn test_each_thread_gets_its_own_engine() {
        let key = PrivateKey::generate();
        let public = key.public_key();
        let signature = key.sign(b"cross-thread message");

        // Verification on another thread initializes that thread's engine
        let verified = std::thread::spawn(move || public.verify(b"cross-thread message", &signature))
            .join()
            .unwrap();
        assert!(verified);
    }

    #[test]
    fn test_engine_reuse_is_deterministic() {
        let key = PrivateKey::generate();
        assert_eq!(key.public_key(), key.public_key());
    }
}
