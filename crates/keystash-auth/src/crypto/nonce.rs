//! Random identifier generation.

use rand::Rng;
use rand::distributions::Alphanumeric;

/// Default length of generated nonces.
pub const DEFAULT_NONCE_LENGTH: usize = 16;

/// Generates unpredictable alphanumeric strings for client ids, secrets,
/// codes and tokens.
///
/// Backed by `rand::thread_rng()`, a CSPRNG seeded from the operating system
/// and reseeded periodically. Each thread has its own generator, so a shared
/// `NonceGenerator` needs no locking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NonceGenerator {
    length: usize,
}

impl NonceGenerator {
    /// Creates a generator producing strings of `length` characters.
    #[must_use]
    pub fn new(length: usize) -> Self {
        Self { length }
    }

    /// Length of every generated string.
    #[must_use]
    pub fn length(&self) -> usize {
        self.length
    }

    /// Generates a fresh nonce.
    #[must_use]
    pub fn generate(&self) -> String {
        rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(self.length)
            .map(char::from)
            .collect()
    }
}

impl Default for NonceGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_NONCE_LENGTH)
    }
}
