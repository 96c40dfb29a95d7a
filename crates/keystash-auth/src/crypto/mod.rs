//! Credential encryption and random identifier generation.

pub mod cryptograph;
pub mod nonce;

pub use cryptograph::{Cryptograph, MAX_PLAINTEXT_LEN};
pub use nonce::{DEFAULT_NONCE_LENGTH, NonceGenerator};

/// Errors raised by the [`Cryptograph`].
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The key material is unusable.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// The plaintext exceeds the supported size.
    #[error("Plaintext of {len} bytes exceeds the {max} byte limit")]
    PlaintextTooLong {
        /// Length of the rejected plaintext.
        len: usize,
        /// Largest accepted length.
        max: usize,
    },

    /// The ciphertext is not in the expected format.
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// Key derivation failed.
    #[error("Key derivation failed: {0}")]
    KeyDerivation(String),

    /// The cipher refused to encrypt.
    #[error("Encryption failed")]
    EncryptionFailed,

    /// Authentication of the ciphertext failed.
    #[error("Decryption failed")]
    DecryptionFailed,
}
