//! Deterministic credential encryption.
//!
//! Each call derives two subkeys from the application secret and a
//! per-record password with HKDF-SHA256:
//!
//! - an AES-256-GCM key that encrypts the value
//! - an HMAC-SHA256 key whose tag over the plaintext becomes the GCM nonce
//!
//! Deriving the nonce from the plaintext (a synthetic IV) makes encryption
//! deterministic while a nonce can only repeat for an identical plaintext
//! under the same key. Output is `base64(nonce || ciphertext || tag)`.

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use super::CryptoError;
use crate::config::MIN_SECRET_KEY_LEN;

/// Largest plaintext accepted by [`Cryptograph::encrypt`], in bytes.
pub const MAX_PLAINTEXT_LEN: usize = 256;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KEY_LEN: usize = 32;

const ENC_KEY_INFO: &[u8] = b"keystash/credential/enc";
const SIV_KEY_INFO: &[u8] = b"keystash/credential/siv";

type HmacSha256 = Hmac<Sha256>;

/// Symmetric encryption of short credential strings.
#[derive(Clone)]
pub struct Cryptograph {
    secret: Vec<u8>,
}

impl std::fmt::Debug for Cryptograph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cryptograph").finish_non_exhaustive()
    }
}

impl Cryptograph {
    /// Creates a cryptograph keyed by the application secret.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::InvalidKey` if the secret is shorter than
    /// [`MIN_SECRET_KEY_LEN`] bytes.
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self, CryptoError> {
        let secret = secret.as_ref();
        if secret.len() < MIN_SECRET_KEY_LEN {
            return Err(CryptoError::InvalidKey(format!(
                "application secret must be at least {MIN_SECRET_KEY_LEN} bytes, got {}",
                secret.len()
            )));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    /// Encrypts `plaintext` under the application secret and `password`.
    ///
    /// The same inputs always produce the same ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::PlaintextTooLong` if `plaintext` exceeds
    /// [`MAX_PLAINTEXT_LEN`] bytes.
    pub fn encrypt(&self, plaintext: &str, password: &str) -> Result<String, CryptoError> {
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(CryptoError::PlaintextTooLong {
                len: plaintext.len(),
                max: MAX_PLAINTEXT_LEN,
            });
        }

        let (enc_key, siv_key) = self.derive_keys(password)?;
        let tag = siv_mac(&siv_key, plaintext.as_bytes())?.finalize().into_bytes();
        let nonce = &tag[..NONCE_LEN];

        let cipher = Aes256Gcm::new_from_slice(&enc_key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let sealed = cipher
            .encrypt(Nonce::from_slice(nonce), plaintext.as_bytes())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(nonce);
        out.extend_from_slice(&sealed);
        Ok(BASE64.encode(out))
    }

    /// Decrypts a value produced by [`encrypt`](Self::encrypt) with the same
    /// `password`.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::MalformedCiphertext` if the input is not valid
    /// base64 or has an impossible length, and
    /// `CryptoError::DecryptionFailed` if the password, secret or ciphertext
    /// do not match.
    pub fn decrypt(&self, ciphertext: &str, password: &str) -> Result<String, CryptoError> {
        let bytes = BASE64
            .decode(ciphertext)
            .map_err(|e| CryptoError::MalformedCiphertext(format!("invalid base64: {e}")))?;

        if bytes.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "expected at least {} bytes, got {}",
                NONCE_LEN + TAG_LEN,
                bytes.len()
            )));
        }
        if bytes.len() > NONCE_LEN + TAG_LEN + MAX_PLAINTEXT_LEN {
            return Err(CryptoError::MalformedCiphertext(format!(
                "ciphertext of {} bytes exceeds the supported size",
                bytes.len()
            )));
        }

        let (nonce, sealed) = bytes.split_at(NONCE_LEN);
        let (enc_key, siv_key) = self.derive_keys(password)?;

        let cipher = Aes256Gcm::new_from_slice(&enc_key)
            .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), sealed)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        // The nonce must be the one this plaintext would have produced.
        siv_mac(&siv_key, &plaintext)?
            .verify_truncated_left(nonce)
            .map_err(|_| CryptoError::DecryptionFailed)?;

        String::from_utf8(plaintext)
            .map_err(|e| CryptoError::MalformedCiphertext(format!("invalid UTF-8: {e}")))
    }

    fn derive_keys(&self, password: &str) -> Result<([u8; KEY_LEN], [u8; KEY_LEN]), CryptoError> {
        let hk = Hkdf::<Sha256>::new(Some(self.secret.as_slice()), password.as_bytes());

        let mut enc_key = [0u8; KEY_LEN];
        let mut siv_key = [0u8; KEY_LEN];
        hk.expand(ENC_KEY_INFO, &mut enc_key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        hk.expand(SIV_KEY_INFO, &mut siv_key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok((enc_key, siv_key))
    }
}

fn siv_mac(key: &[u8], plaintext: &[u8]) -> Result<HmacSha256, CryptoError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;
    mac.update(plaintext);
    Ok(mac)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-application-secret";

    fn cryptograph() -> Cryptograph {
        Cryptograph::new(SECRET).unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let c = cryptograph();
        let ct = c.encrypt("s3cr3t", "client-1").unwrap();
        assert_ne!(ct, "s3cr3t");
        assert_eq!(c.decrypt(&ct, "client-1").unwrap(), "s3cr3t");
    }

    #[test]
    fn test_empty_and_max_length_plaintext() {
        let c = cryptograph();
        let ct = c.encrypt("", "p").unwrap();
        assert_eq!(c.decrypt(&ct, "p").unwrap(), "");

        let max = "x".repeat(MAX_PLAINTEXT_LEN);
        let ct = c.encrypt(&max, "p").unwrap();
        assert_eq!(c.decrypt(&ct, "p").unwrap(), max);
    }

    #[test]
    fn test_deterministic() {
        let c = cryptograph();
        assert_eq!(
            c.encrypt("value", "pw").unwrap(),
            c.encrypt("value", "pw").unwrap()
        );
        assert_ne!(
            c.encrypt("value", "pw").unwrap(),
            c.encrypt("value", "other").unwrap()
        );
        assert_ne!(
            c.encrypt("value", "pw").unwrap(),
            c.encrypt("valuf", "pw").unwrap()
        );
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let err = cryptograph()
            .encrypt(&"x".repeat(MAX_PLAINTEXT_LEN + 1), "p")
            .unwrap_err();
        assert!(matches!(
            err,
            CryptoError::PlaintextTooLong { len: 257, max: 256 }
        ));
    }

    #[test]
    fn test_wrong_password_fails() {
        let c = cryptograph();
        let ct = c.encrypt("value", "right").unwrap();
        assert!(matches!(
            c.decrypt(&ct, "wrong"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_wrong_secret_fails() {
        let ct = cryptograph().encrypt("value", "pw").unwrap();
        let other = Cryptograph::new("another-application-secret").unwrap();
        assert!(matches!(
            other.decrypt(&ct, "pw"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let c = cryptograph();
        let ct = c.encrypt("value", "pw").unwrap();
        let mut bytes = BASE64.decode(&ct).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = BASE64.encode(bytes);
        assert!(matches!(
            c.decrypt(&tampered, "pw"),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_malformed_input() {
        let c = cryptograph();
        assert!(matches!(
            c.decrypt("not base64!!", "pw"),
            Err(CryptoError::MalformedCiphertext(_))
        ));
        assert!(matches!(
            c.decrypt(&BASE64.encode([0u8; 10]), "pw"),
            Err(CryptoError::MalformedCiphertext(_))
        ));
    }

    #[test]
    fn test_short_secret_rejected() {
        assert!(matches!(
            Cryptograph::new("short"),
            Err(CryptoError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", cryptograph());
        assert!(!rendered.contains(SECRET));
    }
}
