//! Symmetric encryption for stored provider API keys.
//!
//! Uses AES-256-GCM with a key derived from the server-held `encryption_key`
//! secret via SHA-256, so any secret string yields a key of the right length.
//! Output format: base64(nonce || ciphertext), fresh random 96-bit nonce per call.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose, Engine as _};
use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};
use thiserror::Error as ThisError;

const NONCE_LEN: usize = 12;

#[derive(ThisError, Debug)]
pub enum CryptoError {
    #[error("encryption failed")]
    Encrypt,

    /// Authentication tag did not verify: tampered ciphertext or wrong key.
    #[error("decryption failed")]
    Decrypt,

    #[error("invalid ciphertext encoding: {0}")]
    Decode(#[from] base64::DecodeError),

    #[error("ciphertext too short")]
    TooShort,

    #[error("decrypted data is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Cipher handle derived once from the configured secret and shared by clone.
#[derive(Clone)]
pub struct SecretCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Derives the AES-256 key as SHA-256 of the secret string.
    pub fn new(secret: &str) -> Self {
        let key: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Self { key }
    }

    /// Encrypts a string value.
    ///
    /// Returns base64-encoded encrypted data with the nonce prepended. The
    /// random nonce means encrypting the same plaintext twice produces
    /// different ciphertexts.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::Encrypt)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        thread_rng().fill(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher.encrypt(nonce, plaintext.as_bytes()).map_err(|_| CryptoError::Encrypt)?;

        let mut combined = nonce_bytes.to_vec();
        combined.extend_from_slice(&ciphertext);

        Ok(general_purpose::STANDARD.encode(combined))
    }

    /// Decrypts data produced by [`encrypt`](Self::encrypt).
    ///
    /// Fails with a recoverable [`CryptoError`] on malformed encoding, truncated
    /// input, or a failed authentication tag - callers treat any failure as
    /// "no usable key", never as a crash.
    pub fn decrypt(&self, blob: &str) -> Result<String, CryptoError> {
        let combined = general_purpose::STANDARD.decode(blob)?;

        if combined.len() < NONCE_LEN {
            return Err(CryptoError::TooShort);
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CryptoError::Decrypt)?;
        let plaintext = cipher.decrypt(nonce, ciphertext).map_err(|_| CryptoError::Decrypt)?;

        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let cipher = SecretCipher::new("test-secret");

        let plaintext = "gsk_live_0123456789abcdef";
        let encrypted = cipher.encrypt(plaintext).expect("encryption should succeed");

        // Should be valid base64
        assert!(general_purpose::STANDARD.decode(&encrypted).is_ok());

        let decrypted = cipher.decrypt(&encrypted).expect("decryption should succeed");
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_roundtrip_empty_and_unicode() {
        let cipher = SecretCipher::new("test-secret");

        for plaintext in ["", "a", "hühnersuppe 🍲", "x".repeat(4096).as_str()] {
            let encrypted = cipher.encrypt(plaintext).unwrap();
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn test_encryption_produces_different_ciphertexts() {
        let cipher = SecretCipher::new("test-secret");

        let encrypted1 = cipher.encrypt("same plaintext").unwrap();
        let encrypted2 = cipher.encrypt("same plaintext").unwrap();

        // Random nonce per call
        assert_ne!(encrypted1, encrypted2);
        assert_eq!(cipher.decrypt(&encrypted1).unwrap(), "same plaintext");
        assert_eq!(cipher.decrypt(&encrypted2).unwrap(), "same plaintext");
    }

    #[test]
    fn test_decrypt_with_wrong_secret_fails() {
        let cipher = SecretCipher::new("secret-one");
        let other = SecretCipher::new("secret-two");

        let encrypted = cipher.encrypt("api-key").unwrap();
        assert!(matches!(other.decrypt(&encrypted), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_decrypt_corrupted_blob_fails() {
        let cipher = SecretCipher::new("test-secret");
        let encrypted = cipher.encrypt("api-key").unwrap();

        // Flip a byte in the ciphertext portion
        let mut raw = general_purpose::STANDARD.decode(&encrypted).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        let corrupted = general_purpose::STANDARD.encode(raw);

        assert!(matches!(cipher.decrypt(&corrupted), Err(CryptoError::Decrypt)));
    }

    #[test]
    fn test_decrypt_truncated_blob_fails() {
        let cipher = SecretCipher::new("test-secret");

        let too_short = general_purpose::STANDARD.encode([0u8; 5]);
        assert!(matches!(cipher.decrypt(&too_short), Err(CryptoError::TooShort)));
    }

    #[test]
    fn test_decrypt_invalid_base64_fails() {
        let cipher = SecretCipher::new("test-secret");
        assert!(matches!(cipher.decrypt("not base64!!!"), Err(CryptoError::Decode(_))));
    }

    #[test]
    fn test_key_derivation_is_deterministic() {
        let encrypted = SecretCipher::new("stable-secret").encrypt("value").unwrap();
        // A cipher built later from the same secret can decrypt older blobs
        assert_eq!(SecretCipher::new("stable-secret").decrypt(&encrypted).unwrap(), "value");
    }
}
