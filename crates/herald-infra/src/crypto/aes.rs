//! AES-256-GCM token cipher.
//!
//! Stored tokens use the `ivHex:authTagHex:cipherHex` wire format. Anything
//! that does not split into exactly three parts is a legacy plaintext token
//! and is returned unchanged.

use aes_gcm::aead::consts::{U12, U16};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::{AesGcm, Key, Nonce};
use rand::RngCore;
use sha2::{Digest, Sha256};

use herald_core::ports::{CryptoError, TokenCipher};

type Aes256Gcm12 = AesGcm<Aes256, U12>;
type Aes256Gcm16 = AesGcm<Aes256, U16>;

const TAG_LEN: usize = 16;

/// Token cipher backed by a 256-bit key.
#[derive(Clone)]
pub struct AesGcmCipher {
    key: [u8; 32],
}

impl std::fmt::Debug for AesGcmCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesGcmCipher").finish_non_exhaustive()
    }
}

impl AesGcmCipher {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    /// Build from configuration: 64 hex characters are used as the raw key,
    /// anything else is treated as a passphrase and hashed with SHA-256.
    pub fn from_secret(secret: &str) -> Result<Self, CryptoError> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(CryptoError::InvalidKey("key is empty".into()));
        }

        if secret.len() == 64 {
            if let Ok(bytes) = hex::decode(secret) {
                let mut key = [0u8; 32];
                key.copy_from_slice(&bytes);
                return Ok(Self::new(key));
            }
        }

        Ok(Self::new(Sha256::digest(secret.as_bytes()).into()))
    }

    /// Load from `TOKEN_ENCRYPTION_KEY`.
    pub fn from_env() -> Result<Self, CryptoError> {
        let secret = std::env::var("TOKEN_ENCRYPTION_KEY")
            .map_err(|_| CryptoError::InvalidKey("TOKEN_ENCRYPTION_KEY is not set".into()))?;
        Self::from_secret(&secret)
    }

    /// Encrypt into the `ivHex:authTagHex:cipherHex` format with a fresh 12-byte IV.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut iv = [0u8; 12];
        rand::rng().fill_bytes(&mut iv);

        let cipher = Aes256Gcm12::new(Key::<Aes256Gcm12>::from_slice(&self.key));
        let mut sealed = cipher
            .encrypt(Nonce::<U12>::from_slice(&iv), plaintext.as_bytes())
            .map_err(|_| CryptoError::Decrypt)?;

        let tag = sealed.split_off(sealed.len() - TAG_LEN);
        Ok(format!(
            "{}:{}:{}",
            hex::encode(iv),
            hex::encode(tag),
            hex::encode(sealed)
        ))
    }

    fn open(&self, iv: &[u8], sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        match iv.len() {
            12 => Aes256Gcm12::new(Key::<Aes256Gcm12>::from_slice(&self.key))
                .decrypt(Nonce::<U12>::from_slice(iv), sealed),
            16 => Aes256Gcm16::new(Key::<Aes256Gcm16>::from_slice(&self.key))
                .decrypt(Nonce::<U16>::from_slice(iv), sealed),
            n => return Err(CryptoError::Malformed(format!("unsupported IV length {n}"))),
        }
        .map_err(|_| CryptoError::Decrypt)
    }
}

impl TokenCipher for AesGcmCipher {
    fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        let parts: Vec<&str> = stored.split(':').collect();
        let [iv, tag, body] = parts.as_slice() else {
            return Ok(stored.to_string());
        };

        let decode = |label: &str, value: &str| {
            hex::decode(value).map_err(|e| CryptoError::Malformed(format!("{label}: {e}")))
        };
        let iv = decode("iv", *iv)?;
        let tag = decode("auth tag", *tag)?;
        let mut sealed = decode("ciphertext", *body)?;

        if tag.len() != TAG_LEN {
            return Err(CryptoError::Malformed(format!(
                "auth tag must be {TAG_LEN} bytes, got {}",
                tag.len()
            )));
        }
        sealed.extend_from_slice(&tag);

        let plaintext = self.open(&iv, &sealed)?;
        String::from_utf8(plaintext).map_err(|e| CryptoError::Malformed(e.to_string()))
    }
}

/// Cipher used when no key is configured: every token is plaintext.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaintextCipher;

impl TokenCipher for PlaintextCipher {
    fn decrypt(&self, stored: &str) -> Result<String, CryptoError> {
        Ok(stored.to_string())
    }
}
