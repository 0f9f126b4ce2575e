//! Token cipher port.

/// Decrypts access tokens stored on social accounts.
pub trait TokenCipher: Send + Sync {
    /// Decrypt a stored token. Values that are not in the encrypted wire
    /// format are returned unchanged.
    fn decrypt(&self, stored: &str) -> Result<String, CryptoError>;
}

/// Token decryption errors.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed ciphertext: {0}")]
    Malformed(String),

    #[error("Decryption failed")]
    Decrypt,
}
