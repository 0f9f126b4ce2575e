//! Access token encryption.

mod aes;

pub use self::aes::{AesGcmCipher, PlaintextCipher};
