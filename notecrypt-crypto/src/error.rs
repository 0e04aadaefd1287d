//! Error types for the encryption layer.

use thiserror::Error;

/// Result type for crypto operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CryptoError {
    /// No secret can be derived for the account.
    #[error("no encryption key available for this account")]
    MissingKey,

    /// The authentication tag did not match (wrong key or tampered data).
    #[error("HMAC verification failed: data may be corrupted or encrypted with a different key")]
    HmacVerification,

    #[error("unsupported encryption algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("unsupported encryption version: {0}")]
    UnsupportedVersion(String),

    /// Structurally invalid field, or padding/UTF-8 failure after authentication.
    #[error("corrupted ciphertext: {0}")]
    CorruptedCiphertext(String),

    /// Encrypting a note failed and the policy forbids a plaintext fallback.
    #[error("note encryption failed: {0}")]
    EncryptionDegraded(String),

    /// Key derivation failed.
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// Encryption failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Invalid IV length.
    #[error("invalid IV length: expected {expected}, got {actual}")]
    InvalidIvLength { expected: usize, actual: usize },
}

impl CryptoError {
    /// Returns true if the failure points at a secret other than the one
    /// used at encryption time, rather than at damaged data.
    pub fn is_key_mismatch(&self) -> bool {
        matches!(self, Self::HmacVerification | Self::KeyDerivation(_))
    }

    /// Returns true for failures confined to a single field value.
    pub fn is_field_level(&self) -> bool {
        matches!(
            self,
            Self::HmacVerification
                | Self::UnsupportedAlgorithm(_)
                | Self::UnsupportedVersion(_)
                | Self::CorruptedCiphertext(_)
                | Self::InvalidIvLength { .. }
                | Self::KeyDerivation(_)
        )
    }
}
