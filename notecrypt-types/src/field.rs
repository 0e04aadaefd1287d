//! Note field shapes.
//!
//! A persisted note field is either a plaintext string (legacy notes, or
//! accounts with encryption disabled) or an [`EncryptedField`] record. The
//! store is schemaless, so anything else is possible too and must be carried
//! without failing deserialization of the whole note.

use serde::{Deserialize, Serialize};

/// Cipher suite identifier written into every encrypted field.
pub const CIPHER_ALGORITHM: &str = "AES-256-CBC";

/// Wire format version written into every encrypted field.
pub const FORMAT_VERSION: &str = "1.0";

/// One encrypted scalar string.
///
/// `hmac` authenticates `ciphertext ‖ iv` (their hex text) under the key
/// derived from the session secret and `salt`. Only `ciphertext` is required
/// to recognise the shape; missing companions surface as decryption errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// Hex-encoded AES-256-CBC ciphertext.
    pub ciphertext: String,
    /// Hex-encoded 128-bit IV.
    #[serde(default)]
    pub iv: String,
    /// Hex-encoded HMAC-SHA256 tag.
    #[serde(default)]
    pub hmac: String,
    /// Key-derivation salt (the account salt at encryption time).
    #[serde(default)]
    pub salt: String,
    #[serde(default)]
    pub algorithm: String,
    #[serde(default)]
    pub version: String,
}

/// A note field as it appears on the wire.
///
/// Variant order matters for deserialization: a JSON string is `Plain`, an
/// object carrying `ciphertext` is `Encrypted`, everything else (null,
/// numbers, foreign objects) is kept as `Unrecognized`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Field {
    Plain(String),
    Encrypted(EncryptedField),
    Unrecognized(serde_json::Value),
}

impl Field {
    /// Creates a plaintext field.
    pub fn plain(value: impl Into<String>) -> Self {
        Self::Plain(value.into())
    }

    /// Returns true if the field has the encrypted shape.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }

    /// Returns the plaintext value, if this is a plain field.
    pub fn as_plain(&self) -> Option<&str> {
        match self {
            Self::Plain(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the encrypted record, if this is an encrypted field.
    pub fn as_encrypted(&self) -> Option<&EncryptedField> {
        match self {
            Self::Encrypted(e) => Some(e),
            _ => None,
        }
    }
}

impl Default for Field {
    /// An absent field.
    fn default() -> Self {
        Self::Unrecognized(serde_json::Value::Null)
    }
}

impl From<String> for Field {
    fn from(value: String) -> Self {
        Self::Plain(value)
    }
}

impl From<&str> for Field {
    fn from(value: &str) -> Self {
        Self::Plain(value.to_string())
    }
}

impl From<EncryptedField> for Field {
    fn from(value: EncryptedField) -> Self {
        Self::Encrypted(value)
    }
}
