//! Client configuration.

use notecrypt_crypto::{
    EncryptFailurePolicy, FieldCipher, KdfParams, NoteCodec, DEFAULT_KDF_ITERATIONS,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Encryption and scheduling settings for the sync client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// What to do when a note cannot be encrypted.
    pub on_encrypt_failure: EncryptFailurePolicy,
    /// PBKDF2 iterations. Must match every other client of the deployment.
    pub kdf_iterations: u32,
    /// Maximum number of notes decrypted at once when listing.
    pub decrypt_concurrency: usize,
    /// Quiet period before an edited note is saved.
    pub autosave_debounce_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            on_encrypt_failure: EncryptFailurePolicy::Fail,
            kdf_iterations: DEFAULT_KDF_ITERATIONS,
            decrypt_concurrency: 8,
            autosave_debounce_ms: 1500,
        }
    }
}

impl SyncConfig {
    /// Builds the note codec these settings describe.
    pub fn codec(&self) -> NoteCodec {
        NoteCodec::new(
            FieldCipher::new(KdfParams::new(self.kdf_iterations)),
            self.on_encrypt_failure,
        )
    }

    pub fn autosave_debounce(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

/// Where and how to reach the notes API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server origin, e.g. `https://notes.example.com`. `/api` is appended.
    pub base_url: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timeout_secs: 30,
        }
    }
}
