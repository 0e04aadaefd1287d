//! Error types for the sync layer.

use notecrypt_crypto::CryptoError;
use notecrypt_types::NoteId;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur in sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-success status.
    #[error("server returned {status}: {message}")]
    Http { status: u16, message: String },

    /// The server answered with something the protocol does not allow.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key resolution or encryption failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// The profile salt was set by someone else first.
    #[error("encryption already initialized")]
    AlreadyInitialized,

    /// Freshly encrypted data did not decrypt back to the original.
    #[error("encryption self-check failed on {field}; refusing to save")]
    VerificationFailed { field: String },

    /// The session's secret is not the account's stored key yet, so
    /// ciphertext written with it could be orphaned.
    #[error("session key is not confirmed by the server; refusing to encrypt")]
    KeyUnconfirmed,

    /// Another write for the same note is still in flight.
    #[error("operation already pending for note {0}")]
    OperationPending(NoteId),

    /// The note has never been saved and has no id.
    #[error("note has no id")]
    MissingNoteId,

    #[error("not found: {0}")]
    NotFound(String),

    /// A background task failed to complete.
    #[error("task failed: {0}")]
    Task(String),

    /// Channel closed.
    #[error("channel closed")]
    ChannelClosed,
}

impl SyncError {
    /// Returns true if the note could not be decrypted or encrypted because
    /// the session holds the wrong key.
    pub fn is_key_fault(&self) -> bool {
        match self {
            Self::Crypto(err) => err.is_key_mismatch() || *err == CryptoError::MissingKey,
            Self::VerificationFailed { .. } | Self::KeyUnconfirmed => true,
            _ => false,
        }
    }
}
