//! Core type definitions for notecrypt.
//!
//! This crate defines the shapes that cross the trust boundary between the
//! editor, the client-side encryption layer and the storage server:
//! - Account and note identifiers (UUID v7)
//! - Note fields, which are either plaintext or an encrypted field record
//! - The wire and in-memory forms of a note
//! - The per-account encryption profile and the HTTP request bodies around it
//!
//! Nothing here performs cryptography; see `notecrypt-crypto`.

mod api;
mod field;
mod ids;
mod note;
mod profile;

pub use api::{
    ErrorBody, InitializeProfileRequest, NoteFilter, NotePage, NoteQuery, ProvisionKeyRequest,
    ALREADY_INITIALIZED,
};
pub use field::{EncryptedField, Field, CIPHER_ALGORITHM, FORMAT_VERSION};
pub use ids::{AccountId, NoteId};
pub use note::{HistoryEntry, NoteMetadata, PlainNote, TextAlign, WireNote};
pub use profile::{AccountIdentity, EncryptionStatus, UserEncryptionProfile};

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in type operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid UUID: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
