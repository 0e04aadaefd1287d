//! Server API abstraction.
//!
//! The sync client talks to the server through these traits so the
//! encryption protocol can be exercised against any backend. Implementations
//! are bound to one authenticated account.

use crate::error::SyncResult;
use async_trait::async_trait;
use notecrypt_types::{
    HistoryEntry, InitializeProfileRequest, NoteId, NotePage, NoteQuery, UserEncryptionProfile,
    WireNote,
};

/// Access to the account's encryption profile.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetches the profile. An account without one gets an empty profile.
    async fn get_profile(&self) -> SyncResult<UserEncryptionProfile>;

    /// Sets the salt and suite. Fails with
    /// [`SyncError::AlreadyInitialized`](crate::SyncError::AlreadyInitialized)
    /// if a salt exists.
    async fn initialize_profile(
        &self,
        request: &InitializeProfileRequest,
    ) -> SyncResult<UserEncryptionProfile>;

    /// Stores `proposed` (or a server-generated key) as the stable key unless
    /// one already exists, and returns the profile holding the winner.
    async fn provision_stable_key(&self, proposed: Option<&str>)
    -> SyncResult<UserEncryptionProfile>;
}

/// Access to the account's notes in wire form.
#[async_trait]
pub trait NoteApi: Send + Sync {
    async fn create_note(&self, note: &WireNote) -> SyncResult<WireNote>;

    async fn update_note(&self, id: NoteId, note: &WireNote) -> SyncResult<WireNote>;

    async fn get_note(&self, id: NoteId) -> SyncResult<WireNote>;

    async fn list_notes(&self, query: &NoteQuery) -> SyncResult<NotePage>;

    async fn delete_note(&self, id: NoteId) -> SyncResult<()>;

    /// Previous contents of a note, newest first.
    async fn note_history(&self, id: NoteId) -> SyncResult<Vec<HistoryEntry>>;

    /// Makes history entry `version` the note's current content and returns
    /// the updated note.
    async fn restore_version(&self, id: NoteId, version: u32) -> SyncResult<WireNote>;
}
