//! Shared test helpers for sync tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use notecrypt_crypto::{EffectiveSecret, KeySource};
use notecrypt_sync::{
    EncryptionSession, NoteApi, ProfileApi, SyncConfig, SyncError, SyncResult,
};
use notecrypt_types::{
    AccountId, AccountIdentity, HistoryEntry, InitializeProfileRequest, NoteId, NotePage,
    NoteQuery, UserEncryptionProfile, WireNote,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

pub const SALT: &str = "9c1f0e7a5b3d2c4e6f8a0b1c2d3e4f5a";
pub const SECRET: &str = "test-stable-key";

/// Config with a cheap KDF.
pub fn fast_config() -> SyncConfig {
    SyncConfig {
        kdf_iterations: 1_000,
        ..SyncConfig::default()
    }
}

pub fn identity() -> AccountIdentity {
    AccountIdentity::new(AccountId::new()).with_email("user@example.com")
}

pub fn session_with(secret: &str) -> EncryptionSession {
    EncryptionSession::new(
        AccountId::new(),
        SALT,
        EffectiveSecret::new(secret, KeySource::StableKey),
    )
}

pub fn session() -> EncryptionSession {
    session_with(SECRET)
}

#[derive(Default)]
struct State {
    profile: UserEncryptionProfile,
    notes: Vec<WireNote>,
    history: HashMap<NoteId, Vec<HistoryEntry>>,
    updates: Vec<WireNote>,
    initialize_calls: usize,
    provision_calls: usize,
    fail_provision: bool,
    race_salt: Option<String>,
    update_delay: Option<Duration>,
}

/// In-memory stand-in for the notes server.
#[derive(Default)]
pub struct MemoryServer {
    state: Mutex<State>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(profile: UserEncryptionProfile) -> Self {
        let server = Self::new();
        server.state.lock().unwrap().profile = profile;
        server
    }

    pub fn profile(&self) -> UserEncryptionProfile {
        self.state.lock().unwrap().profile.clone()
    }

    pub fn set_profile(&self, profile: UserEncryptionProfile) {
        self.state.lock().unwrap().profile = profile;
    }

    pub fn notes(&self) -> Vec<WireNote> {
        self.state.lock().unwrap().notes.clone()
    }

    pub fn insert_note(&self, note: WireNote) {
        self.state.lock().unwrap().notes.push(note);
    }

    pub fn updates(&self) -> Vec<WireNote> {
        self.state.lock().unwrap().updates.clone()
    }

    pub fn initialize_calls(&self) -> usize {
        self.state.lock().unwrap().initialize_calls
    }

    pub fn provision_calls(&self) -> usize {
        self.state.lock().unwrap().provision_calls
    }

    pub fn fail_provision(&self, fail: bool) {
        self.state.lock().unwrap().fail_provision = fail;
    }

    /// Makes the next initialization lose to a concurrent one using `salt`.
    pub fn race_initialize(&self, salt: &str) {
        self.state.lock().unwrap().race_salt = Some(salt.to_string());
    }

    pub fn delay_updates(&self, delay: Duration) {
        self.state.lock().unwrap().update_delay = Some(delay);
    }
}

#[async_trait]
impl ProfileApi for MemoryServer {
    async fn get_profile(&self) -> SyncResult<UserEncryptionProfile> {
        Ok(self.profile())
    }

    async fn initialize_profile(
        &self,
        request: &InitializeProfileRequest,
    ) -> SyncResult<UserEncryptionProfile> {
        let mut state = self.state.lock().unwrap();
        state.initialize_calls += 1;
        if let Some(winner) = state.race_salt.take() {
            state.profile.salt = Some(winner);
            return Err(SyncError::AlreadyInitialized);
        }
        if state.profile.is_initialized() {
            return Err(SyncError::AlreadyInitialized);
        }
        state.profile.salt = Some(request.salt.clone());
        state.profile.algorithm = request.algorithm.clone();
        state.profile.version = request.version.clone();
        state.profile.enabled = request.enabled;
        state.profile.created = Some(request.created);
        Ok(state.profile.clone())
    }

    async fn provision_stable_key(
        &self,
        proposed: Option<&str>,
    ) -> SyncResult<UserEncryptionProfile> {
        let mut state = self.state.lock().unwrap();
        state.provision_calls += 1;
        if state.fail_provision {
            return Err(SyncError::Network("connection reset".into()));
        }
        if !state.profile.has_stable_key() {
            state.profile.stable_key =
                Some(proposed.unwrap_or("server-generated-key").to_string());
        }
        Ok(state.profile.clone())
    }
}

#[async_trait]
impl NoteApi for MemoryServer {
    async fn create_note(&self, note: &WireNote) -> SyncResult<WireNote> {
        let mut stored = note.clone();
        stored.id = Some(note.id.unwrap_or_default());
        stored.version = 1;
        stored.last_modified = Some(Utc::now());
        self.state.lock().unwrap().notes.push(stored.clone());
        Ok(stored)
    }

    async fn update_note(&self, id: NoteId, note: &WireNote) -> SyncResult<WireNote> {
        let delay = self.state.lock().unwrap().update_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        let idx = state
            .notes
            .iter()
            .position(|n| n.id == Some(id))
            .ok_or_else(|| SyncError::NotFound(format!("note {id}")))?;

        let previous = state.notes[idx].clone();
        state.history.entry(id).or_default().insert(
            0,
            HistoryEntry {
                content: previous.content.clone(),
                timestamp: previous.last_modified.unwrap_or_else(Utc::now),
                version: previous.version,
            },
        );

        let mut stored = note.clone();
        stored.id = Some(id);
        stored.version = previous.version + 1;
        stored.last_modified = Some(Utc::now());
        state.notes[idx] = stored.clone();
        state.updates.push(stored.clone());
        Ok(stored)
    }

    async fn get_note(&self, id: NoteId) -> SyncResult<WireNote> {
        self.state
            .lock()
            .unwrap()
            .notes
            .iter()
            .find(|n| n.id == Some(id))
            .cloned()
            .ok_or_else(|| SyncError::NotFound(format!("note {id}")))
    }

    async fn list_notes(&self, query: &NoteQuery) -> SyncResult<NotePage> {
        let notes = self.notes();
        let limit = query.limit.max(1) as usize;
        let start = (query.page.max(1) as usize - 1) * limit;
        let total = notes.len();
        Ok(NotePage {
            notes: notes.into_iter().skip(start).take(limit).collect(),
            total_pages: total.div_ceil(limit) as u32,
            current_page: query.page,
            total: total as u64,
        })
    }

    async fn delete_note(&self, id: NoteId) -> SyncResult<()> {
        let mut state = self.state.lock().unwrap();
        let before = state.notes.len();
        state.notes.retain(|n| n.id != Some(id));
        if state.notes.len() == before {
            return Err(SyncError::NotFound(format!("note {id}")));
        }
        Ok(())
    }

    async fn note_history(&self, id: NoteId) -> SyncResult<Vec<HistoryEntry>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .history
            .get(&id)
            .cloned()
            .unwrap_or_default())
    }

    async fn restore_version(&self, id: NoteId, version: u32) -> SyncResult<WireNote> {
        let mut state = self.state.lock().unwrap();
        let content = state
            .history
            .get(&id)
            .and_then(|entries| entries.iter().find(|e| e.version == version))
            .map(|e| e.content.clone())
            .ok_or_else(|| SyncError::NotFound(format!("version {version} of note {id}")))?;
        let idx = state
            .notes
            .iter()
            .position(|n| n.id == Some(id))
            .ok_or_else(|| SyncError::NotFound(format!("note {id}")))?;

        let previous = state.notes[idx].clone();
        state.history.entry(id).or_default().insert(
            0,
            HistoryEntry {
                content: previous.content.clone(),
                timestamp: previous.last_modified.unwrap_or_else(Utc::now),
                version: previous.version,
            },
        );

        let mut stored = previous;
        stored.content = content;
        stored.encrypted_marker = stored.has_encrypted_fields();
        stored.version += 1;
        stored.last_modified = Some(Utc::now());
        state.notes[idx] = stored.clone();
        Ok(stored)
    }
}
