//! Encrypt-before-write and decrypt-after-read around the notes API.
//!
//! Every write is checked before it leaves: the freshly encrypted note is
//! decrypted again and compared with the original, and a mismatch aborts the
//! write. Persisting ciphertext that the session cannot read back is worse
//! than failing the save.

use crate::api::NoteApi;
use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::session::{EncryptionSession, SessionKeys};
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use notecrypt_crypto::{plain_to_wire, NoteCodec, NoteSealer};
use notecrypt_types::{NoteId, NoteQuery, PlainNote, WireNote};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, warn};

type PendingSet = Arc<Mutex<HashSet<NoteId>>>;

fn lock(pending: &Mutex<HashSet<NoteId>>) -> MutexGuard<'_, HashSet<NoteId>> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Marks a note as having a write in flight until dropped.
struct PendingGuard {
    pending: PendingSet,
    id: NoteId,
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        lock(&self.pending).remove(&self.id);
    }
}

/// A page of decrypted notes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecryptedPage {
    pub notes: Vec<PlainNote>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total: u64,
    /// Notes on this page with at least one undecryptable field.
    pub failed: usize,
}

/// One previous version of a note's content.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryVersion {
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
    pub decryption_failed: bool,
}

/// Result of [`SyncClient::verify_key_consistency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyCheck {
    /// Stored notes with encrypted fields that were test-decrypted.
    pub sampled: usize,
    /// How many of those failed with a key mismatch.
    pub key_mismatches: usize,
}

impl KeyCheck {
    pub fn is_consistent(&self) -> bool {
        self.key_mismatches == 0
    }
}

/// Runs CPU-bound crypto on the blocking pool.
async fn blocking<T, F>(f: F) -> SyncResult<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| SyncError::Task(e.to_string()))
}

/// Encrypts and self-verifies a note for sending.
fn seal_note(
    sealer: &dyn NoteSealer,
    enabled: bool,
    keys: &SessionKeys,
    note: &PlainNote,
) -> SyncResult<WireNote> {
    if !enabled {
        return Ok(plain_to_wire(note));
    }

    let (secret, salt) = keys.encryption_keys()?;
    let wire = sealer.encrypt_note(note, secret, salt)?;
    if !wire.encrypted_marker {
        // Degraded to plaintext by policy; nothing to verify.
        return Ok(wire);
    }

    if let Some(field) = sealer.round_trip_mismatch(note, &wire, secret) {
        error!(note_id = ?note.id, field, "encryption self-check failed");
        return Err(SyncError::VerificationFailed {
            field: field.to_string(),
        });
    }
    Ok(wire)
}

/// Notes client that encrypts and decrypts at the trust boundary.
pub struct SyncClient {
    api: Arc<dyn NoteApi>,
    codec: NoteCodec,
    sealer: Arc<dyn NoteSealer>,
    decrypt_concurrency: usize,
    pending: PendingSet,
}

impl SyncClient {
    pub fn new(api: Arc<dyn NoteApi>, config: &SyncConfig) -> Self {
        let codec = config.codec();
        Self {
            api,
            codec,
            sealer: Arc::new(codec),
            decrypt_concurrency: config.decrypt_concurrency.max(1),
            pending: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Replaces the note sealer. History and key checks keep using the
    /// configured codec's cipher.
    pub fn with_sealer(mut self, sealer: Arc<dyn NoteSealer>) -> Self {
        self.sealer = sealer;
        self
    }

    pub fn codec(&self) -> &NoteCodec {
        &self.codec
    }

    /// Returns true while a write for `id` is in flight.
    pub fn is_pending(&self, id: NoteId) -> bool {
        lock(&self.pending).contains(&id)
    }

    fn begin(&self, id: NoteId) -> SyncResult<PendingGuard> {
        if !lock(&self.pending).insert(id) {
            return Err(SyncError::OperationPending(id));
        }
        Ok(PendingGuard {
            pending: Arc::clone(&self.pending),
            id,
        })
    }

    /// Seals `note` on the blocking pool.
    ///
    /// Fails with [`SyncError::KeyUnconfirmed`] before encrypting anything
    /// if the session's key has not been confirmed by the server.
    async fn seal(&self, session: &EncryptionSession, note: PlainNote) -> SyncResult<WireNote> {
        session.ensure_writable()?;
        let sealer = Arc::clone(&self.sealer);
        let keys = session.keys();
        let enabled = session.is_enabled();
        blocking(move || seal_note(sealer.as_ref(), enabled, &keys, &note)).await?
    }

    /// Decrypts `wire` on the blocking pool.
    async fn open(&self, session: &EncryptionSession, wire: WireNote) -> SyncResult<PlainNote> {
        let sealer = Arc::clone(&self.sealer);
        let keys = session.keys();
        blocking(move || sealer.decrypt_note(&wire, keys.decrypt_secret())).await
    }

    /// Saves a new note. An id is assigned locally if the note has none.
    pub async fn create_note(
        &self,
        session: &EncryptionSession,
        note: &PlainNote,
    ) -> SyncResult<PlainNote> {
        let mut note = note.clone();
        let id = *note.id.get_or_insert_with(NoteId::new);
        let _guard = self.begin(id)?;

        let wire = self.seal(session, note).await?;
        debug!(note_id = %id, encrypted = wire.encrypted_marker, "creating note");
        let saved = self.api.create_note(&wire).await?;
        self.open(session, saved).await
    }

    /// Saves changes to an existing note.
    pub async fn update_note(
        &self,
        session: &EncryptionSession,
        note: &PlainNote,
    ) -> SyncResult<PlainNote> {
        let id = note.id.ok_or(SyncError::MissingNoteId)?;
        let _guard = self.begin(id)?;

        let wire = self.seal(session, note.clone()).await?;
        debug!(note_id = %id, encrypted = wire.encrypted_marker, "updating note");
        let saved = self.api.update_note(id, &wire).await?;
        self.open(session, saved).await
    }

    pub async fn fetch_note(&self, session: &EncryptionSession, id: NoteId) -> SyncResult<PlainNote> {
        let wire = self.api.get_note(id).await?;
        self.open(session, wire).await
    }

    /// Fetches and decrypts a page of notes.
    ///
    /// Notes are decrypted on the blocking pool, at most
    /// `decrypt_concurrency` at a time, and returned in server order.
    pub async fn list_notes(
        &self,
        session: &EncryptionSession,
        query: &NoteQuery,
    ) -> SyncResult<DecryptedPage> {
        let page = self.api.list_notes(query).await?;
        let keys = session.keys();

        let notes: Vec<PlainNote> = stream::iter(page.notes)
            .map(|wire| {
                let sealer = Arc::clone(&self.sealer);
                let keys = Arc::clone(&keys);
                blocking(move || sealer.decrypt_note(&wire, keys.decrypt_secret()))
            })
            .buffered(self.decrypt_concurrency)
            .try_collect()
            .await?;

        let failed = notes.iter().filter(|n| n.decryption_failed).count();
        if failed > 0 {
            warn!(failed, total = notes.len(), "some notes could not be decrypted");
        }

        Ok(DecryptedPage {
            notes,
            total_pages: page.total_pages,
            current_page: page.current_page,
            total: page.total,
            failed,
        })
    }

    /// Fetches and decrypts a note's previous contents.
    pub async fn fetch_history(
        &self,
        session: &EncryptionSession,
        id: NoteId,
    ) -> SyncResult<Vec<HistoryVersion>> {
        let entries = self.api.note_history(id).await?;
        let cipher = self.codec.cipher();
        let keys = session.keys();

        Ok(entries
            .into_iter()
            .map(|entry| {
                let (content, decryption_failed) = match entry.content.as_encrypted() {
                    Some(field) => match cipher.decrypt(field, keys.decrypt_secret()) {
                        Ok(s) => (s, false),
                        Err(e) => {
                            warn!(note_id = %id, version = entry.version, error = %e, "history decryption failed");
                            (String::new(), true)
                        }
                    },
                    None => (entry.content.as_plain().unwrap_or_default().to_string(), false),
                };
                HistoryVersion {
                    content,
                    timestamp: entry.timestamp,
                    version: entry.version,
                    decryption_failed,
                }
            })
            .collect())
    }

    /// Makes a previous version the note's current content.
    ///
    /// The server reuses the stored field, so nothing is re-encrypted and
    /// the restored content reads back under the key it was written with.
    pub async fn restore_version(
        &self,
        session: &EncryptionSession,
        id: NoteId,
        version: u32,
    ) -> SyncResult<PlainNote> {
        let _guard = self.begin(id)?;
        debug!(note_id = %id, version, "restoring note version");
        let restored = self.api.restore_version(id, version).await?;
        self.open(session, restored).await
    }

    pub async fn delete_note(&self, id: NoteId) -> SyncResult<()> {
        let _guard = self.begin(id)?;
        self.api.delete_note(id).await
    }

    /// Checks that the session key works.
    ///
    /// Encrypts and decrypts a sample value, then test-decrypts the most
    /// recent stored notes. A failed sample is an error; stored notes
    /// written under another key are counted in the returned [`KeyCheck`].
    pub async fn verify_key_consistency(&self, session: &EncryptionSession) -> SyncResult<KeyCheck> {
        let keys = session.keys();
        if session.is_enabled() {
            let (secret, salt) = keys.encryption_keys()?;
            let sample = format!("key check {}", Utc::now().timestamp_millis());
            let cipher = self.codec.cipher();
            let field = cipher.encrypt(&sample, secret, salt)?;
            if cipher.decrypt(&field, secret)? != sample {
                return Err(SyncError::VerificationFailed {
                    field: "key check".into(),
                });
            }
        }

        let query = NoteQuery {
            limit: 5,
            ..NoteQuery::default()
        };
        let page = self.api.list_notes(&query).await?;
        let mut check = KeyCheck {
            sampled: 0,
            key_mismatches: 0,
        };
        for wire in page.notes.iter().filter(|n| n.has_encrypted_fields()) {
            check.sampled += 1;
            if self.sealer.decrypt_note(wire, keys.decrypt_secret()).key_mismatch {
                check.key_mismatches += 1;
            }
        }

        if !check.is_consistent() {
            warn!(
                sampled = check.sampled,
                mismatches = check.key_mismatches,
                "stored notes were encrypted under a different key"
            );
        }
        Ok(check)
    }
}
