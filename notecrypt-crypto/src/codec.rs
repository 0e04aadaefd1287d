//! Whole-note conversion between plaintext and wire form.
//!
//! Decryption is driven by the shape of each field, never by the note's
//! `_encrypted` marker. A field that cannot be decrypted is replaced by a
//! sentinel and flagged on the returned note; it never fails the note.

use crate::cipher::FieldCipher;
use crate::error::{CryptoError, CryptoResult};
use crate::key::DerivedKey;
use notecrypt_types::{EncryptedField, Field, PlainNote, WireNote};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Title used when a note has no usable title at all.
pub const UNTITLED_NOTE: &str = "Untitled Note";

/// Title shown when the encrypted title could not be decrypted.
pub const TITLE_DECRYPTION_FAILED: &str = "Encrypted Title (Decryption Failed)";

/// Title shown when the title was encrypted under a different key.
pub const TITLE_KEY_MISMATCH: &str = "Encrypted Note (Key Mismatch)";

/// What to do when encrypting a note fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptFailurePolicy {
    /// Abort the write.
    #[default]
    Fail,
    /// Send the note unencrypted. Leaks plaintext to the store.
    Degrade,
}

/// Derived keys for one note, keyed by salt.
///
/// Fields of one note normally share a salt, so this saves a full key
/// stretch per field.
struct KeyCache<'a> {
    cipher: &'a FieldCipher,
    secret: &'a str,
    keys: Vec<(String, DerivedKey)>,
}

impl<'a> KeyCache<'a> {
    fn new(cipher: &'a FieldCipher, secret: &'a str) -> Self {
        Self {
            cipher,
            secret,
            keys: Vec::new(),
        }
    }

    fn decrypt(&mut self, field: &EncryptedField) -> CryptoResult<String> {
        FieldCipher::validate(field)?;
        let idx = match self.keys.iter().position(|(salt, _)| *salt == field.salt) {
            Some(idx) => idx,
            None => {
                let key = self.cipher.derive_key(self.secret, &field.salt)?;
                self.keys.push((field.salt.clone(), key));
                self.keys.len() - 1
            }
        };
        FieldCipher::decrypt_with_key(&self.keys[idx].1, field)
    }
}

/// Failure flags accumulated while decrypting one note.
#[derive(Default)]
struct Outcome {
    failed: bool,
    key_mismatch: bool,
}

impl Outcome {
    fn record(&mut self, note: &WireNote, field: &str, err: &CryptoError) {
        warn!(note_id = ?note.id, field, error = %err, "field decryption failed");
        self.failed = true;
        self.key_mismatch |= err.is_key_mismatch();
    }
}

/// Converts notes between [`PlainNote`] and [`WireNote`].
#[derive(Clone, Copy, Debug, Default)]
pub struct NoteCodec {
    cipher: FieldCipher,
    policy: EncryptFailurePolicy,
}

impl NoteCodec {
    pub fn new(cipher: FieldCipher, policy: EncryptFailurePolicy) -> Self {
        Self { cipher, policy }
    }

    pub fn cipher(&self) -> &FieldCipher {
        &self.cipher
    }

    pub fn policy(&self) -> EncryptFailurePolicy {
        self.policy
    }

    /// Encrypts title, content and every non-blank tag.
    ///
    /// Blank tags pass through as plaintext. On failure the configured
    /// policy decides between an error and an unencrypted wire note.
    pub fn encrypt_note(&self, note: &PlainNote, secret: &str, salt: &str) -> CryptoResult<WireNote> {
        match self.try_encrypt(note, secret, salt) {
            Ok(wire) => Ok(wire),
            Err(err) => match self.policy {
                EncryptFailurePolicy::Fail => Err(CryptoError::EncryptionDegraded(err.to_string())),
                EncryptFailurePolicy::Degrade => {
                    warn!(note_id = ?note.id, error = %err, "encryption failed, sending note unencrypted");
                    Ok(plain_to_wire(note))
                }
            },
        }
    }

    fn try_encrypt(&self, note: &PlainNote, secret: &str, salt: &str) -> CryptoResult<WireNote> {
        let key = self.cipher.derive_key(secret, salt)?;
        let seal = |text: &str| FieldCipher::encrypt_with_key(&key, text, salt).map(Field::Encrypted);

        let title = seal(&note.title)?;
        let content = seal(&note.content)?;
        let tags = note
            .tags
            .iter()
            .map(|tag| {
                if tag.trim().is_empty() {
                    Ok(Field::plain(tag.as_str()))
                } else {
                    seal(tag)
                }
            })
            .collect::<CryptoResult<Vec<_>>>()?;

        Ok(WireNote {
            title,
            content,
            tags,
            encrypted_marker: true,
            ..plain_to_wire(note)
        })
    }

    /// Decrypts every encrypted field of a wire note.
    pub fn decrypt_note(&self, wire: &WireNote, secret: &str) -> PlainNote {
        if wire.marker_is_stale() {
            debug!(note_id = ?wire.id, marker = wire.encrypted_marker, "stale encryption marker");
        }

        let mut keys = KeyCache::new(&self.cipher, secret);
        let mut outcome = Outcome::default();

        let title = match &wire.title {
            Field::Plain(s) => s.clone(),
            Field::Encrypted(field) => match keys.decrypt(field) {
                Ok(s) => s,
                Err(err) => {
                    outcome.record(wire, "title", &err);
                    if err.is_key_mismatch() {
                        TITLE_KEY_MISMATCH.to_string()
                    } else {
                        TITLE_DECRYPTION_FAILED.to_string()
                    }
                }
            },
            Field::Unrecognized(_) => UNTITLED_NOTE.to_string(),
        };

        let content = match &wire.content {
            Field::Plain(s) => s.clone(),
            Field::Encrypted(field) => keys.decrypt(field).unwrap_or_else(|err| {
                outcome.record(wire, "content", &err);
                String::new()
            }),
            Field::Unrecognized(_) => String::new(),
        };

        let tags = wire
            .tags
            .iter()
            .filter_map(|tag| match tag {
                Field::Plain(s) => Some(s.clone()),
                Field::Encrypted(field) => match keys.decrypt(field) {
                    Ok(s) => Some(s),
                    Err(err) => {
                        outcome.record(wire, "tag", &err);
                        None
                    }
                },
                Field::Unrecognized(_) => None,
            })
            .filter(|s| !s.is_empty())
            .collect();

        PlainNote {
            id: wire.id,
            title,
            content,
            tags,
            is_favorite: wire.is_favorite,
            is_archived: wire.is_archived,
            version: wire.version,
            last_modified: wire.last_modified,
            metadata: wire.metadata.clone(),
            extra: wire.extra.clone(),
            decryption_failed: outcome.failed,
            key_mismatch: outcome.key_mismatch,
        }
    }

    /// Decrypts `wire` and compares it with the note it was produced from.
    ///
    /// Returns the name of the first field that does not survive the round
    /// trip, or `None` if the wire note faithfully encodes `original`.
    pub fn round_trip_mismatch(
        &self,
        original: &PlainNote,
        wire: &WireNote,
        secret: &str,
    ) -> Option<&'static str> {
        first_difference(original, &self.decrypt_note(wire, secret))
    }
}

fn first_difference(original: &PlainNote, decoded: &PlainNote) -> Option<&'static str> {
    let expected_tags: Vec<&str> = original
        .tags
        .iter()
        .map(String::as_str)
        .filter(|t| !t.is_empty())
        .collect();

    if decoded.decryption_failed {
        Some("decryption")
    } else if decoded.title != original.title {
        Some("title")
    } else if decoded.content != original.content {
        Some("content")
    } else if decoded.tags != expected_tags {
        Some("tags")
    } else {
        None
    }
}

/// Whole-note encryption behind a trait object.
///
/// Sync code holds an `Arc<dyn NoteSealer>` and never touches the cipher
/// directly. [`NoteCodec`] is the production implementation.
pub trait NoteSealer: Send + Sync {
    /// Encrypts every field of `note`. See [`NoteCodec::encrypt_note`].
    fn encrypt_note(&self, note: &PlainNote, secret: &str, salt: &str) -> CryptoResult<WireNote>;

    /// Decrypts by shape. See [`NoteCodec::decrypt_note`].
    fn decrypt_note(&self, wire: &WireNote, secret: &str) -> PlainNote;

    /// Name of the first field of `original` that `wire` does not reproduce.
    fn round_trip_mismatch(
        &self,
        original: &PlainNote,
        wire: &WireNote,
        secret: &str,
    ) -> Option<&'static str> {
        first_difference(original, &self.decrypt_note(wire, secret))
    }
}

impl NoteSealer for NoteCodec {
    fn encrypt_note(&self, note: &PlainNote, secret: &str, salt: &str) -> CryptoResult<WireNote> {
        NoteCodec::encrypt_note(self, note, secret, salt)
    }

    fn decrypt_note(&self, wire: &WireNote, secret: &str) -> PlainNote {
        NoteCodec::decrypt_note(self, wire, secret)
    }
}

/// The unencrypted wire form of a note.
pub fn plain_to_wire(note: &PlainNote) -> WireNote {
    WireNote {
        id: note.id,
        title: Field::plain(note.title.as_str()),
        content: Field::plain(note.content.as_str()),
        tags: note.tags.iter().map(|t| Field::plain(t.as_str())).collect(),
        encrypted_marker: false,
        is_favorite: note.is_favorite,
        is_archived: note.is_archived,
        version: note.version,
        last_modified: note.last_modified,
        metadata: note.metadata.clone(),
        extra: note.extra.clone(),
    }
}
