//! Note documents in their wire and in-memory forms.
//!
//! [`WireNote`] is what the store holds and the transport carries: its text
//! fields may be encrypted. [`PlainNote`] is what the editor works with and
//! only ever exists on the client side of the trust boundary.

use crate::field::Field;
use crate::ids::NoteId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

fn default_version() -> u32 {
    1
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Accepts any JSON for `tags`, keeping only array input.
fn tags_or_empty<'de, D>(deserializer: D) -> Result<Vec<Field>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value::<Field>(item).map_err(serde::de::Error::custom))
            .collect(),
        _ => Ok(Vec::new()),
    }
}

/// Horizontal text alignment of the editor surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
    Justify,
}

/// Display metadata. Never encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NoteMetadata {
    pub font_size: u32,
    pub font_family: String,
    pub line_height: f64,
    pub text_align: TextAlign,
}

impl Default for NoteMetadata {
    fn default() -> Self {
        Self {
            font_size: 16,
            font_family: "Arial, sans-serif".to_string(),
            line_height: 1.5,
            text_align: TextAlign::Left,
        }
    }
}

/// A note as persisted and transported.
///
/// `encrypted_marker` (`_encrypted` on the wire) is a cache of the field
/// shapes and may be stale; [`WireNote::has_encrypted_fields`] is the
/// authoritative answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNote {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    #[serde(default)]
    pub title: Field,
    #[serde(default)]
    pub content: Field,
    #[serde(default, deserialize_with = "tags_or_empty")]
    pub tags: Vec<Field>,
    #[serde(rename = "_encrypted", default)]
    pub encrypted_marker: bool,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: NoteMetadata,
    /// Top-level keys this crate does not model, kept for the round trip.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WireNote {
    /// Returns true if any text field has the encrypted shape.
    pub fn has_encrypted_fields(&self) -> bool {
        self.title.is_encrypted()
            || self.content.is_encrypted()
            || self.tags.iter().any(Field::is_encrypted)
    }

    /// Returns true if both title and content are encrypted.
    pub fn is_fully_encrypted(&self) -> bool {
        self.title.is_encrypted() && self.content.is_encrypted()
    }

    /// The marker value the field shapes call for.
    pub fn shape_marker(&self) -> bool {
        self.has_encrypted_fields()
    }

    /// Returns true if the stored marker disagrees with the field shapes.
    pub fn marker_is_stale(&self) -> bool {
        self.encrypted_marker != self.shape_marker()
    }
}

/// A note in plaintext form, as handed to and returned from the editor.
///
/// `decryption_failed` and `key_mismatch` are set when one or more fields
/// could not be decrypted; the affected fields then hold sentinel values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlainNote {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<NoteId>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: NoteMetadata,
    /// Unmodelled keys carried over from the wire form.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(rename = "_decryptionFailed", default, skip_serializing_if = "is_false")]
    pub decryption_failed: bool,
    #[serde(rename = "_keyMismatch", default, skip_serializing_if = "is_false")]
    pub key_mismatch: bool,
}

impl PlainNote {
    /// Creates a new, unsaved note.
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: None,
            title: title.into(),
            content: content.into(),
            tags: Vec::new(),
            is_favorite: false,
            is_archived: false,
            version: default_version(),
            last_modified: None,
            metadata: NoteMetadata::default(),
            extra: Map::new(),
            decryption_failed: false,
            key_mismatch: false,
        }
    }

    /// Sets the tags.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the note ID.
    pub fn with_id(mut self, id: NoteId) -> Self {
        self.id = Some(id);
        self
    }
}

/// A previous version of a note's content, kept by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub content: Field,
    pub timestamp: DateTime<Utc>,
    pub version: u32,
}
