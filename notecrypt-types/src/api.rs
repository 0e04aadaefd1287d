//! Request and response bodies of the notes/profile HTTP API.

use crate::field::{CIPHER_ALGORITHM, FORMAT_VERSION};
use crate::note::WireNote;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Error message the server uses when a profile salt is already set.
pub const ALREADY_INITIALIZED: &str = "encryption already initialized";

/// Body of `PATCH /users/encryption`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeProfileRequest {
    pub salt: String,
    pub algorithm: String,
    pub version: String,
    pub enabled: bool,
    pub created: DateTime<Utc>,
}

impl InitializeProfileRequest {
    /// Builds a request for the current cipher suite.
    pub fn new(salt: impl Into<String>) -> Self {
        Self {
            salt: salt.into(),
            algorithm: CIPHER_ALGORITHM.to_string(),
            version: FORMAT_VERSION.to_string(),
            enabled: true,
            created: Utc::now(),
        }
    }
}

/// Body of `POST /users/encryption/stable-key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionKeyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption_key: Option<String>,
}

/// Which notes a listing returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteFilter {
    /// Everything not archived.
    #[default]
    All,
    Favorites,
    Archived,
}

/// Query string of `GET /notes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoteQuery {
    pub page: u32,
    pub limit: u32,
    pub filter: NoteFilter,
}

impl Default for NoteQuery {
    fn default() -> Self {
        Self {
            page: 1,
            limit: 20,
            filter: NoteFilter::All,
        }
    }
}

/// One page of notes in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotePage {
    pub notes: Vec<WireNote>,
    pub total_pages: u32,
    pub current_page: u32,
    pub total: u64,
}

/// Error body returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
