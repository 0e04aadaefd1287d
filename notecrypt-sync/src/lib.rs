//! Encrypting sync client for notecrypt.
//!
//! Sits between the editor and the notes server:
//! - [`KeyService`] initializes the account's encryption profile and
//!   resolves the session key
//! - [`EncryptionSession`] carries that key through one login
//! - [`SyncClient`] encrypts before every write and decrypts after every read
//! - [`AutoSaver`] debounces edits into background saves
//!
//! Server access goes through the [`ProfileApi`] and [`NoteApi`] traits;
//! [`HttpApiClient`] implements both over HTTP.

pub mod api;
pub mod autosave;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod keys;
pub mod session;

pub use api::{NoteApi, ProfileApi};
pub use autosave::{AutoSaver, SaveEvent};
pub use client::{DecryptedPage, HistoryVersion, KeyCheck, SyncClient};
pub use config::{ApiConfig, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use http::{HttpApiClient, ACCOUNT_HEADER};
pub use keys::KeyService;
pub use session::{EncryptionSession, SessionKeys};
