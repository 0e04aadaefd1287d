//! Storage service for notecrypt.
//!
//! Holds each account's encryption profile (salt and stable key) and the
//! notes in their wire form. The service never sees plaintext of encrypted
//! fields and never decrypts: it persists what clients send, enforces the
//! create-once rules on profile material, and runs repair migrations.

pub mod config;
pub mod db;
pub mod error;
pub mod http;
pub mod migrations;
pub mod note_store;
pub mod profile_store;

pub use config::{Args, Command, Migration, ServeArgs};
pub use db::Database;
pub use error::{ServerError, ServerResult};
pub use http::{build_router, Account, AppState, ACCOUNT_HEADER};
pub use migrations::{
    backfill_stable_keys, mark_legacy_notes, recompute_encrypted_markers, MigrationReport,
};
pub use note_store::{NoteStore, HISTORY_LIMIT, MAX_PAGE_SIZE};
pub use profile_store::ProfileStore;
