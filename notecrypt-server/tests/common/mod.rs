//! Shared test helpers for server tests.

#![allow(dead_code)]

use notecrypt_crypto::{EncryptFailurePolicy, FieldCipher, KdfParams, NoteCodec};
use notecrypt_server::{build_router, AppState, Database, NoteStore, ProfileStore};
use notecrypt_types::{Field, PlainNote, WireNote};

pub const SALT: &str = "5e2a9c0b7d1f3e4a6b8c0d2e4f6a8b0c";
pub const SECRET: &str = "server-test-key";

/// Codec with a cheap KDF.
pub fn codec() -> NoteCodec {
    NoteCodec::new(
        FieldCipher::new(KdfParams::new(1_000)),
        EncryptFailurePolicy::Fail,
    )
}

pub fn stores() -> (ProfileStore, NoteStore) {
    let db = Database::open_in_memory().unwrap();
    (ProfileStore::new(db.clone()), NoteStore::new(db))
}

pub fn plain_wire(title: &str, content: &str) -> WireNote {
    WireNote {
        id: None,
        title: Field::plain(title),
        content: Field::plain(content),
        tags: vec![Field::plain("misc")],
        encrypted_marker: false,
        is_favorite: false,
        is_archived: false,
        version: 1,
        last_modified: None,
        metadata: Default::default(),
        extra: Default::default(),
    }
}

pub fn encrypted_wire(title: &str, content: &str) -> WireNote {
    codec()
        .encrypt_note(&PlainNote::new(title, content), SECRET, SALT)
        .unwrap()
}

/// Spin up the HTTP server on an OS-assigned port, returning the base URL.
pub async fn spawn_test_server(allow_reset: bool) -> String {
    let state = AppState::new(Database::open_in_memory().unwrap(), allow_reset);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://127.0.0.1:{port}")
}
