mod common;

use common::{encrypted_wire, plain_wire};
use notecrypt_server::{
    backfill_stable_keys, mark_legacy_notes, recompute_encrypted_markers, MigrationReport,
};
use notecrypt_types::{AccountId, InitializeProfileRequest};
use serde_json::Value;

fn marker_of(store: &notecrypt_server::NoteStore, id: &str) -> Option<Value> {
    store
        .raw_documents()
        .unwrap()
        .into_iter()
        .find(|(raw_id, _)| raw_id == id)
        .and_then(|(_, doc)| doc.get("_encrypted").cloned())
}

// ── recompute_encrypted_markers ──

#[test]
fn marker_false_on_encrypted_note_is_set_true() {
    let (_, notes) = common::stores();
    let mut wire = encrypted_wire("t", "c");
    wire.encrypted_marker = false;
    let id = notes.create(AccountId::new(), wire).unwrap().id.unwrap().to_string();

    let report = recompute_encrypted_markers(&notes).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.corrected, 1);
    assert_eq!(marker_of(&notes, &id), Some(Value::Bool(true)));
}

#[test]
fn marker_true_on_plain_note_is_set_false() {
    let (_, notes) = common::stores();
    let mut wire = plain_wire("t", "c");
    wire.encrypted_marker = true;
    let id = notes.create(AccountId::new(), wire).unwrap().id.unwrap().to_string();

    let report = recompute_encrypted_markers(&notes).unwrap();
    assert_eq!(report.corrected, 1);
    assert_eq!(marker_of(&notes, &id), Some(Value::Bool(false)));
}

#[test]
fn recompute_leaves_consistent_notes_and_is_idempotent() {
    let (_, notes) = common::stores();
    let account = AccountId::new();
    notes.create(account, encrypted_wire("a", "b")).unwrap();
    notes.create(account, plain_wire("c", "d")).unwrap();
    let mut stale = plain_wire("e", "f");
    stale.encrypted_marker = true;
    notes.create(account, stale).unwrap();

    let first = recompute_encrypted_markers(&notes).unwrap();
    assert_eq!(
        first,
        MigrationReport {
            scanned: 3,
            corrected: 1,
            skipped: 0
        }
    );
    assert_eq!(recompute_encrypted_markers(&notes).unwrap().corrected, 0);
}

#[test]
fn recompute_preserves_note_version() {
    let (_, notes) = common::stores();
    let account = AccountId::new();
    let mut wire = encrypted_wire("t", "c");
    wire.encrypted_marker = false;
    let id = notes.create(account, wire).unwrap().id.unwrap();

    recompute_encrypted_markers(&notes).unwrap();
    let note = notes.get(account, id).unwrap();
    assert_eq!(note.version, 1);
    assert!(!note.marker_is_stale());
}

// ── mark_legacy_notes ──

#[test]
fn legacy_documents_without_marker_get_one() {
    let (_, notes) = common::stores();
    let account = AccountId::new();
    let id = notes.create(account, plain_wire("t", "c")).unwrap().id.unwrap().to_string();

    let (_, mut doc) = notes.raw_documents().unwrap().pop().unwrap();
    doc.as_object_mut().unwrap().remove("_encrypted");
    notes.replace_raw_document(&id, &doc).unwrap();
    assert_eq!(marker_of(&notes, &id), None);

    let report = mark_legacy_notes(&notes).unwrap();
    assert_eq!(report.corrected, 1);
    assert_eq!(marker_of(&notes, &id), Some(Value::Bool(false)));
    assert_eq!(mark_legacy_notes(&notes).unwrap().corrected, 0);
}

#[test]
fn mark_legacy_leaves_existing_markers_alone() {
    let (_, notes) = common::stores();
    let mut stale = plain_wire("t", "c");
    stale.encrypted_marker = true;
    let id = notes.create(AccountId::new(), stale).unwrap().id.unwrap().to_string();

    assert_eq!(mark_legacy_notes(&notes).unwrap().corrected, 0);
    assert_eq!(marker_of(&notes, &id), Some(Value::Bool(true)));
}

// ── backfill_stable_keys ──

#[test]
fn backfill_provisions_keys_for_salted_accounts() {
    let (profiles, notes) = common::stores();
    let account = AccountId::new();
    profiles
        .initialize(account, &InitializeProfileRequest::new(common::SALT))
        .unwrap();
    notes.create(account, plain_wire("t", "c")).unwrap();

    let report = backfill_stable_keys(&profiles, &notes).unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.corrected, 1);

    let profile = profiles.get(account).unwrap();
    assert!(profile.has_stable_key());
    assert_eq!(profile.salt(), Some(common::SALT));
    assert_eq!(backfill_stable_keys(&profiles, &notes).unwrap().scanned, 0);
}

#[test]
fn backfill_skips_accounts_with_encrypted_notes() {
    let (profiles, notes) = common::stores();
    let account = AccountId::new();
    profiles
        .initialize(account, &InitializeProfileRequest::new(common::SALT))
        .unwrap();
    notes.create(account, encrypted_wire("t", "c")).unwrap();

    let report = backfill_stable_keys(&profiles, &notes).unwrap();
    assert_eq!(report.skipped, 1);
    assert_eq!(report.corrected, 0);
    assert!(!profiles.get(account).unwrap().has_stable_key());
}
