use notecrypt_types::{AccountId, NoteId};
use std::collections::HashSet;
use std::str::FromStr;

// ── NoteId ────────────────────────────────────────────────────────

#[test]
fn note_id_new_is_unique() {
    let a = NoteId::new();
    let b = NoteId::new();
    assert_ne!(a, b);
}

#[test]
fn note_id_from_uuid_roundtrip() {
    let uuid = uuid::Uuid::now_v7();
    let id = NoteId::from_uuid(uuid);
    assert_eq!(id.as_uuid(), uuid);
}

#[test]
fn note_id_display_and_parse() {
    let id = NoteId::new();
    let parsed = NoteId::parse(&id.to_string()).unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn note_id_from_str_invalid() {
    assert!(NoteId::from_str("garbage").is_err());
}

#[test]
fn note_ids_are_time_ordered() {
    let a = NoteId::new();
    std::thread::sleep(std::time::Duration::from_millis(2));
    let b = NoteId::new();
    assert!(a < b);
}

#[test]
fn note_id_short_is_six_chars_of_simple_form() {
    let id = NoteId::new();
    let short = id.short();
    assert_eq!(short.len(), 6);
    assert!(id.as_uuid().simple().to_string().ends_with(&short));
}

#[test]
fn note_id_serializes_as_plain_string() {
    let id = NoteId::new();
    let json = serde_json::to_string(&id).unwrap();
    assert_eq!(json, format!("\"{id}\""));
    let back: NoteId = serde_json::from_str(&json).unwrap();
    assert_eq!(back, id);
}

#[test]
fn note_id_hash_set() {
    let ids: HashSet<NoteId> = (0..100).map(|_| NoteId::new()).collect();
    assert_eq!(ids.len(), 100);
}

// ── AccountId ─────────────────────────────────────────────────────

#[test]
fn account_id_display_and_parse() {
    let id = AccountId::new();
    let parsed: AccountId = id.to_string().parse().unwrap();
    assert_eq!(id, parsed);
}

#[test]
fn account_id_parse_invalid() {
    assert!(AccountId::parse("not-a-uuid").is_err());
}

#[test]
fn account_id_serde_transparent() {
    let id = AccountId::new();
    let value = serde_json::to_value(id).unwrap();
    assert_eq!(value, serde_json::Value::String(id.to_string()));
}
