use notecrypt_types::{
    AccountId, AccountIdentity, EncryptedField, EncryptionStatus, Field, InitializeProfileRequest,
    NoteFilter, NoteId, NoteQuery, PlainNote, ProvisionKeyRequest, TextAlign,
    UserEncryptionProfile, WireNote,
};
use pretty_assertions::assert_eq;
use serde_json::json;

fn enc() -> Field {
    Field::Encrypted(EncryptedField {
        ciphertext: "00".into(),
        iv: String::new(),
        hmac: String::new(),
        salt: String::new(),
        algorithm: String::new(),
        version: String::new(),
    })
}

fn wire(title: Field, content: Field, tags: Vec<Field>, marker: bool) -> WireNote {
    serde_json::from_value(json!({
        "title": title,
        "content": content,
        "tags": tags,
        "_encrypted": marker,
    }))
    .unwrap()
}

// ── WireNote ──────────────────────────────────────────────────────

#[test]
fn wire_note_defaults_for_sparse_document() {
    let note: WireNote = serde_json::from_value(json!({ "title": "t" })).unwrap();
    assert_eq!(note.title, Field::plain("t"));
    assert_eq!(note.content, Field::default());
    assert!(note.tags.is_empty());
    assert!(!note.encrypted_marker);
    assert_eq!(note.version, 1);
    assert_eq!(note.metadata.font_size, 16);
    assert_eq!(note.metadata.text_align, TextAlign::Left);
}

#[test]
fn wire_note_non_array_tags_become_empty() {
    let note: WireNote = serde_json::from_value(json!({ "tags": "work" })).unwrap();
    assert!(note.tags.is_empty());
}

#[test]
fn wire_note_keeps_unknown_top_level_keys() {
    let doc = json!({
        "title": "t",
        "_encrypted": false,
        "pinnedBy": "desktop",
        "color": { "bg": "#fff" },
    });
    let note: WireNote = serde_json::from_value(doc).unwrap();
    assert_eq!(note.extra.len(), 2);
    assert!(!note.extra.contains_key("_encrypted"));

    let back = serde_json::to_value(&note).unwrap();
    assert_eq!(back["pinnedBy"], json!("desktop"));
    assert_eq!(back["color"], json!({ "bg": "#fff" }));
}

#[test]
fn wire_note_uses_underscore_keys() {
    let id = NoteId::new();
    let mut note = wire(Field::plain("a"), Field::plain("b"), vec![], true);
    note.id = Some(id);
    note.is_favorite = true;
    let value = serde_json::to_value(&note).unwrap();
    assert_eq!(value["_id"], json!(id.to_string()));
    assert_eq!(value["_encrypted"], json!(true));
    assert_eq!(value["isFavorite"], json!(true));
    assert!(value.get("lastModified").is_none());
}

#[test]
fn shape_marker_any_field_encrypted() {
    assert!(wire(enc(), enc(), vec![], false).shape_marker());
    assert!(wire(enc(), Field::plain("c"), vec![], false).shape_marker());
    assert!(wire(Field::plain("t"), Field::plain("c"), vec![enc()], false).shape_marker());
    assert!(!wire(Field::plain("t"), Field::plain("c"), vec![], true).shape_marker());
}

#[test]
fn fully_encrypted_needs_title_and_content() {
    assert!(wire(enc(), enc(), vec![], true).is_fully_encrypted());
    assert!(!wire(enc(), Field::plain("c"), vec![], true).is_fully_encrypted());
}

#[test]
fn marker_staleness_in_both_directions() {
    assert!(wire(enc(), enc(), vec![], false).marker_is_stale());
    assert!(wire(Field::plain("t"), Field::plain("c"), vec![], true).marker_is_stale());
    assert!(!wire(enc(), enc(), vec![], true).marker_is_stale());
    assert!(!wire(Field::plain("t"), Field::plain("c"), vec![], false).marker_is_stale());
}

// ── PlainNote ─────────────────────────────────────────────────────

#[test]
fn plain_note_builder() {
    let id = NoteId::new();
    let note = PlainNote::new("Meeting Notes", "Discuss Q3 roadmap")
        .with_tags(["work", "q3"])
        .with_id(id);
    assert_eq!(note.id, Some(id));
    assert_eq!(note.tags, vec!["work".to_string(), "q3".to_string()]);
    assert!(!note.decryption_failed);
}

#[test]
fn plain_note_omits_flags_when_false() {
    let value = serde_json::to_value(PlainNote::new("t", "c")).unwrap();
    assert!(value.get("_decryptionFailed").is_none());
    assert!(value.get("_keyMismatch").is_none());

    let mut flagged = PlainNote::new("t", "c");
    flagged.decryption_failed = true;
    flagged.key_mismatch = true;
    let value = serde_json::to_value(flagged).unwrap();
    assert_eq!(value["_decryptionFailed"], json!(true));
    assert_eq!(value["_keyMismatch"], json!(true));
}

// ── Profile ───────────────────────────────────────────────────────

#[test]
fn empty_profile_is_pending() {
    let profile = UserEncryptionProfile::default();
    assert!(!profile.is_initialized());
    assert!(!profile.has_stable_key());
    assert_eq!(profile.status(), EncryptionStatus::Pending);
    assert_eq!(profile.algorithm, "AES-256-CBC");
    assert_eq!(profile.version, "1.0");
}

#[test]
fn empty_strings_count_as_absent() {
    let profile = UserEncryptionProfile {
        salt: Some(String::new()),
        stable_key: Some(String::new()),
        ..Default::default()
    };
    assert!(!profile.is_initialized());
    assert!(!profile.has_stable_key());
}

#[test]
fn disabled_profile_status() {
    let profile = UserEncryptionProfile {
        salt: Some("s".into()),
        enabled: false,
        ..Default::default()
    };
    assert_eq!(profile.status(), EncryptionStatus::Disabled);
}

#[test]
fn profile_wire_names_stable_key_encryption_key() {
    let profile = UserEncryptionProfile {
        salt: Some("s".into()),
        stable_key: Some("k".into()),
        ..Default::default()
    };
    let value = serde_json::to_value(&profile).unwrap();
    assert_eq!(value["encryptionKey"], json!("k"));
    assert_eq!(profile.status(), EncryptionStatus::Enabled);
}

#[test]
fn profile_debug_redacts_stable_key() {
    let profile = UserEncryptionProfile {
        stable_key: Some("super-secret-key".into()),
        ..Default::default()
    };
    let debug = format!("{profile:?}");
    assert!(!debug.contains("super-secret-key"));
    assert!(debug.contains("REDACTED"));
}

#[test]
fn identity_with_email() {
    let account = AccountId::new();
    let identity = AccountIdentity::new(account).with_email("a@example.com");
    assert_eq!(identity.account_id, account);
    assert_eq!(identity.email.as_deref(), Some("a@example.com"));
}

// ── API bodies ────────────────────────────────────────────────────

#[test]
fn initialize_request_uses_current_suite() {
    let req = InitializeProfileRequest::new("salt");
    assert_eq!(req.algorithm, "AES-256-CBC");
    assert_eq!(req.version, "1.0");
    assert!(req.enabled);
}

#[test]
fn provision_request_omits_absent_key() {
    let value = serde_json::to_value(ProvisionKeyRequest::default()).unwrap();
    assert_eq!(value, json!({}));
    let value = serde_json::to_value(ProvisionKeyRequest {
        encryption_key: Some("k".into()),
    })
    .unwrap();
    assert_eq!(value, json!({ "encryptionKey": "k" }));
}

#[test]
fn note_query_defaults() {
    let query: NoteQuery = serde_json::from_value(json!({ "filter": "favorites" })).unwrap();
    assert_eq!(query.page, 1);
    assert_eq!(query.limit, 20);
    assert_eq!(query.filter, NoteFilter::Favorites);
}
