//! Out-of-band repair jobs run from the `migrate` subcommand.
//!
//! Each job is idempotent: running it twice corrects nothing the second time.

use crate::error::ServerResult;
use crate::note_store::NoteStore;
use crate::profile_store::ProfileStore;
use notecrypt_types::WireNote;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

const MARKER_KEY: &str = "_encrypted";

/// Outcome of one migration run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    /// Records examined.
    pub scanned: usize,
    /// Records rewritten.
    pub corrected: usize,
    /// Records left alone because they could not be handled safely.
    pub skipped: usize,
}

/// Rewrites a document's marker to `marker` if it differs. Returns whether
/// the document changed, or `None` if it is not a JSON object.
fn set_marker(document: &mut Value, marker: bool, only_if_absent: bool) -> Option<bool> {
    let object = document.as_object_mut()?;
    let current = object.get(MARKER_KEY);
    let stale = match current {
        None => true,
        Some(_) if only_if_absent => false,
        Some(value) => value.as_bool() != Some(marker),
    };
    if stale {
        object.insert(MARKER_KEY.to_string(), Value::Bool(marker));
    }
    Some(stale)
}

fn rewrite_markers(notes: &NoteStore, only_if_absent: bool) -> ServerResult<MigrationReport> {
    let mut report = MigrationReport::default();
    for (id, mut document) in notes.raw_documents()? {
        report.scanned += 1;
        let marker = match serde_json::from_value::<WireNote>(document.clone()) {
            Ok(note) => note.shape_marker(),
            Err(e) => {
                warn!(note = %id, error = %e, "skipping unreadable note document");
                report.skipped += 1;
                continue;
            }
        };
        match set_marker(&mut document, marker, only_if_absent) {
            Some(true) => {
                notes.replace_raw_document(&id, &document)?;
                report.corrected += 1;
            }
            Some(false) => {}
            None => report.skipped += 1,
        }
    }
    Ok(report)
}

/// Sets every note's `_encrypted` marker to whether any of its fields has
/// the encrypted shape.
pub fn recompute_encrypted_markers(notes: &NoteStore) -> ServerResult<MigrationReport> {
    let report = rewrite_markers(notes, false)?;
    info!(
        scanned = report.scanned,
        corrected = report.corrected,
        skipped = report.skipped,
        "encrypted markers recomputed"
    );
    Ok(report)
}

/// Gives notes written before the marker existed an explicit one.
pub fn mark_legacy_notes(notes: &NoteStore) -> ServerResult<MigrationReport> {
    let report = rewrite_markers(notes, true)?;
    info!(
        scanned = report.scanned,
        corrected = report.corrected,
        skipped = report.skipped,
        "legacy notes marked"
    );
    Ok(report)
}

/// Provisions a random stable key for every account that has a salt but no
/// key.
///
/// Accounts that already hold encrypted notes are skipped: those notes were
/// sealed under the identity-derived secret, which the server cannot
/// reconstruct, and a random key would orphan them. Their clients write the
/// identity-derived secret back on next login instead.
pub fn backfill_stable_keys(
    profiles: &ProfileStore,
    notes: &NoteStore,
) -> ServerResult<MigrationReport> {
    let mut report = MigrationReport::default();
    for account in profiles.accounts_missing_stable_key()? {
        report.scanned += 1;
        if notes.account_has_encrypted_notes(account)? {
            warn!(%account, "account has encrypted notes; leaving key provisioning to the client");
            report.skipped += 1;
            continue;
        }
        if profiles.provision_stable_key(account, None)?.has_stable_key() {
            report.corrected += 1;
        }
    }
    info!(
        scanned = report.scanned,
        corrected = report.corrected,
        skipped = report.skipped,
        "stable keys backfilled"
    );
    Ok(report)
}
