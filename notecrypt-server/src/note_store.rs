//! Note documents and their content history.
//!
//! Notes are stored as the JSON documents the client sent. Top-level keys
//! the server does not model are kept in [`WireNote::extra`] and written back
//! unchanged. Favourite/archive flags and the modification time are mirrored
//! into columns for listing.

use crate::db::Database;
use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Utc};
use notecrypt_types::{AccountId, HistoryEntry, NoteFilter, NoteId, NotePage, NoteQuery, WireNote};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde_json::Value;
use tracing::{debug, warn};

/// Number of previous content versions kept per note.
pub const HISTORY_LIMIT: usize = 10;

/// Largest page a listing returns.
pub const MAX_PAGE_SIZE: u32 = 100;

/// SQLite-backed note store.
#[derive(Clone)]
pub struct NoteStore {
    db: Database,
}

fn warn_if_stale(id: NoteId, note: &WireNote) {
    if note.marker_is_stale() {
        warn!(
            note = %id.short(),
            marker = note.encrypted_marker,
            "stored _encrypted marker disagrees with field shapes"
        );
    }
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation
    )
}

fn load_document(
    conn: &Connection,
    account: AccountId,
    id: NoteId,
) -> ServerResult<Option<WireNote>> {
    let document: Option<String> = conn
        .query_row(
            "SELECT document FROM notes WHERE id = ?1 AND account_id = ?2",
            params![id.to_string(), account.to_string()],
            |row| row.get(0),
        )
        .optional()
        .map_err(ServerError::storage("failed to load note"))?;
    document
        .map(|doc| serde_json::from_str(&doc).map_err(ServerError::from))
        .transpose()
}

/// Appends `previous`'s content to the history and trims it to
/// [`HISTORY_LIMIT`] entries.
fn record_history(
    conn: &Connection,
    id: NoteId,
    previous: &WireNote,
    now: DateTime<Utc>,
) -> ServerResult<()> {
    conn.execute(
        "INSERT INTO note_history (note_id, version, content, timestamp)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            id.to_string(),
            previous.version,
            serde_json::to_string(&previous.content)?,
            previous.last_modified.unwrap_or(now).to_rfc3339(),
        ],
    )
    .map_err(ServerError::storage("failed to record history"))?;
    conn.execute(
        "DELETE FROM note_history WHERE note_id = ?1 AND version NOT IN (
             SELECT version FROM note_history WHERE note_id = ?1
             ORDER BY version DESC LIMIT ?2)",
        params![id.to_string(), HISTORY_LIMIT as i64],
    )
    .map_err(ServerError::storage("failed to trim history"))?;
    Ok(())
}

fn write_document(
    conn: &Connection,
    id: NoteId,
    note: &WireNote,
    now: DateTime<Utc>,
) -> ServerResult<()> {
    conn.execute(
        "UPDATE notes SET document = ?1, is_favorite = ?2, is_archived = ?3,
             last_modified_ms = ?4
         WHERE id = ?5",
        params![
            serde_json::to_string(note)?,
            note.is_favorite,
            note.is_archived,
            now.timestamp_millis(),
            id.to_string(),
        ],
    )
    .map_err(ServerError::storage("failed to update note"))?;
    Ok(())
}

impl NoteStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Stores a new note. A client-chosen id is kept; otherwise one is
    /// assigned.
    pub fn create(&self, account: AccountId, mut note: WireNote) -> ServerResult<WireNote> {
        let id = note.id.unwrap_or_default();
        let now = Utc::now();
        note.id = Some(id);
        note.version = 1;
        note.last_modified = Some(now);
        warn_if_stale(id, &note);

        let document = serde_json::to_string(&note)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO notes
                 (id, account_id, document, is_favorite, is_archived, last_modified_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id.to_string(),
                account.to_string(),
                document,
                note.is_favorite,
                note.is_archived,
                now.timestamp_millis(),
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                ServerError::BadRequest(format!("note {id} already exists"))
            } else {
                ServerError::Storage(format!("failed to create note: {e}"))
            }
        })?;

        debug!(note = %id.short(), %account, "note created");
        Ok(note)
    }

    /// Replaces a note, bumping its version. If the content changed, the
    /// previous content is appended to the note's history.
    ///
    /// Encrypted content gets a fresh IV on every save, so an encrypted
    /// note records history on every update, including title-only edits.
    pub fn update(
        &self,
        account: AccountId,
        id: NoteId,
        mut note: WireNote,
    ) -> ServerResult<WireNote> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction()
            .map_err(ServerError::storage("failed to begin transaction"))?;

        let previous = load_document(&tx, account, id)?
            .ok_or_else(|| ServerError::NotFound(format!("note {id}")))?;

        let now = Utc::now();
        note.id = Some(id);
        note.version = previous.version + 1;
        note.last_modified = Some(now);
        warn_if_stale(id, &note);

        if previous.content != note.content {
            record_history(&tx, id, &previous, now)?;
        }
        write_document(&tx, id, &note, now)?;

        tx.commit()
            .map_err(ServerError::storage("failed to commit note update"))?;
        debug!(note = %id.short(), version = note.version, "note updated");
        Ok(note)
    }

    /// Makes a previous content version current again.
    ///
    /// The replaced content goes to history like any other edit and the
    /// version number moves forward. The stored field is reused as is, so
    /// an encrypted version comes back under the key it was written with.
    pub fn restore(&self, account: AccountId, id: NoteId, version: u32) -> ServerResult<WireNote> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction()
            .map_err(ServerError::storage("failed to begin transaction"))?;

        let previous = load_document(&tx, account, id)?
            .ok_or_else(|| ServerError::NotFound(format!("note {id}")))?;
        let content: String = tx
            .query_row(
                "SELECT content FROM note_history WHERE note_id = ?1 AND version = ?2",
                params![id.to_string(), version],
                |row| row.get(0),
            )
            .optional()
            .map_err(ServerError::storage("failed to load history version"))?
            .ok_or_else(|| ServerError::NotFound(format!("version {version} of note {id}")))?;

        let now = Utc::now();
        let mut note = previous.clone();
        note.content = serde_json::from_str(&content)?;
        note.encrypted_marker = note.has_encrypted_fields();
        note.version = previous.version + 1;
        note.last_modified = Some(now);

        if previous.content != note.content {
            record_history(&tx, id, &previous, now)?;
        }
        write_document(&tx, id, &note, now)?;

        tx.commit()
            .map_err(ServerError::storage("failed to commit note restore"))?;
        debug!(note = %id.short(), restored = version, version = note.version, "note restored");
        Ok(note)
    }

    pub fn get(&self, account: AccountId, id: NoteId) -> ServerResult<WireNote> {
        let conn = self.db.lock()?;
        load_document(&conn, account, id)?
            .ok_or_else(|| ServerError::NotFound(format!("note {id}")))
    }

    /// Returns one page of the account's notes, newest first.
    pub fn list(&self, account: AccountId, query: &NoteQuery) -> ServerResult<NotePage> {
        let limit = query.limit.clamp(1, MAX_PAGE_SIZE);
        let page = query.page.max(1);
        let offset = i64::from(page - 1) * i64::from(limit);
        let filter = match query.filter {
            NoteFilter::All => "is_archived = 0",
            NoteFilter::Favorites => "is_favorite = 1 AND is_archived = 0",
            NoteFilter::Archived => "is_archived = 1",
        };

        let conn = self.db.lock()?;
        let total: i64 = conn
            .query_row(
                &format!("SELECT COUNT(*) FROM notes WHERE account_id = ?1 AND {filter}"),
                params![account.to_string()],
                |row| row.get(0),
            )
            .map_err(ServerError::storage("failed to count notes"))?;

        let mut stmt = conn
            .prepare(&format!(
                "SELECT document FROM notes WHERE account_id = ?1 AND {filter}
                 ORDER BY last_modified_ms DESC, id DESC LIMIT ?2 OFFSET ?3"
            ))
            .map_err(ServerError::storage("failed to prepare note listing"))?;
        let documents = stmt
            .query_map(params![account.to_string(), limit, offset], |row| {
                row.get::<_, String>(0)
            })
            .map_err(ServerError::storage("failed to list notes"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::storage("failed to read note row"))?;

        let notes = documents
            .iter()
            .map(|doc| serde_json::from_str(doc))
            .collect::<Result<Vec<WireNote>, _>>()?;

        let total = total.max(0) as u64;
        Ok(NotePage {
            notes,
            total_pages: total.div_ceil(u64::from(limit)) as u32,
            current_page: page,
            total,
        })
    }

    pub fn delete(&self, account: AccountId, id: NoteId) -> ServerResult<()> {
        let mut conn = self.db.lock()?;
        let tx = conn
            .transaction()
            .map_err(ServerError::storage("failed to begin transaction"))?;
        let removed = tx
            .execute(
                "DELETE FROM notes WHERE id = ?1 AND account_id = ?2",
                params![id.to_string(), account.to_string()],
            )
            .map_err(ServerError::storage("failed to delete note"))?;
        if removed == 0 {
            return Err(ServerError::NotFound(format!("note {id}")));
        }
        tx.execute(
            "DELETE FROM note_history WHERE note_id = ?1",
            params![id.to_string()],
        )
        .map_err(ServerError::storage("failed to delete note history"))?;
        tx.commit()
            .map_err(ServerError::storage("failed to commit note delete"))?;
        debug!(note = %id.short(), "note deleted");
        Ok(())
    }

    /// Previous content versions of a note, newest first.
    pub fn history(&self, account: AccountId, id: NoteId) -> ServerResult<Vec<HistoryEntry>> {
        let conn = self.db.lock()?;
        if load_document(&conn, account, id)?.is_none() {
            return Err(ServerError::NotFound(format!("note {id}")));
        }

        let mut stmt = conn
            .prepare(
                "SELECT content, timestamp, version FROM note_history
                 WHERE note_id = ?1 ORDER BY version DESC",
            )
            .map_err(ServerError::storage("failed to prepare history query"))?;
        let rows = stmt
            .query_map(params![id.to_string()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u32>(2)?,
                ))
            })
            .map_err(ServerError::storage("failed to load history"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::storage("failed to read history row"))?;

        rows.into_iter()
            .map(|(content, timestamp, version)| -> ServerResult<HistoryEntry> {
                let timestamp = DateTime::parse_from_rfc3339(&timestamp)
                    .map_err(|e| ServerError::Storage(format!("bad history timestamp: {e}")))?
                    .with_timezone(&Utc);
                Ok(HistoryEntry {
                    content: serde_json::from_str(&content)?,
                    timestamp,
                    version,
                })
            })
            .collect()
    }

    /// Returns true if any of the account's notes has an encrypted field.
    pub fn account_has_encrypted_notes(&self, account: AccountId) -> ServerResult<bool> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare("SELECT document FROM notes WHERE account_id = ?1")
            .map_err(ServerError::storage("failed to prepare note scan"))?;
        let documents = stmt
            .query_map(params![account.to_string()], |row| row.get::<_, String>(0))
            .map_err(ServerError::storage("failed to scan notes"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::storage("failed to read note row"))?;

        for doc in documents {
            let note: WireNote = serde_json::from_str(&doc)?;
            if note.has_encrypted_fields() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Every stored document as raw JSON, across all accounts.
    pub fn raw_documents(&self) -> ServerResult<Vec<(String, Value)>> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare("SELECT id, document FROM notes ORDER BY id")
            .map_err(ServerError::storage("failed to prepare document scan"))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(ServerError::storage("failed to scan documents"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::storage("failed to read document row"))?;

        rows.into_iter()
            .map(|(id, doc)| -> ServerResult<(String, Value)> {
                Ok((id, serde_json::from_str(&doc)?))
            })
            .collect()
    }

    /// Overwrites a stored document without touching version or history.
    pub fn replace_raw_document(&self, id: &str, document: &Value) -> ServerResult<()> {
        let conn = self.db.lock()?;
        let updated = conn
            .execute(
                "UPDATE notes SET document = ?1 WHERE id = ?2",
                params![serde_json::to_string(document)?, id],
            )
            .map_err(ServerError::storage("failed to rewrite document"))?;
        if updated == 0 {
            return Err(ServerError::NotFound(format!("note {id}")));
        }
        Ok(())
    }
}
