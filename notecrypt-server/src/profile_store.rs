//! Per-account encryption profiles.
//!
//! Both one-time writes are single SQLite upserts guarded on the column they
//! set, so concurrent requests for the same account, over one connection or
//! several, persist exactly one value. Callers that lose read back the
//! winner.

use crate::db::Database;
use crate::error::{ServerError, ServerResult};
use chrono::{DateTime, Utc};
use notecrypt_crypto::{generate_salt, generate_stable_key};
use notecrypt_types::{
    AccountId, InitializeProfileRequest, UserEncryptionProfile, CIPHER_ALGORITHM, FORMAT_VERSION,
};
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info, warn};

/// SQLite-backed store of [`UserEncryptionProfile`] records.
#[derive(Clone)]
pub struct ProfileStore {
    db: Database,
}

fn row_to_profile(row: &Row<'_>) -> rusqlite::Result<UserEncryptionProfile> {
    let created: Option<String> = row.get(5)?;
    Ok(UserEncryptionProfile {
        salt: row.get(0)?,
        stable_key: row.get(1)?,
        algorithm: row.get(2)?,
        version: row.get(3)?,
        enabled: row.get(4)?,
        created: created
            .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
            .map(|t| t.with_timezone(&Utc)),
    })
}

impl ProfileStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Returns the account's profile, or an empty one if none was stored yet.
    pub fn get(&self, account: AccountId) -> ServerResult<UserEncryptionProfile> {
        let conn = self.db.lock()?;
        let profile = conn
            .query_row(
                "SELECT salt, stable_key, algorithm, version, enabled, created
                 FROM encryption_profiles WHERE account_id = ?1",
                params![account.to_string()],
                row_to_profile,
            )
            .optional()
            .map_err(ServerError::storage("failed to load profile"))?;
        Ok(profile.unwrap_or_default())
    }

    /// Sets the account's salt. Fails with
    /// [`ServerError::AlreadyInitialized`] if a salt is already stored.
    pub fn initialize(
        &self,
        account: AccountId,
        request: &InitializeProfileRequest,
    ) -> ServerResult<UserEncryptionProfile> {
        if request.salt.trim().is_empty() {
            return Err(ServerError::BadRequest(
                "encryption salt is required".to_string(),
            ));
        }
        if request.algorithm != CIPHER_ALGORITHM || request.version != FORMAT_VERSION {
            return Err(ServerError::BadRequest(format!(
                "unsupported cipher suite {} v{}",
                request.algorithm, request.version
            )));
        }

        let changed = {
            let conn = self.db.lock()?;
            conn.execute(
                "INSERT INTO encryption_profiles
                     (account_id, salt, algorithm, version, enabled, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(account_id) DO UPDATE SET
                     salt = excluded.salt,
                     algorithm = excluded.algorithm,
                     version = excluded.version,
                     enabled = excluded.enabled,
                     created = excluded.created
                 WHERE encryption_profiles.salt IS NULL OR encryption_profiles.salt = ''",
                params![
                    account.to_string(),
                    request.salt,
                    request.algorithm,
                    request.version,
                    request.enabled,
                    request.created.to_rfc3339(),
                ],
            )
            .map_err(ServerError::storage("failed to initialize profile"))?
        };

        if changed == 0 {
            debug!(%account, "profile already initialized");
            return Err(ServerError::AlreadyInitialized);
        }
        info!(%account, "encryption profile initialized");
        self.get(account)
    }

    /// Persists a stable key unless one exists, and returns the stored profile.
    ///
    /// `proposed` is used when present and non-blank; otherwise a random key
    /// is generated. A profile that does not exist yet is created with a
    /// fresh salt.
    pub fn provision_stable_key(
        &self,
        account: AccountId,
        proposed: Option<&str>,
    ) -> ServerResult<UserEncryptionProfile> {
        let key = proposed
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .unwrap_or_else(generate_stable_key);

        let changed = {
            let conn = self.db.lock()?;
            conn.execute(
                "INSERT INTO encryption_profiles
                     (account_id, salt, stable_key, algorithm, version, enabled, created)
                 VALUES (?1, ?2, ?3, ?4, ?5, 1, ?6)
                 ON CONFLICT(account_id) DO UPDATE SET stable_key = excluded.stable_key
                 WHERE encryption_profiles.stable_key IS NULL
                    OR encryption_profiles.stable_key = ''",
                params![
                    account.to_string(),
                    generate_salt(&account),
                    key,
                    CIPHER_ALGORITHM,
                    FORMAT_VERSION,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(ServerError::storage("failed to provision stable key"))?
        };

        if changed == 0 {
            debug!(%account, "stable key already present");
        } else {
            info!(%account, "stable key provisioned");
        }
        self.get(account)
    }

    /// Deletes the account's profile. Notes encrypted under the old key
    /// become unreadable.
    pub fn reset(&self, account: AccountId) -> ServerResult<bool> {
        let conn = self.db.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM encryption_profiles WHERE account_id = ?1",
                params![account.to_string()],
            )
            .map_err(ServerError::storage("failed to reset profile"))?;
        if removed > 0 {
            warn!(%account, "encryption profile reset");
        }
        Ok(removed > 0)
    }

    /// Accounts that have a salt but no stable key.
    pub fn accounts_missing_stable_key(&self) -> ServerResult<Vec<AccountId>> {
        let conn = self.db.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT account_id FROM encryption_profiles
                 WHERE salt IS NOT NULL AND salt != ''
                   AND (stable_key IS NULL OR stable_key = '')
                 ORDER BY account_id",
            )
            .map_err(ServerError::storage("failed to prepare account scan"))?;
        let ids = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(ServerError::storage("failed to scan profiles"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(ServerError::storage("failed to read profile row"))?;

        let mut accounts = Vec::with_capacity(ids.len());
        for id in ids {
            match AccountId::parse(&id) {
                Ok(account) => accounts.push(account),
                Err(e) => warn!(account = %id, error = %e, "skipping profile with invalid account id"),
            }
        }
        Ok(accounts)
    }
}
