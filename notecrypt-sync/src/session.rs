//! Per-login encryption context.

use crate::error::{SyncError, SyncResult};
use notecrypt_crypto::{CryptoError, EffectiveSecret, KeySource};
use notecrypt_types::AccountId;
use std::sync::{Arc, PoisonError, RwLock};

/// Salt and secret of a session at one point in time.
///
/// Obtained from [`EncryptionSession::keys`]. A snapshot is immutable and
/// can be moved onto the blocking pool; a key adopted by the session later
/// does not change snapshots already taken.
pub struct SessionKeys {
    salt: Option<String>,
    secret: Option<EffectiveSecret>,
}

impl SessionKeys {
    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref()
    }

    pub fn secret(&self) -> Option<&EffectiveSecret> {
        self.secret.as_ref()
    }

    /// Secret text for decryption. Empty when none is known, which makes
    /// every encrypted field fail as a key mismatch.
    pub fn decrypt_secret(&self) -> &str {
        self.secret().map(EffectiveSecret::as_str).unwrap_or("")
    }

    /// Secret and salt for encryption.
    pub fn encryption_keys(&self) -> SyncResult<(&str, &str)> {
        match (self.secret(), self.salt()) {
            (Some(secret), Some(salt)) => Ok((secret.as_str(), salt)),
            _ => Err(CryptoError::MissingKey.into()),
        }
    }

    /// Returns true once the secret is the account's stored stable key.
    pub fn is_confirmed(&self) -> bool {
        self.secret()
            .is_some_and(|s| s.source() == KeySource::StableKey)
    }
}

struct SessionInner {
    account: AccountId,
    enabled: bool,
    keys: RwLock<Arc<SessionKeys>>,
}

/// The key material of one authenticated session.
///
/// Built once at login by
/// [`KeyService::open_session`](crate::KeyService::open_session) and passed
/// to every [`SyncClient`](crate::SyncClient) call. Clones share the same
/// material, so a key adopted through one clone is seen by all of them.
///
/// A session whose secret was derived from the identity and never stored
/// on the server is unconfirmed: it can read, but
/// [`SyncClient`](crate::SyncClient) refuses to encrypt writes with it until
/// [`KeyService::confirm_session`](crate::KeyService::confirm_session)
/// succeeds.
#[derive(Clone)]
pub struct EncryptionSession {
    inner: Arc<SessionInner>,
}

impl EncryptionSession {
    /// A session that encrypts writes.
    pub fn new(account: AccountId, salt: impl Into<String>, secret: EffectiveSecret) -> Self {
        Self::build(account, true, Some(salt.into()), Some(secret))
    }

    /// A session for an account with encryption switched off.
    ///
    /// Writes go out as plaintext. If a secret is still known, previously
    /// encrypted notes remain readable.
    pub fn disabled(account: AccountId, secret: Option<EffectiveSecret>) -> Self {
        Self::build(account, false, None, secret)
    }

    fn build(
        account: AccountId,
        enabled: bool,
        salt: Option<String>,
        secret: Option<EffectiveSecret>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                account,
                enabled,
                keys: RwLock::new(Arc::new(SessionKeys { salt, secret })),
            }),
        }
    }

    pub fn account(&self) -> AccountId {
        self.inner.account
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    /// Current key material.
    pub fn keys(&self) -> Arc<SessionKeys> {
        let keys = self
            .inner
            .keys
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&keys)
    }

    /// Returns true once the secret is the account's stored stable key.
    pub fn is_confirmed(&self) -> bool {
        self.keys().is_confirmed()
    }

    /// Replaces the secret with the stable key the server holds.
    ///
    /// Returns true if the secret text changed, i.e. this session had been
    /// using a key that lost the provisioning race.
    pub fn adopt_stable_key(&self, stable_key: &str) -> bool {
        let mut keys = self
            .inner
            .keys
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let changed = keys.decrypt_secret() != stable_key;
        *keys = Arc::new(SessionKeys {
            salt: keys.salt.clone(),
            secret: Some(EffectiveSecret::new(stable_key, KeySource::StableKey)),
        });
        changed
    }

    /// Fails with [`SyncError::KeyUnconfirmed`] if writes must not be
    /// encrypted with the current secret.
    pub(crate) fn ensure_writable(&self) -> SyncResult<()> {
        if self.is_enabled() && self.keys().secret().is_some() && !self.is_confirmed() {
            return Err(SyncError::KeyUnconfirmed);
        }
        Ok(())
    }
}

impl std::fmt::Debug for EncryptionSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let keys = self.keys();
        f.debug_struct("EncryptionSession")
            .field("account", &self.inner.account)
            .field("enabled", &self.inner.enabled)
            .field("salt", &keys.salt)
            .field("secret", &keys.secret.as_ref().map(|s| s.source()))
            .finish()
    }
}
