//! Key lifecycle against the profile API.
//!
//! Reading the effective secret and persisting it are separate steps:
//! [`KeyService::resolve`] never touches the network, and
//! [`KeyService::write_back`] is idempotent on the server side. A session
//! whose write-back failed stays unconfirmed until
//! [`KeyService::confirm_session`] succeeds, and after a lost provisioning
//! race the session switches to the key the server kept.

use crate::api::ProfileApi;
use crate::error::{SyncError, SyncResult};
use crate::session::EncryptionSession;
use notecrypt_crypto::{
    derive_identity_secret, generate_salt, resolve_effective_secret, CryptoError, EffectiveSecret,
};
use notecrypt_types::{AccountIdentity, InitializeProfileRequest, UserEncryptionProfile};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves and provisions the account's key material.
#[derive(Clone)]
pub struct KeyService {
    api: Arc<dyn ProfileApi>,
}

impl KeyService {
    pub fn new(api: Arc<dyn ProfileApi>) -> Self {
        Self { api }
    }

    /// Brings the profile to a usable state: salt set, stable key present.
    ///
    /// A lost initialization race is not an error; the winner's salt is
    /// adopted. Failure to provision the stable key is logged and left for
    /// the write-back path.
    pub async fn initialize_profile(
        &self,
        identity: &AccountIdentity,
    ) -> SyncResult<UserEncryptionProfile> {
        let mut profile = self.api.get_profile().await?;
        if !profile.enabled {
            debug!(account = %identity.account_id, "encryption disabled for account");
            return Ok(profile);
        }

        if !profile.is_initialized() {
            let request = InitializeProfileRequest::new(generate_salt(&identity.account_id));
            profile = match self.api.initialize_profile(&request).await {
                Ok(profile) => {
                    info!(account = %identity.account_id, "encryption profile initialized");
                    profile
                }
                Err(SyncError::AlreadyInitialized) => {
                    debug!(account = %identity.account_id, "profile initialized concurrently");
                    self.api.get_profile().await?
                }
                Err(e) => return Err(e),
            };
        }

        if !profile.has_stable_key() {
            let proposed = identity
                .email
                .as_deref()
                .map(str::trim)
                .filter(|email| !email.is_empty())
                .map(|email| derive_identity_secret(&identity.account_id, email));
            match self.api.provision_stable_key(proposed.as_deref()).await {
                Ok(provisioned) => profile = provisioned,
                Err(e) => {
                    warn!(account = %identity.account_id, error = %e, "stable key provisioning failed");
                }
            }
        }

        Ok(profile)
    }

    /// Returns the effective secret for `profile`. No I/O.
    pub fn resolve(
        &self,
        profile: &UserEncryptionProfile,
        identity: &AccountIdentity,
    ) -> SyncResult<EffectiveSecret> {
        Ok(resolve_effective_secret(profile, identity)?)
    }

    /// Persists `secret` as the stable key if the account has none.
    ///
    /// Returns the server's profile. If another writer won, the returned
    /// profile holds their key; [`confirm_session`](Self::confirm_session)
    /// adopts it.
    pub async fn write_back(&self, secret: &EffectiveSecret) -> SyncResult<UserEncryptionProfile> {
        let profile = self.api.provision_stable_key(Some(secret.as_str())).await?;
        match profile.stable_key() {
            Some(stored) if stored == secret.as_str() => debug!("stable key written back"),
            Some(_) => debug!("server kept a different stable key"),
            None => warn!("stable key write-back returned no key"),
        }
        Ok(profile)
    }

    /// Writes the session's secret back and makes the session use whatever
    /// key the server stores.
    ///
    /// A no-op for sessions that already use the stable key. Safe to retry.
    pub async fn confirm_session(&self, session: &EncryptionSession) -> SyncResult<()> {
        if !session.is_enabled() || session.is_confirmed() {
            return Ok(());
        }

        let keys = session.keys();
        let secret = keys.secret().ok_or(CryptoError::MissingKey)?;
        let profile = self.write_back(secret).await?;
        let stored = profile
            .stable_key()
            .ok_or_else(|| SyncError::Protocol("stable key write-back returned no key".into()))?;

        if session.adopt_stable_key(stored) {
            warn!(account = %session.account(), "adopted the stable key stored by another login");
        } else {
            debug!(account = %session.account(), "session key confirmed");
        }
        Ok(())
    }

    /// Initializes the profile and builds the session for this login.
    ///
    /// An identity-derived secret is written back before the session is
    /// returned. If that fails the session is still returned, unconfirmed;
    /// reads work and writes wait for
    /// [`confirm_session`](Self::confirm_session).
    pub async fn open_session(&self, identity: &AccountIdentity) -> SyncResult<EncryptionSession> {
        let profile = self.initialize_profile(identity).await?;

        if !profile.enabled {
            let secret = self.resolve(&profile, identity).ok();
            return Ok(EncryptionSession::disabled(identity.account_id, secret));
        }

        let salt = profile
            .salt()
            .ok_or_else(|| SyncError::Protocol("profile has no salt after initialization".into()))?
            .to_string();
        let secret = self.resolve(&profile, identity)?;
        let session = EncryptionSession::new(identity.account_id, salt, secret);

        if let Err(e) = self.confirm_session(&session).await {
            warn!(account = %identity.account_id, error = %e, "stable key write-back failed; session is read-only until confirmed");
        }

        info!(
            account = %identity.account_id,
            status = profile.status().message(),
            confirmed = session.is_confirmed(),
            "encryption session opened"
        );
        Ok(session)
    }
}
