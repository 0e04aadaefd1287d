//! Per-account encryption profile.

use crate::field::{CIPHER_ALGORITHM, FORMAT_VERSION};
use crate::ids::AccountId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

fn default_algorithm() -> String {
    CIPHER_ALGORITHM.to_string()
}

fn default_format_version() -> String {
    FORMAT_VERSION.to_string()
}

fn default_enabled() -> bool {
    true
}

/// The server-custodied encryption record for one account.
///
/// Created empty with the account. `salt` is set once by profile
/// initialization; `stable_key` is set once by key provisioning. Neither is
/// ever regenerated: a new key orphans every field encrypted under the old one.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserEncryptionProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Stable key material (`encryptionKey` on the wire).
    #[serde(rename = "encryptionKey", default, skip_serializing_if = "Option::is_none")]
    pub stable_key: Option<String>,
    #[serde(default = "default_algorithm")]
    pub algorithm: String,
    #[serde(default = "default_format_version")]
    pub version: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
}

impl UserEncryptionProfile {
    /// Returns the salt, treating an empty string as absent.
    pub fn salt(&self) -> Option<&str> {
        self.salt.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns the stable key, treating an empty string as absent.
    pub fn stable_key(&self) -> Option<&str> {
        self.stable_key.as_deref().filter(|s| !s.is_empty())
    }

    /// Returns true once a salt has been set.
    pub fn is_initialized(&self) -> bool {
        self.salt().is_some()
    }

    /// Returns true once a stable key has been provisioned.
    pub fn has_stable_key(&self) -> bool {
        self.stable_key().is_some()
    }

    /// Summarises the profile for status displays.
    pub fn status(&self) -> EncryptionStatus {
        if !self.enabled {
            EncryptionStatus::Disabled
        } else if !self.is_initialized() {
            EncryptionStatus::Pending
        } else {
            EncryptionStatus::Enabled
        }
    }
}

impl Default for UserEncryptionProfile {
    fn default() -> Self {
        Self {
            salt: None,
            stable_key: None,
            algorithm: default_algorithm(),
            version: default_format_version(),
            enabled: default_enabled(),
            created: None,
        }
    }
}

impl fmt::Debug for UserEncryptionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserEncryptionProfile")
            .field("salt", &self.salt)
            .field(
                "stable_key",
                &self.stable_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("algorithm", &self.algorithm)
            .field("version", &self.version)
            .field("enabled", &self.enabled)
            .field("created", &self.created)
            .finish()
    }
}

/// Coarse encryption state of an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncryptionStatus {
    /// Encryption switched off for the account.
    Disabled,
    /// Enabled, but no salt yet.
    Pending,
    Enabled,
}

impl EncryptionStatus {
    /// Human-readable description.
    pub fn message(&self) -> &'static str {
        match self {
            Self::Disabled => "Encryption disabled",
            Self::Pending => "Encryption not initialized",
            Self::Enabled => "Encryption active",
        }
    }
}

/// Durable attributes of the authenticated user.
///
/// `email` must be the verified address; it feeds the fallback secret
/// derivation when no stable key exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub account_id: AccountId,
    pub email: Option<String>,
}

impl AccountIdentity {
    /// Creates an identity without an email.
    pub fn new(account_id: AccountId) -> Self {
        Self {
            account_id,
            email: None,
        }
    }

    /// Sets the verified email.
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }
}
