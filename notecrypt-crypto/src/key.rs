//! Key derivation and key material.
//!
//! Field keys are stretched from the account's effective secret and salt
//! with PBKDF2-HMAC-SHA256. The derivation must be deterministic: every
//! field ever written under a `(secret, salt)` pair depends on getting the
//! same key back on the next login.

use crate::error::{CryptoError, CryptoResult};
use notecrypt_types::{AccountId, AccountIdentity, UserEncryptionProfile};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of derived keys in bytes (256 bits for AES-256).
pub const KEY_SIZE: usize = 32;

/// Size of the random component of a salt in bytes.
pub const SALT_SIZE: usize = 16;

/// PBKDF2 iteration count used by every deployed client.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// A derived encryption key with automatic zeroization on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    /// Creates a derived key from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Returns the key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Key derivation parameters.
///
/// The iteration count is not carried on the wire, so all clients of one
/// deployment must agree on it. Lower values exist for tests only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    pub iterations: u32,
}

impl KdfParams {
    /// Creates parameters with the given iteration count.
    pub fn new(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_KDF_ITERATIONS,
        }
    }
}

/// Derives a 256-bit key from a secret and salt.
///
/// Both are used as their UTF-8 bytes. Empty inputs are rejected: an empty
/// secret would make every account share a key.
pub fn derive_key(secret: &str, salt: &str, params: &KdfParams) -> CryptoResult<DerivedKey> {
    if secret.is_empty() {
        return Err(CryptoError::KeyDerivation("empty secret".into()));
    }
    if salt.is_empty() {
        return Err(CryptoError::KeyDerivation("empty salt".into()));
    }
    if params.iterations == 0 {
        return Err(CryptoError::KeyDerivation("zero iterations".into()));
    }

    let mut bytes = [0u8; KEY_SIZE];
    pbkdf2_hmac::<Sha256>(
        secret.as_bytes(),
        salt.as_bytes(),
        params.iterations,
        &mut bytes,
    );
    let key = DerivedKey::from_bytes(bytes);
    bytes.zeroize();
    Ok(key)
}

/// Generates a fresh account salt.
///
/// Random bytes are mixed with the account id so two accounts never share a
/// salt even with a faulty RNG.
pub fn generate_salt(account: &AccountId) -> String {
    let mut random = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut random);
    let mut hasher = Sha256::new();
    hasher.update(hex::encode(random).as_bytes());
    hasher.update(account.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

/// Generates a random stable key.
pub fn generate_stable_key() -> String {
    let mut bytes = [0u8; KEY_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut bytes);
    let key = hex::encode(bytes);
    bytes.zeroize();
    key
}

/// Derives the fallback secret from durable identity attributes.
pub fn derive_identity_secret(account: &AccountId, email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(account.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(email.as_bytes());
    hex::encode(hasher.finalize())
}

/// Where an effective secret came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeySource {
    /// The server-custodied stable key.
    StableKey,
    /// Derived from account id and email; not yet persisted.
    IdentityDerived,
}

/// The secret field keys are derived from for the current session.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EffectiveSecret {
    secret: String,
    #[zeroize(skip)]
    source: KeySource,
}

impl EffectiveSecret {
    pub fn new(secret: impl Into<String>, source: KeySource) -> Self {
        Self {
            secret: secret.into(),
            source,
        }
    }

    /// Returns the secret text.
    pub fn as_str(&self) -> &str {
        &self.secret
    }

    pub fn source(&self) -> KeySource {
        self.source
    }

    /// Returns true if the secret should be persisted as the stable key.
    pub fn needs_write_back(&self) -> bool {
        self.source == KeySource::IdentityDerived
    }
}

impl std::fmt::Debug for EffectiveSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectiveSecret")
            .field("secret", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Resolves the effective secret for an account. Performs no I/O.
///
/// The stable key wins whenever present. Otherwise the secret is derived
/// from account id and verified email, and the caller is expected to
/// persist it (see [`EffectiveSecret::needs_write_back`]).
pub fn resolve_effective_secret(
    profile: &UserEncryptionProfile,
    identity: &AccountIdentity,
) -> CryptoResult<EffectiveSecret> {
    if let Some(key) = profile.stable_key() {
        return Ok(EffectiveSecret::new(key, KeySource::StableKey));
    }

    match identity.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => Ok(EffectiveSecret::new(
            derive_identity_secret(&identity.account_id, email),
            KeySource::IdentityDerived,
        )),
        _ => Err(CryptoError::MissingKey),
    }
}
