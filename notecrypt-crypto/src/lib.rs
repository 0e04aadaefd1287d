//! Client-side field-level encryption for notecrypt.
//!
//! Note titles, contents and tags are encrypted one field at a time before
//! they leave the client:
//! - [`key`]: PBKDF2 key stretching and effective-secret resolution
//! - [`cipher`]: AES-256-CBC with an HMAC-SHA256 tag per field
//! - [`codec`]: whole-note encryption and shape-driven decryption
//!
//! Everything here is pure computation; fetching and persisting key
//! material is the job of `notecrypt-sync`.

pub mod cipher;
pub mod codec;
pub mod error;
pub mod key;

pub use cipher::{authenticate, FieldCipher, IV_SIZE};
pub use codec::{
    plain_to_wire, EncryptFailurePolicy, NoteCodec, NoteSealer, TITLE_DECRYPTION_FAILED, TITLE_KEY_MISMATCH,
    UNTITLED_NOTE,
};
pub use error::{CryptoError, CryptoResult};
pub use key::{
    derive_identity_secret, derive_key, generate_salt, generate_stable_key,
    resolve_effective_secret, DerivedKey, EffectiveSecret, KdfParams, KeySource,
    DEFAULT_KDF_ITERATIONS, KEY_SIZE, SALT_SIZE,
};
