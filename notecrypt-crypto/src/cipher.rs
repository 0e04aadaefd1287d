//! Field encryption using AES-256-CBC with an HMAC-SHA256 tag.
//!
//! Each field gets its own random IV. The tag covers the hex text of
//! ciphertext followed by IV and is checked before any block decryption, so
//! a wrong key is reported as such instead of surfacing as a padding error.

use crate::error::{CryptoError, CryptoResult};
use crate::key::{derive_key, DerivedKey, KdfParams};
use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use notecrypt_types::{EncryptedField, CIPHER_ALGORITHM, FORMAT_VERSION};
use rand::RngCore;
use sha2::Sha256;

/// Size of the CBC initialisation vector in bytes.
pub const IV_SIZE: usize = 16;

/// AES block size in bytes.
const BLOCK_SIZE: usize = 16;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type HmacSha256 = Hmac<Sha256>;

fn tag_mac(key: &DerivedKey, ciphertext_hex: &str, iv_hex: &str) -> CryptoResult<HmacSha256> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;
    mac.update(ciphertext_hex.as_bytes());
    mac.update(iv_hex.as_bytes());
    Ok(mac)
}

/// Computes the hex authentication tag for a ciphertext/IV pair.
pub fn authenticate(key: &DerivedKey, ciphertext_hex: &str, iv_hex: &str) -> CryptoResult<String> {
    let mac = tag_mac(key, ciphertext_hex, iv_hex)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Checks the field's tag in constant time.
fn verify_tag(key: &DerivedKey, field: &EncryptedField) -> CryptoResult<()> {
    if field.hmac.is_empty() {
        return Err(CryptoError::HmacVerification);
    }
    let tag = hex::decode(&field.hmac).map_err(|_| CryptoError::HmacVerification)?;
    tag_mac(key, &field.ciphertext, &field.iv)?
        .verify_slice(&tag)
        .map_err(|_| CryptoError::HmacVerification)
}

fn check_suite(field: &EncryptedField) -> CryptoResult<()> {
    if field.algorithm != CIPHER_ALGORITHM {
        return Err(CryptoError::UnsupportedAlgorithm(field.algorithm.clone()));
    }
    if field.version != FORMAT_VERSION {
        return Err(CryptoError::UnsupportedVersion(field.version.clone()));
    }
    Ok(())
}

fn check_required(field: &EncryptedField) -> CryptoResult<()> {
    let missing = [
        ("ciphertext", &field.ciphertext),
        ("iv", &field.iv),
        ("salt", &field.salt),
    ]
    .into_iter()
    .find(|(_, value)| value.is_empty());

    match missing {
        Some((name, _)) => Err(CryptoError::CorruptedCiphertext(format!("missing {name}"))),
        None => Ok(()),
    }
}

/// Encrypts and decrypts single string fields.
///
/// Stateless apart from the KDF parameters; safe to share across threads.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldCipher {
    params: KdfParams,
}

impl FieldCipher {
    pub fn new(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Derives the field key for a secret and salt.
    pub fn derive_key(&self, secret: &str, salt: &str) -> CryptoResult<DerivedKey> {
        derive_key(secret, salt, &self.params)
    }

    /// Encrypts `plaintext` under the key derived from `secret` and `salt`.
    pub fn encrypt(&self, plaintext: &str, secret: &str, salt: &str) -> CryptoResult<EncryptedField> {
        let key = self.derive_key(secret, salt)?;
        Self::encrypt_with_key(&key, plaintext, salt)
    }

    /// Encrypts with an already derived key. `salt` must be the salt the key
    /// was derived from; it is recorded in the field for decryption.
    pub fn encrypt_with_key(
        key: &DerivedKey,
        plaintext: &str,
        salt: &str,
    ) -> CryptoResult<EncryptedField> {
        let mut iv = [0u8; IV_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let ciphertext_hex = hex::encode(ciphertext);
        let iv_hex = hex::encode(iv);
        let hmac = authenticate(key, &ciphertext_hex, &iv_hex)?;

        Ok(EncryptedField {
            ciphertext: ciphertext_hex,
            iv: iv_hex,
            hmac,
            salt: salt.to_string(),
            algorithm: CIPHER_ALGORITHM.to_string(),
            version: FORMAT_VERSION.to_string(),
        })
    }

    /// Checks the cipher suite and the presence of the required parts.
    pub fn validate(field: &EncryptedField) -> CryptoResult<()> {
        check_suite(field)?;
        check_required(field)
    }

    /// Decrypts a field, deriving the key from `secret` and the field's salt.
    pub fn decrypt(&self, field: &EncryptedField, secret: &str) -> CryptoResult<String> {
        Self::validate(field)?;
        let key = self.derive_key(secret, &field.salt)?;
        Self::open(&key, field)
    }

    /// Decrypts with an already derived key. The caller is responsible for
    /// having derived it from the field's own salt.
    pub fn decrypt_with_key(key: &DerivedKey, field: &EncryptedField) -> CryptoResult<String> {
        Self::validate(field)?;
        Self::open(key, field)
    }

    fn open(key: &DerivedKey, field: &EncryptedField) -> CryptoResult<String> {
        verify_tag(key, field)?;

        let ciphertext = hex::decode(&field.ciphertext)
            .map_err(|e| CryptoError::CorruptedCiphertext(format!("ciphertext: {e}")))?;
        let iv = hex::decode(&field.iv)
            .map_err(|e| CryptoError::CorruptedCiphertext(format!("iv: {e}")))?;
        if iv.len() != IV_SIZE {
            return Err(CryptoError::InvalidIvLength {
                expected: IV_SIZE,
                actual: iv.len(),
            });
        }
        if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
            return Err(CryptoError::CorruptedCiphertext(format!(
                "ciphertext length {} is not a whole number of blocks",
                ciphertext.len()
            )));
        }

        let plaintext = Aes256CbcDec::new_from_slices(key.as_bytes(), &iv)
            .map_err(|e| CryptoError::CorruptedCiphertext(e.to_string()))?
            .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
            .map_err(|_| CryptoError::CorruptedCiphertext("invalid padding".into()))?;

        String::from_utf8(plaintext)
            .map_err(|_| CryptoError::CorruptedCiphertext("plaintext is not UTF-8".into()))
    }
}
