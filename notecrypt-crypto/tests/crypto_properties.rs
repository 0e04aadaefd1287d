//! Property-based tests for field encryption.
//!
//! These tests verify security properties that must always hold:
//! - Encryption is reversible with the correct secret
//! - Repeated encryption never repeats ciphertext
//! - Any tampering is detected before decryption
//! - A wrong secret never yields plaintext

use notecrypt_crypto::{CryptoError, FieldCipher, KdfParams};
use proptest::prelude::*;

// =============================================================================
// HELPER STRATEGIES
// =============================================================================

fn cipher() -> FieldCipher {
    FieldCipher::new(KdfParams::new(100))
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex(".{1,300}").unwrap()
}

fn secret_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9!@#$%^&*()]{1,64}").unwrap()
}

fn salt_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[0-9a-f]{8,64}").unwrap()
}

fn flip(s: &str, idx: usize) -> String {
    let mut chars: Vec<char> = s.chars().collect();
    let i = idx % chars.len();
    chars[i] = if chars[i] == '0' { '1' } else { '0' };
    chars.into_iter().collect()
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    /// Decrypting what was encrypted returns the original text.
    #[test]
    fn roundtrip_preserves_text(text in text_strategy(), secret in secret_strategy(), salt in salt_strategy()) {
        let field = cipher().encrypt(&text, &secret, &salt).unwrap();
        prop_assert_eq!(cipher().decrypt(&field, &secret).unwrap(), text);
    }

    /// Two encryptions of the same text differ but both decrypt.
    #[test]
    fn encryption_is_randomised(text in text_strategy(), secret in secret_strategy(), salt in salt_strategy()) {
        let a = cipher().encrypt(&text, &secret, &salt).unwrap();
        let b = cipher().encrypt(&text, &secret, &salt).unwrap();
        prop_assert_ne!(&a.iv, &b.iv);
        prop_assert_ne!(&a.ciphertext, &b.ciphertext);
        prop_assert_eq!(cipher().decrypt(&a, &secret).unwrap(), text.clone());
        prop_assert_eq!(cipher().decrypt(&b, &secret).unwrap(), text);
    }

    /// Flipping any character of ciphertext, IV or tag is detected.
    #[test]
    fn tampering_is_detected(text in text_strategy(), secret in secret_strategy(), which in 0usize..3, idx in any::<usize>()) {
        let mut field = cipher().encrypt(&text, &secret, "salt").unwrap();
        match which {
            0 => field.ciphertext = flip(&field.ciphertext, idx),
            1 => field.iv = flip(&field.iv, idx),
            _ => field.hmac = flip(&field.hmac, idx),
        }
        prop_assert_eq!(cipher().decrypt(&field, &secret), Err(CryptoError::HmacVerification));
    }

    /// A different secret is rejected, never decrypted to other text.
    #[test]
    fn wrong_secret_is_rejected(text in text_strategy(), secret in secret_strategy(), other in secret_strategy()) {
        prop_assume!(secret != other);
        let field = cipher().encrypt(&text, &secret, "salt").unwrap();
        prop_assert_eq!(cipher().decrypt(&field, &other), Err(CryptoError::HmacVerification));
    }

    /// Key derivation is a function of (secret, salt).
    #[test]
    fn key_derivation_is_deterministic(secret in secret_strategy(), salt in salt_strategy()) {
        let a = cipher().derive_key(&secret, &salt).unwrap();
        let b = cipher().derive_key(&secret, &salt).unwrap();
        prop_assert_eq!(a.as_bytes(), b.as_bytes());
    }
}
