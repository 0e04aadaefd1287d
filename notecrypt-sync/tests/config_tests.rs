use notecrypt_crypto::EncryptFailurePolicy;
use notecrypt_sync::SyncConfig;
use serde_json::json;
use std::time::Duration;

#[test]
fn sync_config_defaults() {
    let config = SyncConfig::default();
    assert_eq!(config.on_encrypt_failure, EncryptFailurePolicy::Fail);
    assert_eq!(config.kdf_iterations, 100_000);
    assert_eq!(config.decrypt_concurrency, 8);
    assert_eq!(config.autosave_debounce(), Duration::from_millis(1500));
}

#[test]
fn sync_config_partial_json() {
    let config: SyncConfig = serde_json::from_value(json!({
        "on_encrypt_failure": "degrade",
        "decrypt_concurrency": 2
    }))
    .unwrap();
    assert_eq!(config.on_encrypt_failure, EncryptFailurePolicy::Degrade);
    assert_eq!(config.decrypt_concurrency, 2);
    assert_eq!(config.kdf_iterations, 100_000);
}

#[test]
fn codec_follows_config() {
    let config = SyncConfig {
        kdf_iterations: 1234,
        on_encrypt_failure: EncryptFailurePolicy::Degrade,
        ..SyncConfig::default()
    };
    let codec = config.codec();
    assert_eq!(codec.cipher().params().iterations, 1234);
    assert_eq!(codec.policy(), EncryptFailurePolicy::Degrade);
}
