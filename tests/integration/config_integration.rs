//! Integration tests for the configuration system

use super::test_utils::ENV_MUTEX;
use safeguard::config::{ConfigLoader, SafeguardConfig, ValidationError};
use safeguard::store::StoreTarget;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_environment_overrides_file() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[store]
address = "10.0.0.5:3307"
password = "from-file"

[restore]
interval_secs = 30
"#,
    )
    .unwrap();

    std::env::set_var("SAFEGUARD__STORE__PASSWORD", "from-env");
    std::env::set_var("SAFEGUARD__RESTORE__INTERVAL_SECS", "9");
    std::env::set_var("SAFEGUARD__PRUNE__ENABLED", "false");
    let loaded = ConfigLoader::load(&path);
    std::env::remove_var("SAFEGUARD__STORE__PASSWORD");
    std::env::remove_var("SAFEGUARD__RESTORE__INTERVAL_SECS");
    std::env::remove_var("SAFEGUARD__PRUNE__ENABLED");

    let config = loaded.unwrap();
    assert_eq!(config.store.password, "from-env");
    assert_eq!(config.store.address, "10.0.0.5:3307");
    assert_eq!(config.restore.interval(), Duration::from_secs(9));
    assert!(!config.prune.enabled);
    assert_eq!(
        config.store.target(),
        StoreTarget::MySql {
            address: "10.0.0.5:3307".into(),
            username: "root".into(),
            password: "from-env".into(),
            database: "faka".into(),
        }
    );
}

#[test]
fn test_environment_strings_kept_verbatim() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    std::env::set_var("SAFEGUARD__STORE__PASSWORD", "007");
    std::env::set_var("SAFEGUARD__STORE__USERNAME", "true");
    std::env::set_var("SAFEGUARD__MIRROR__INTERVAL_SECS", "12");
    let loaded = ConfigLoader::load(&path);
    std::env::remove_var("SAFEGUARD__STORE__PASSWORD");
    std::env::remove_var("SAFEGUARD__STORE__USERNAME");
    std::env::remove_var("SAFEGUARD__MIRROR__INTERVAL_SECS");

    let config = loaded.unwrap();
    assert_eq!(config.store.password, "007");
    assert_eq!(config.store.username, "true");
    assert_eq!(config.mirror.interval(), Duration::from_secs(12));
}

#[test]
fn test_missing_file_loads_defaults() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::load(&dir.path().join("absent.toml")).unwrap();
    assert_eq!(config, SafeguardConfig::default());
}

#[test]
fn test_generated_default_file_is_valid_and_documented() {
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let (config, created) = ConfigLoader::load_or_init(&path).unwrap();

    assert!(created);
    assert!(config.validate().is_ok());
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("[store]"));
    assert!(text.contains("acg_manage_cleanup.log"));
    assert!(text.contains("file_override.log"));
    assert!(text.contains("[[mirror.pairs]]"));
}

#[test]
fn test_malformed_file_is_load_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[prune\nenabled = yes").unwrap();
    assert!(ConfigLoader::load_from_file(&path).is_err());
}

#[test]
fn test_half_configured_pair_is_not_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
[[mirror.pairs]]
name = "plugin"
source = "/srv/backup/plugin"
"#,
    )
    .unwrap();

    let config = ConfigLoader::load_from_file(&path).unwrap();

    assert!(config.validate().is_ok());
    assert_eq!(config.mirror.ready_pairs().count(), 0);
}

#[test]
fn test_bad_store_url_rejected() {
    let mut config = SafeguardConfig::default();
    config.store.url = Some("postgres://u:secret@db/faka".into());

    let errors = config.validate().unwrap_err();

    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ValidationError::Store(msg) => assert!(!msg.contains("secret")),
        other => panic!("unexpected error: {other}"),
    }
}
