use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use tempfile::TempDir;
use tessera_config::{
    ConfigGuardRailError, ConfigLoadError, ConfigLoader, EnvConfig,
};
use tessera_core::domain::tokens::keys::{
    ed25519_private_pem, ed25519_public_pem,
};

const BINDING_KEY: &str = "0f1e2d3c4b5a69788796a5b4c3d2e1f00123456789abcdef";

fn env(vars: &[(&str, &str)]) -> EnvConfig {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    EnvConfig::from_lookup(|name| vars.get(name).cloned())
}

fn write_config(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("tessera.toml");
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn file_values_are_used_and_env_wins() {
    let dir = TempDir::new().unwrap();
    let path = write_config(
        dir.path(),
        &format!(
            r#"
[token]
issuer = "file-issuer"
access_age = "10m"
refresh_age = "7d"
refresh_cap = 3

[keys]
binding_key = "{BINDING_KEY}"

[database]
url = "postgres://file/tessera"
"#
        ),
    );

    let load = ConfigLoader::new()
        .with_config_path(&path)
        .with_env(env(&[
            ("TESSERA_ISSUER", "env-issuer"),
            ("TESSERA_REFRESH_CAP", "8"),
        ]))
        .load()
        .unwrap();
    let config = load.config;

    assert_eq!(config.token.issuer, "env-issuer");
    assert_eq!(config.token.refresh_cap, 8);
    assert_eq!(config.token.access_age, Duration::from_secs(600));
    assert_eq!(config.token.refresh_age, Duration::from_secs(7 * 86_400));
    assert_eq!(config.token.algorithm, Algorithm::EdDSA);
    assert_eq!(
        config.database.url.as_deref(),
        Some("postgres://file/tessera")
    );
    assert_eq!(config.metadata.config_path.as_deref(), Some(path.as_path()));
    assert!(load.warnings.is_empty(), "{:?}", load.warnings);

    assert_eq!(config.access_age().unwrap(), chrono::Duration::minutes(10));
    let settings = config.token_settings().unwrap();
    assert_eq!(settings.refresh_age, chrono::Duration::days(7));
    assert_eq!(settings.refresh_cap, 8);
}

#[test]
fn ages_beyond_a_century_are_rejected_at_load() {
    let err = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_BINDING_KEY", BINDING_KEY),
            ("TESSERA_REFRESH_AGE", "300000y"),
        ]))
        .load()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::DurationOutOfRange {
            field: "refresh_age"
        })
    ));
}

#[test]
fn missing_explicit_config_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = ConfigLoader::new()
        .with_config_path(dir.path().join("absent.toml"))
        .with_env(env(&[("TESSERA_BINDING_KEY", BINDING_KEY)]))
        .load()
        .unwrap_err();

    assert!(matches!(err, ConfigLoadError::MissingConfig { .. }));
}

#[test]
fn environment_only_config_warns_about_missing_file() {
    let load = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_BINDING_KEY", BINDING_KEY),
            ("DATABASE_URL", "postgres://env/tessera"),
        ]))
        .load()
        .unwrap();

    assert_eq!(load.warnings.len(), 1);
    assert!(load.warnings.items[0].message.contains("tessera.toml"));
}

#[test]
fn malformed_values_are_reported() {
    let err = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_BINDING_KEY", BINDING_KEY),
            ("TESSERA_ACCESS_AGE", "fortnight-ish"),
        ]))
        .load()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::InvalidDuration {
            field: "access_age",
            ..
        }
    ));

    let err = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_BINDING_KEY", BINDING_KEY),
            ("TESSERA_ALGORITHM", "ROT13"),
        ]))
        .load()
        .unwrap_err();
    assert!(matches!(err, ConfigLoadError::InvalidAlgorithm { .. }));
}

#[test]
fn guard_rails_block_weak_setups() {
    let err = ConfigLoader::new()
        .with_env(env(&[("TESSERA_BINDING_KEY", "too-short")]))
        .load()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::WeakSecret { .. })
    ));

    let err = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_BINDING_KEY", BINDING_KEY),
            ("TESSERA_ALGORITHM", "HS256"),
        ]))
        .load()
        .unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::UnsupportedAlgorithm(
            Algorithm::HS256
        ))
    ));

    let err = ConfigLoader::new().with_env(env(&[])).load().unwrap_err();
    assert!(matches!(
        err,
        ConfigLoadError::GuardRail(ConfigGuardRailError::MissingBindingKey)
    ));
}

#[test]
fn key_material_is_loaded_from_files() {
    let dir = TempDir::new().unwrap();
    let seed = [42u8; 32];
    let private = dir.path().join("signing.pem");
    let public = dir.path().join("signing.pub.pem");
    let binding = dir.path().join("binding.key");
    fs::write(&private, ed25519_private_pem(&seed).unwrap().as_bytes())
        .unwrap();
    fs::write(&public, ed25519_public_pem(&seed).unwrap()).unwrap();
    fs::write(&binding, format!("{BINDING_KEY}\n")).unwrap();

    let config = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_PRIVATE_KEY_PATH", private.to_str().unwrap()),
            ("TESSERA_PUBLIC_KEY_PATH", public.to_str().unwrap()),
            ("TESSERA_BINDING_KEY_FILE", binding.to_str().unwrap()),
        ]))
        .load()
        .unwrap()
        .config;

    assert_eq!(
        config.keys.binding_key.as_ref().map(|key| key.as_bytes()),
        Some(BINDING_KEY.as_bytes())
    );
    let keys = config.signing_keys().unwrap();
    assert_eq!(keys.algorithm(), Algorithm::EdDSA);
    config.binder().unwrap();
    config.codec(keys).unwrap();
}

#[test]
fn missing_key_files_fail_at_load_time() {
    let dir = TempDir::new().unwrap();
    let config = ConfigLoader::new()
        .with_env(env(&[
            ("TESSERA_BINDING_KEY", BINDING_KEY),
            (
                "TESSERA_PRIVATE_KEY_PATH",
                dir.path().join("nope.pem").to_str().unwrap(),
            ),
        ]))
        .load()
        .unwrap()
        .config;

    assert!(config.signing_keys().is_err());
}
