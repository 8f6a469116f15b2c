use jsonwebtoken::Algorithm;
use tessera_core::domain::tokens::is_supported_algorithm;
use thiserror::Error;

use crate::models::Config;

/// Minimum binding key length in bytes.
pub const MIN_BINDING_KEY_LENGTH: usize = 32;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigGuardRailError {
    #[error("fingerprint binding key is not configured")]
    MissingBindingKey,
    #[error("secret {field} {reason}")]
    WeakSecret { field: &'static str, reason: String },
    #[error("refresh_cap must be at least 1")]
    ZeroRefreshCap,
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
    #[error("{field} is too large")]
    DurationOutOfRange { field: &'static str },
    #[error(
        "algorithm {0:?} is not supported; use EdDSA, RS*/PS* or ES256/ES384"
    )]
    UnsupportedAlgorithm(Algorithm),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ConfigWarning> {
        self.items.iter()
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();
    let token = &config.token;

    if !is_supported_algorithm(token.algorithm) {
        return Err(ConfigGuardRailError::UnsupportedAlgorithm(
            token.algorithm,
        ));
    }

    enforce_binding_key(config)?;

    if token.refresh_cap == 0 {
        return Err(ConfigGuardRailError::ZeroRefreshCap);
    }

    for (field, value) in [
        ("access_age", token.access_age),
        ("refresh_age", token.refresh_age),
        ("session_refresh_age", token.session_refresh_age),
        ("store_timeout", token.store_timeout),
    ] {
        if value.is_zero() {
            return Err(ConfigGuardRailError::ZeroDuration { field });
        }
    }
    // Surface out-of-range durations here rather than at first use.
    config.access_age()?;
    config.token_settings()?;

    if token.refresh_age < token.access_age {
        warnings.push_with_hint(
            "refresh_age is shorter than access_age; clients will be logged out before their access token expires",
            "Raise token.refresh_age or lower token.access_age",
        );
    }

    if token.session_refresh_age > token.refresh_age {
        warnings.push(
            "session_refresh_age exceeds refresh_age; session-scoped logins outlive persistent ones",
        );
    }

    if config.database.url.is_none() {
        warnings.push_with_hint(
            "DATABASE_URL not configured; refresh tokens will only be held in memory",
            "Set DATABASE_URL or database.url to persist refresh tokens",
        );
    }

    Ok(warnings)
}

fn enforce_binding_key(config: &Config) -> Result<(), ConfigGuardRailError> {
    let key = config
        .keys
        .binding_key
        .as_ref()
        .ok_or(ConfigGuardRailError::MissingBindingKey)?;

    if key.len() < MIN_BINDING_KEY_LENGTH {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "TESSERA_BINDING_KEY",
            reason: format!(
                "must be at least {MIN_BINDING_KEY_LENGTH} bytes"
            ),
        });
    }

    let bytes = key.as_bytes();
    if bytes.iter().all(|byte| *byte == bytes[0]) {
        return Err(ConfigGuardRailError::WeakSecret {
            field: "TESSERA_BINDING_KEY",
            reason: "must not repeat a single byte".into(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        BindingKey, ConfigMetadata, DatabaseConfig, KeysConfig, LoggingConfig,
        TokenConfig,
    };
    use std::time::Duration;

    fn config() -> Config {
        Config {
            metadata: ConfigMetadata::default(),
            token: TokenConfig::default(),
            keys: KeysConfig {
                binding_key: Some(BindingKey::new(
                    "f3b1c2d4e5a6978812345678abcdef0fedcba9876543210",
                )),
                ..KeysConfig::default()
            },
            database: DatabaseConfig {
                url: Some("postgres://localhost/tessera".into()),
            },
            logging: LoggingConfig::default(),
        }
    }

    #[test]
    fn sound_config_passes_without_warnings() {
        let warnings = apply_guard_rails(&config()).unwrap();
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn missing_or_weak_binding_key_is_fatal() {
        let mut cfg = config();
        cfg.keys.binding_key = None;
        assert_eq!(
            apply_guard_rails(&cfg).unwrap_err(),
            ConfigGuardRailError::MissingBindingKey
        );

        cfg.keys.binding_key = Some(BindingKey::new("short"));
        assert!(matches!(
            apply_guard_rails(&cfg),
            Err(ConfigGuardRailError::WeakSecret { .. })
        ));

        cfg.keys.binding_key = Some(BindingKey::new(vec![b'a'; 64]));
        assert!(matches!(
            apply_guard_rails(&cfg),
            Err(ConfigGuardRailError::WeakSecret { .. })
        ));
    }

    #[test]
    fn symmetric_algorithms_are_rejected() {
        let mut cfg = config();
        cfg.token.algorithm = Algorithm::HS256;
        assert_eq!(
            apply_guard_rails(&cfg).unwrap_err(),
            ConfigGuardRailError::UnsupportedAlgorithm(Algorithm::HS256)
        );
    }

    #[test]
    fn zero_cap_and_zero_ages_are_rejected() {
        let mut cfg = config();
        cfg.token.refresh_cap = 0;
        assert_eq!(
            apply_guard_rails(&cfg).unwrap_err(),
            ConfigGuardRailError::ZeroRefreshCap
        );

        let mut cfg = config();
        cfg.token.access_age = Duration::ZERO;
        assert_eq!(
            apply_guard_rails(&cfg).unwrap_err(),
            ConfigGuardRailError::ZeroDuration {
                field: "access_age"
            }
        );
    }

    #[test]
    fn ages_past_the_maximum_are_rejected() {
        let mut cfg = config();
        cfg.token.refresh_age = Duration::from_secs(300_000 * 365 * 86_400);
        assert_eq!(
            apply_guard_rails(&cfg).unwrap_err(),
            ConfigGuardRailError::DurationOutOfRange {
                field: "refresh_age"
            }
        );

        let mut cfg = config();
        cfg.token.access_age = Duration::from_secs(101 * 365 * 86_400);
        assert_eq!(
            apply_guard_rails(&cfg).unwrap_err(),
            ConfigGuardRailError::DurationOutOfRange {
                field: "access_age"
            }
        );
    }

    #[test]
    fn questionable_values_only_warn() {
        let mut cfg = config();
        cfg.database.url = None;
        cfg.token.refresh_age = Duration::from_secs(60);

        let warnings = apply_guard_rails(&cfg).unwrap();
        assert_eq!(warnings.len(), 3);
        assert!(
            warnings
                .iter()
                .any(|warning| warning.message.contains("DATABASE_URL"))
        );
    }
}
