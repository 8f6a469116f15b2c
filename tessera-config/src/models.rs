use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use tessera_core::domain::tokens::{
    BinderError, FingerprintBinder, JwtAccessTokenCodec, KeyLoadError,
    SigningKeys, TokenSettings, max_token_age,
};
use zeroize::Zeroizing;

use crate::validation::ConfigGuardRailError;

pub const DEFAULT_ISSUER: &str = "tessera";
pub const DEFAULT_LOG_FILTER: &str = "info,sqlx=warn";
pub const DEFAULT_PRIVATE_KEY_PATH: &str = "keys/signing.pem";
pub const DEFAULT_PUBLIC_KEY_PATH: &str = "keys/signing.pub.pem";

/// Fully resolved configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub metadata: ConfigMetadata,
    pub token: TokenConfig,
    pub keys: KeysConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
}

/// Where the configuration came from.
#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenConfig {
    pub issuer: String,
    pub algorithm: Algorithm,
    pub access_age: Duration,
    pub refresh_age: Duration,
    pub session_refresh_age: Duration,
    pub refresh_cap: usize,
    pub store_timeout: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            algorithm: Algorithm::EdDSA,
            access_age: Duration::from_secs(15 * 60),
            refresh_age: Duration::from_secs(30 * 24 * 60 * 60),
            session_refresh_age: Duration::from_secs(12 * 60 * 60),
            refresh_cap: 5,
            store_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Clone, Default)]
pub struct BindingKey(Zeroizing<Vec<u8>>);

impl BindingKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(Zeroizing::new(bytes.into()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BindingKey(<{} bytes>)", self.0.len())
    }
}

#[derive(Debug, Clone)]
pub struct KeysConfig {
    pub private_key_path: PathBuf,
    pub public_key_path: PathBuf,
    pub binding_key: Option<BindingKey>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            private_key_path: PathBuf::from(DEFAULT_PRIVATE_KEY_PATH),
            public_key_path: PathBuf::from(DEFAULT_PUBLIC_KEY_PATH),
            binding_key: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Config {
    /// Lifetimes and limits for the core services.
    pub fn token_settings(&self) -> Result<TokenSettings, ConfigGuardRailError> {
        let token = &self.token;
        Ok(TokenSettings {
            refresh_age: to_chrono("refresh_age", token.refresh_age)?,
            session_refresh_age: to_chrono(
                "session_refresh_age",
                token.session_refresh_age,
            )?,
            refresh_cap: token.refresh_cap,
            store_timeout: token.store_timeout,
        })
    }

    /// Load the signing key pair. Failure is fatal at startup.
    pub fn signing_keys(&self) -> Result<SigningKeys, KeyLoadError> {
        SigningKeys::from_pem_files(
            self.token.algorithm,
            &self.keys.private_key_path,
            &self.keys.public_key_path,
        )
    }

    pub fn binder(&self) -> Result<FingerprintBinder, BinderError> {
        let key = self.keys.binding_key.as_ref().ok_or(BinderError::EmptyKey)?;
        FingerprintBinder::new(key.as_bytes())
    }

    /// Lifetime stamped into access tokens by the codec.
    pub fn access_age(&self) -> Result<chrono::Duration, ConfigGuardRailError> {
        to_chrono("access_age", self.token.access_age)
    }

    pub fn codec(
        &self,
        keys: SigningKeys,
    ) -> Result<JwtAccessTokenCodec, ConfigGuardRailError> {
        Ok(JwtAccessTokenCodec::new(
            keys,
            self.token.issuer.clone(),
            self.access_age()?,
        ))
    }
}

fn to_chrono(
    field: &'static str,
    value: Duration,
) -> Result<chrono::Duration, ConfigGuardRailError> {
    chrono::Duration::from_std(value)
        .ok()
        .filter(|age| *age <= max_token_age())
        .ok_or(ConfigGuardRailError::DurationOutOfRange { field })
}
