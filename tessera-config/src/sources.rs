use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as written in `tessera.toml`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub token: FileTokenConfig,
    #[serde(default)]
    pub keys: FileKeysConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub logging: FileLoggingConfig,
}

/// Durations are humantime strings such as `"15m"` or `"30d"`.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileTokenConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_refresh_age: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_cap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_timeout: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileKeysConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binding_key_file: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FileLoggingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub issuer: Option<String>,
    pub algorithm: Option<String>,
    pub access_age: Option<String>,
    pub refresh_age: Option<String>,
    pub session_refresh_age: Option<String>,
    pub refresh_cap: Option<String>,
    pub store_timeout: Option<String>,
    pub private_key_path: Option<PathBuf>,
    pub public_key_path: Option<PathBuf>,
    pub binding_key: Option<String>,
    pub binding_key_file: Option<PathBuf>,
    pub database_url: Option<String>,
    pub log_filter: Option<String>,
}

impl EnvConfig {
    pub fn gather() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(name).filter(|value| !value.trim().is_empty())
        };
        let path = |name: &str| var(name).map(PathBuf::from);

        Self {
            config_path: path("TESSERA_CONFIG_PATH"),
            issuer: var("TESSERA_ISSUER"),
            algorithm: var("TESSERA_ALGORITHM"),
            access_age: var("TESSERA_ACCESS_AGE"),
            refresh_age: var("TESSERA_REFRESH_AGE"),
            session_refresh_age: var("TESSERA_SESSION_REFRESH_AGE"),
            refresh_cap: var("TESSERA_REFRESH_CAP"),
            store_timeout: var("TESSERA_STORE_TIMEOUT"),
            private_key_path: path("TESSERA_PRIVATE_KEY_PATH"),
            public_key_path: path("TESSERA_PUBLIC_KEY_PATH"),
            binding_key: var("TESSERA_BINDING_KEY"),
            binding_key_file: path("TESSERA_BINDING_KEY_FILE"),
            database_url: var("DATABASE_URL"),
            log_filter: var("TESSERA_LOG"),
        }
    }
}
