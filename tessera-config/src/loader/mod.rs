pub mod error;

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use jsonwebtoken::Algorithm;
use once_cell::sync::Lazy;

use crate::models::{
    BindingKey, Config, ConfigMetadata, DatabaseConfig, KeysConfig,
    LoggingConfig, TokenConfig,
};
use crate::sources::{EnvConfig, FileConfig};
use crate::validation::{self, ConfigWarnings};
use error::ConfigLoadError;

static DEFAULT_CONFIG_LOCATIONS: Lazy<Vec<PathBuf>> = Lazy::new(|| {
    vec![
        PathBuf::from("tessera.toml"),
        PathBuf::from("config/tessera.toml"),
    ]
});

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    /// Use these values instead of reading the process environment. No
    /// `.env` file is loaded when set.
    pub env: Option<EnvConfig>,
}

/// Resolves configuration from a TOML file, `.env` and the environment.
///
/// Environment values win over the file; the file wins over built-in
/// defaults. Guard rails run last and turn unsafe settings into errors.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn with_env_file<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.env_file = Some(path.into());
        self
    }

    pub fn with_env(mut self, env: EnvConfig) -> Self {
        self.options.env = Some(env);
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let (env_config, env_file_loaded) = match &self.options.env {
            Some(env) => (env.clone(), false),
            None => {
                let loaded = self.load_env_file()?;
                (EnvConfig::gather(), loaded)
            }
        };

        let (file_config, config_path) = self.load_file_config(&env_config)?;

        let (config, warnings) = self.compose_config(
            file_config,
            env_config,
            ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        )?;

        tracing::debug!(
            config_path = ?config.metadata.config_path,
            env_file_loaded = config.metadata.env_file_loaded,
            warnings = warnings.len(),
            "Resolved configuration"
        );

        Ok(ConfigLoad { config, warnings })
    }

    fn load_env_file(&self) -> Result<bool, ConfigLoadError> {
        let result = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path),
            None => dotenvy::dotenv().map(|_| ()),
        };
        match result {
            Ok(()) => Ok(true),
            Err(dotenvy::Error::Io(_)) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn load_file_config(
        &self,
        env_config: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env_config.config_path.clone());

        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(ConfigLoadError::MissingConfig { path });
            }
            Some(path) => path,
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .find(|candidate| candidate.exists())
            {
                Some(found) => found.clone(),
                None => return Ok((None, None)),
            },
        };

        let contents =
            fs::read_to_string(&path).map_err(|source| ConfigLoadError::Io {
                path: path.clone(),
                source,
            })?;
        let file_config: FileConfig =
            toml::from_str(&contents).map_err(|source| {
                ConfigLoadError::Parse {
                    path: path.clone(),
                    source,
                }
            })?;

        Ok((Some(file_config), Some(path)))
    }

    fn compose_config(
        &self,
        file_config: Option<FileConfig>,
        env: EnvConfig,
        metadata: ConfigMetadata,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        let mut warnings = ConfigWarnings::default();

        if metadata.config_path.is_none() {
            warnings.push_with_hint(
                "No tessera.toml detected; using environment variables and defaults",
                "Create tessera.toml or set TESSERA_CONFIG_PATH",
            );
        }

        let FileConfig {
            token: file_token,
            keys: file_keys,
            database: file_database,
            logging: file_logging,
        } = file_config.unwrap_or_default();
        let defaults = TokenConfig::default();

        let algorithm = match env.algorithm.or(file_token.algorithm) {
            Some(raw) => Algorithm::from_str(raw.trim()).map_err(|source| {
                ConfigLoadError::InvalidAlgorithm { value: raw, source }
            })?,
            None => defaults.algorithm,
        };

        let refresh_cap = match env.refresh_cap {
            Some(raw) => raw.trim().parse().map_err(|source| {
                ConfigLoadError::InvalidRefreshCap { value: raw, source }
            })?,
            None => file_token.refresh_cap.unwrap_or(defaults.refresh_cap),
        };

        let token = TokenConfig {
            issuer: env
                .issuer
                .or(file_token.issuer)
                .unwrap_or(defaults.issuer),
            algorithm,
            access_age: resolve_duration(
                "access_age",
                env.access_age.or(file_token.access_age),
                defaults.access_age,
            )?,
            refresh_age: resolve_duration(
                "refresh_age",
                env.refresh_age.or(file_token.refresh_age),
                defaults.refresh_age,
            )?,
            session_refresh_age: resolve_duration(
                "session_refresh_age",
                env.session_refresh_age.or(file_token.session_refresh_age),
                defaults.session_refresh_age,
            )?,
            refresh_cap,
            store_timeout: resolve_duration(
                "store_timeout",
                env.store_timeout.or(file_token.store_timeout),
                defaults.store_timeout,
            )?,
        };

        let key_defaults = KeysConfig::default();
        let binding_key = match (env.binding_key, env.binding_key_file) {
            (Some(inline), _) => Some(BindingKey::new(inline.trim())),
            (None, Some(path)) => read_secret_file(&path)?,
            (None, None) => match (file_keys.binding_key, file_keys.binding_key_file) {
                (Some(inline), _) => Some(BindingKey::new(inline.trim())),
                (None, Some(path)) => read_secret_file(&path)?,
                (None, None) => None,
            },
        };

        let keys = KeysConfig {
            private_key_path: env
                .private_key_path
                .or(file_keys.private_key_path)
                .unwrap_or(key_defaults.private_key_path),
            public_key_path: env
                .public_key_path
                .or(file_keys.public_key_path)
                .unwrap_or(key_defaults.public_key_path),
            binding_key,
        };

        let database = DatabaseConfig {
            url: env
                .database_url
                .or(file_database.url)
                .filter(|url| !url.trim().is_empty()),
        };

        let logging = LoggingConfig {
            filter: env
                .log_filter
                .or(file_logging.filter)
                .unwrap_or_else(|| LoggingConfig::default().filter),
        };

        let config = Config {
            metadata,
            token,
            keys,
            database,
            logging,
        };

        let guard_warnings = validation::apply_guard_rails(&config)?;
        warnings.extend(guard_warnings);

        Ok((config, warnings))
    }
}

fn resolve_duration(
    field: &'static str,
    raw: Option<String>,
    default: Duration,
) -> Result<Duration, ConfigLoadError> {
    match raw {
        Some(value) => humantime::parse_duration(value.trim()).map_err(
            |source| ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            },
        ),
        None => Ok(default),
    }
}

fn read_secret_file(path: &Path) -> Result<Option<BindingKey>, ConfigLoadError> {
    let contents = fs::read_to_string(path).map_err(|source| {
        ConfigLoadError::SecretFileIo {
            path: path.to_path_buf(),
            source,
        }
    })?;
    let trimmed = contents.trim();
    if trimmed.is_empty() {
        Ok(None)
    } else {
        Ok(Some(BindingKey::new(trimmed)))
    }
}
