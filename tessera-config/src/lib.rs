//! Configuration for Tessera deployments.
//!
//! Resolves settings from `tessera.toml`, an optional `.env` file and
//! `TESSERA_*` environment variables, applies guard rails, and converts the
//! result into the types `tessera-core` expects.

pub mod loader;
pub mod models;
pub mod sources;
pub mod telemetry;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoader, ConfigLoaderOptions, error::ConfigLoadError,
};
pub use models::{
    BindingKey, Config, ConfigMetadata, DatabaseConfig, KeysConfig,
    LoggingConfig, TokenConfig,
};
pub use sources::{EnvConfig, FileConfig};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
