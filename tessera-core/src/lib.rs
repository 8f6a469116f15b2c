//! # Tessera Core
//!
//! Issues, rotates, revokes and verifies session tokens that are bound to the
//! client fingerprint they were issued for.
//!
//! ## Overview
//!
//! - **Fingerprint binding**: keyed hash of `(user id, raw fingerprint)`,
//!   embedded in every access token and stored with every refresh token
//! - **Access tokens**: short-lived asymmetric JWTs verified without a store
//!   round-trip
//! - **Refresh tokens**: durable records rotated on every use, capped per
//!   user with oldest-first eviction
//! - **Storage**: trait-based repositories with in-memory and PostgreSQL
//!   adapters
//!
//! ## Feature Flags
//!
//! - `database`: PostgreSQL adapters and embedded migrations (default)
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use chrono::Duration;
//! use tessera_core::domain::tokens::{
//!     FingerprintBinder, JwtAccessTokenCodec, SigningKeys, TokenSettings,
//! };
//! use tessera_core::domain::tokens::value_objects::SessionPolicy;
//! use tessera_core::engine::TokenEngine;
//!
//! async fn login(
//!     keys: SigningKeys,
//!     user_id: uuid::Uuid,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = TokenSettings::default();
//!     let codec = JwtAccessTokenCodec::new(keys, "tessera", Duration::minutes(15));
//!     let (engine, _stores) = TokenEngine::in_memory(
//!         FingerprintBinder::new(b"server-side binding key")?,
//!         Arc::new(codec),
//!         settings,
//!     )?;
//!
//!     let pair = engine
//!         .create_tokens(user_id, b"client fingerprint", SessionPolicy::Persistent)
//!         .await?;
//!     let identity = engine.verify_access(pair.access.token.as_str(), b"client fingerprint")?;
//!     assert_eq!(identity.user_id, user_id);
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

/// Storage ports and adapters
pub mod database;

/// Token domain: binder, codec, keys and services
pub mod domain;

pub mod engine;

/// Error types shared by every operation
pub mod error;

#[cfg(feature = "database")]
#[cfg_attr(docsrs, doc(cfg(feature = "database")))]
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub use engine::{EngineBuildError, InMemoryBackends, TokenEngine};
pub use error::{Rejection, RejectionKind, TokenError};

#[cfg(all(test, feature = "database"))]
mod tests {
    use crate::database::{PostgresRefreshTokenRepository, PostgresRoleRepository};

    #[test]
    fn database_feature_exports_postgres_surface() {
        assert!(
            super::MIGRATOR
                .iter()
                .any(|migration| migration.description.contains("refresh tokens"))
        );
        let _: fn(sqlx::PgPool) -> PostgresRefreshTokenRepository =
            PostgresRefreshTokenRepository::new;
        let _: fn(sqlx::PgPool) -> PostgresRoleRepository =
            PostgresRoleRepository::new;
    }
}
