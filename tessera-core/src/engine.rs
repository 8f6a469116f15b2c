//! Caller-facing entry point wiring the lifecycle and verification services.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::database::infrastructure::memory::{
    InMemoryRefreshTokenStore, InMemoryRoleStore,
};
use crate::database::ports::{RefreshTokenRepository, RoleRepository};
use crate::domain::tokens::codec::AccessTokenCodec;
use crate::domain::tokens::crypto::FingerprintBinder;
use crate::domain::tokens::services::{
    SettingsError, TokenPair, TokenService, TokenSettings,
    VerificationService,
};
use crate::domain::tokens::value_objects::{
    Identity, RefreshToken, SessionPolicy,
};
use crate::error::TokenError;

#[derive(Debug, Error)]
pub enum EngineBuildError {
    #[error("token engine is missing its {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

/// Handles to the embedded stores behind an in-memory engine.
#[derive(Debug, Clone)]
pub struct InMemoryBackends {
    pub tokens: Arc<InMemoryRefreshTokenStore>,
    pub roles: Arc<InMemoryRoleStore>,
}

/// Token lifecycle and verification behind one cloneable handle.
#[derive(Debug, Clone)]
pub struct TokenEngine {
    tokens: Arc<TokenService>,
    verifier: Arc<VerificationService>,
}

impl TokenEngine {
    pub fn builder() -> TokenEngineBuilder {
        TokenEngineBuilder::default()
    }

    /// Engine over fresh in-memory stores.
    pub fn in_memory(
        binder: FingerprintBinder,
        codec: Arc<dyn AccessTokenCodec>,
        settings: TokenSettings,
    ) -> Result<(Self, InMemoryBackends), EngineBuildError> {
        let backends = InMemoryBackends {
            tokens: Arc::new(InMemoryRefreshTokenStore::new()),
            roles: Arc::new(InMemoryRoleStore::new()),
        };

        let engine = Self::builder()
            .refresh_tokens(backends.tokens.clone())
            .roles(backends.roles.clone())
            .binder(binder)
            .codec(codec)
            .settings(settings)
            .build()?;

        Ok((engine, backends))
    }

    /// Engine over the PostgreSQL adapters sharing `pool`.
    #[cfg(feature = "database")]
    #[cfg_attr(docsrs, doc(cfg(feature = "database")))]
    pub fn postgres(
        pool: sqlx::PgPool,
        binder: FingerprintBinder,
        codec: Arc<dyn AccessTokenCodec>,
        settings: TokenSettings,
    ) -> Result<Self, EngineBuildError> {
        use crate::database::infrastructure::postgres::{
            PostgresRefreshTokenRepository, PostgresRoleRepository,
        };

        Self::builder()
            .refresh_tokens(Arc::new(PostgresRefreshTokenRepository::new(
                pool.clone(),
            )))
            .roles(Arc::new(PostgresRoleRepository::new(pool)))
            .binder(binder)
            .codec(codec)
            .settings(settings)
            .build()
    }

    pub fn token_service(&self) -> &TokenService {
        &self.tokens
    }

    pub fn verification_service(&self) -> &VerificationService {
        &self.verifier
    }

    pub async fn create_tokens(
        &self,
        user_id: Uuid,
        fingerprint: &[u8],
        policy: SessionPolicy,
    ) -> Result<TokenPair, TokenError> {
        self.tokens.create(user_id, fingerprint, policy).await
    }

    pub async fn refresh_tokens(
        &self,
        refresh_id: Uuid,
        fingerprint: &[u8],
    ) -> Result<TokenPair, TokenError> {
        self.tokens.refresh(refresh_id, fingerprint).await
    }

    pub async fn get_token(
        &self,
        refresh_id: Uuid,
    ) -> Result<RefreshToken, TokenError> {
        self.tokens.get(refresh_id).await
    }

    pub async fn revoke_token(
        &self,
        refresh_id: Uuid,
        fingerprint: &[u8],
    ) -> Result<(), TokenError> {
        self.tokens.delete(refresh_id, fingerprint).await
    }

    pub async fn revoke_all(
        &self,
        refresh_id: Uuid,
        fingerprint: &[u8],
    ) -> Result<u64, TokenError> {
        self.tokens.delete_all(refresh_id, fingerprint).await
    }

    pub fn verify_access(
        &self,
        access_token: &str,
        fingerprint: &[u8],
    ) -> Result<Identity, TokenError> {
        self.verifier.verify(access_token, fingerprint)
    }

    pub async fn live_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RefreshToken>, TokenError> {
        self.tokens.live_tokens(user_id).await
    }

    pub async fn purge_expired(&self) -> Result<u64, TokenError> {
        self.tokens.purge_expired().await
    }
}

#[derive(Default)]
pub struct TokenEngineBuilder {
    refresh_tokens: Option<Arc<dyn RefreshTokenRepository>>,
    roles: Option<Arc<dyn RoleRepository>>,
    binder: Option<FingerprintBinder>,
    codec: Option<Arc<dyn AccessTokenCodec>>,
    settings: TokenSettings,
}

impl std::fmt::Debug for TokenEngineBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenEngineBuilder")
            .field("refresh_tokens", &self.refresh_tokens.is_some())
            .field("roles", &self.roles.is_some())
            .field("binder", &self.binder.is_some())
            .field("codec", &self.codec.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

impl TokenEngineBuilder {
    pub fn refresh_tokens(
        mut self,
        repo: Arc<dyn RefreshTokenRepository>,
    ) -> Self {
        self.refresh_tokens = Some(repo);
        self
    }

    pub fn roles(mut self, repo: Arc<dyn RoleRepository>) -> Self {
        self.roles = Some(repo);
        self
    }

    pub fn binder(mut self, binder: FingerprintBinder) -> Self {
        self.binder = Some(binder);
        self
    }

    pub fn codec(mut self, codec: Arc<dyn AccessTokenCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    pub fn settings(mut self, settings: TokenSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<TokenEngine, EngineBuildError> {
        self.settings.validate()?;

        let refresh_tokens = self
            .refresh_tokens
            .ok_or(EngineBuildError::Missing("refresh token repository"))?;
        let roles = self
            .roles
            .ok_or(EngineBuildError::Missing("role repository"))?;
        let binder = Arc::new(
            self.binder
                .ok_or(EngineBuildError::Missing("fingerprint binder"))?,
        );
        let codec = self
            .codec
            .ok_or(EngineBuildError::Missing("access token codec"))?;

        let verifier =
            Arc::new(VerificationService::new(codec.clone(), binder.clone()));
        let tokens = Arc::new(TokenService::new(
            refresh_tokens,
            roles,
            binder,
            codec,
            self.settings,
        ));

        Ok(TokenEngine { tokens, verifier })
    }
}
