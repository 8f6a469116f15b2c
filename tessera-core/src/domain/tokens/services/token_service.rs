use std::fmt;
use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::TokenSettings;
use crate::database::ports::{
    CappedInsert, EvictionFailed, RefreshTokenRepository, RoleRepository,
};
use crate::domain::tokens::codec::{
    AccessGrant, AccessTokenCodec, CodecError, IssuedAccessToken,
};
use crate::domain::tokens::crypto::FingerprintBinder;
use crate::domain::tokens::value_objects::{
    FingerprintBinding, RefreshToken, SessionPolicy,
};
use crate::error::TokenError;

/// Access token plus the refresh record minted alongside it.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: IssuedAccessToken,
    pub refresh: RefreshToken,
}

/// Issues, rotates, looks up and revokes refresh tokens.
///
/// Every refresh token is bound to the fingerprint it was issued for; refresh
/// and revocation recompute the binding from the presented fingerprint and
/// fail closed on mismatch without touching the store. Expired records are
/// removed lazily when they are read.
pub struct TokenService {
    tokens: Arc<dyn RefreshTokenRepository>,
    roles: Arc<dyn RoleRepository>,
    binder: Arc<FingerprintBinder>,
    codec: Arc<dyn AccessTokenCodec>,
    settings: TokenSettings,
}

impl fmt::Debug for TokenService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenService")
            .field("token_repo_refs", &Arc::strong_count(&self.tokens))
            .field("role_repo_refs", &Arc::strong_count(&self.roles))
            .field("settings", &self.settings)
            .finish()
    }
}

impl TokenService {
    pub fn new(
        tokens: Arc<dyn RefreshTokenRepository>,
        roles: Arc<dyn RoleRepository>,
        binder: Arc<FingerprintBinder>,
        codec: Arc<dyn AccessTokenCodec>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            tokens,
            roles,
            binder,
            codec,
            settings,
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Issue a fresh pair for `user_id`, evicting the user's oldest refresh
    /// tokens if the new one would exceed the cap.
    pub async fn create(
        &self,
        user_id: Uuid,
        fingerprint: &[u8],
        policy: SessionPolicy,
    ) -> Result<TokenPair, TokenError> {
        let binding = self.binder.bind(user_id, fingerprint);
        let now = Utc::now();
        let (access, record) =
            self.mint(user_id, binding, policy, now).await?;

        let CappedInsert { record, evicted } = self
            .guarded(
                "create_capped",
                self.tokens.create_capped(&record, self.settings.refresh_cap),
            )
            .await
            .map_err(capacity_error)?;

        if !evicted.is_empty() {
            info!(
                user_id = %user_id,
                evicted = evicted.len(),
                evicted_ids = ?evicted,
                "Evicted oldest refresh tokens over capacity"
            );
        }
        info!(
            user_id = %user_id,
            token_id = %record.id,
            policy = policy.as_str(),
            "Issued refresh token"
        );

        Ok(TokenPair {
            access,
            refresh: record,
        })
    }

    /// Consume refresh token `id` and mint a replacement pair with the same
    /// user, fingerprint binding and session policy.
    pub async fn refresh(
        &self,
        id: Uuid,
        fingerprint: &[u8],
    ) -> Result<TokenPair, TokenError> {
        let current = self.load_live(id).await?;
        self.check_binding(&current, fingerprint)?;

        let now = Utc::now();
        let (access, replacement) = self
            .mint(current.user_id, current.binding, current.policy, now)
            .await?;

        let rotated = self
            .guarded(
                "rotate",
                self.tokens.rotate(
                    current.id,
                    &replacement,
                    self.settings.refresh_cap,
                ),
            )
            .await
            .map_err(capacity_error)?;

        // A concurrent refresh or revocation consumed the record first.
        let Some(CappedInsert { record, evicted }) = rotated else {
            debug!(token_id = %id, "Refresh token vanished during rotation");
            return Err(TokenError::TokenNotFound);
        };

        info!(
            user_id = %record.user_id,
            token_id = %record.id,
            rotated_from = %id,
            evicted = evicted.len(),
            "Rotated refresh token"
        );

        Ok(TokenPair {
            access,
            refresh: record,
        })
    }

    /// Return the record if it exists and has not expired.
    pub async fn get(&self, id: Uuid) -> Result<RefreshToken, TokenError> {
        self.load_live(id).await
    }

    /// Revoke a single refresh token after proving ownership.
    pub async fn delete(
        &self,
        id: Uuid,
        fingerprint: &[u8],
    ) -> Result<(), TokenError> {
        let current = self.load_live(id).await?;
        self.check_binding(&current, fingerprint)?;

        let removed = self
            .guarded("delete_by_id", self.tokens.delete_by_id(id))
            .await?;
        if !removed {
            return Err(TokenError::TokenNotFound);
        }

        info!(user_id = %current.user_id, token_id = %id, "Revoked refresh token");
        Ok(())
    }

    /// Revoke every refresh token of the user owning `id` after proving
    /// ownership of `id`. Returns the number of records removed.
    pub async fn delete_all(
        &self,
        id: Uuid,
        fingerprint: &[u8],
    ) -> Result<u64, TokenError> {
        let current = self.load_live(id).await?;
        self.check_binding(&current, fingerprint)?;

        let removed = self
            .guarded(
                "delete_by_user",
                self.tokens.delete_by_user(current.user_id),
            )
            .await?;

        info!(
            user_id = %current.user_id,
            token_id = %id,
            revoked = removed,
            "Revoked all refresh tokens for user"
        );
        Ok(removed)
    }

    /// A user's non-expired refresh tokens, oldest first.
    pub async fn live_tokens(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<RefreshToken>, TokenError> {
        let now = Utc::now();
        let records = self
            .guarded("get_by_user", self.tokens.get_by_user(user_id))
            .await?;
        Ok(records
            .into_iter()
            .filter(|record| !record.is_expired_at(now))
            .collect())
    }

    /// Reclaim space held by expired records.
    pub async fn purge_expired(&self) -> Result<u64, TokenError> {
        let purged = self
            .guarded("delete_expired", self.tokens.delete_expired(Utc::now()))
            .await?;
        if purged > 0 {
            info!(purged, "Purged expired refresh tokens");
        }
        Ok(purged)
    }

    /// Sign the access token and build the refresh record. Nothing is
    /// persisted here.
    async fn mint(
        &self,
        user_id: Uuid,
        binding: FingerprintBinding,
        policy: SessionPolicy,
        now: DateTime<Utc>,
    ) -> Result<(IssuedAccessToken, RefreshToken), TokenError> {
        let roles = self
            .guarded("roles_for_user", self.roles.roles_for_user(user_id))
            .await?;

        let grant = AccessGrant {
            subject: user_id,
            roles: roles.into_iter().collect(),
            binding,
        };
        let access =
            self.codec.build_at(&grant, now).map_err(|err| match err {
                CodecError::LifetimeOverflow => TokenError::LifetimeOverflow,
                other => TokenError::Signing(other),
            })?;

        let record = RefreshToken::issue(
            user_id,
            binding,
            policy,
            now,
            self.settings.refresh_lifetime(policy),
        )
        .map_err(|_| TokenError::LifetimeOverflow)?;

        Ok((access, record))
    }

    /// Load a record, deleting it on the spot if it has expired.
    async fn load_live(&self, id: Uuid) -> Result<RefreshToken, TokenError> {
        let record = self
            .guarded("get_by_id", self.tokens.get_by_id(id))
            .await?
            .ok_or(TokenError::TokenNotFound)?;

        if record.is_expired() {
            match self
                .guarded("delete_by_id", self.tokens.delete_by_id(id))
                .await
            {
                Ok(_) => {
                    debug!(user_id = %record.user_id, token_id = %id, "Dropped expired refresh token");
                }
                Err(err) => {
                    warn!(token_id = %id, error = %err, "Failed to drop expired refresh token");
                }
            }
            return Err(TokenError::TokenExpired);
        }

        Ok(record)
    }

    fn check_binding(
        &self,
        record: &RefreshToken,
        fingerprint: &[u8],
    ) -> Result<(), TokenError> {
        self.binder
            .verify_raw(record.user_id, fingerprint, &record.binding)
            .map_err(|_| {
                warn!(
                    user_id = %record.user_id,
                    token_id = %record.id,
                    "Refresh token presented with mismatched fingerprint"
                );
                TokenError::FingerprintMismatch
            })
    }

    /// Run a store call under the configured timeout. Elapsed timers and
    /// adapter errors both surface as [`TokenError::StoreUnavailable`].
    async fn guarded<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T, TokenError> {
        match tokio::time::timeout(self.settings.store_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                warn!(operation, error = %err, "Refresh token store call failed");
                Err(TokenError::StoreUnavailable(err))
            }
            Err(_) => {
                warn!(
                    operation,
                    timeout_ms = self.settings.store_timeout.as_millis() as u64,
                    "Refresh token store call timed out"
                );
                Err(TokenError::StoreUnavailable(anyhow::anyhow!(
                    "{operation} timed out after {:?}",
                    self.settings.store_timeout
                )))
            }
        }
    }
}

/// Promote store failures raised while evicting into `CapacityExceeded`.
fn capacity_error(err: TokenError) -> TokenError {
    match err {
        TokenError::StoreUnavailable(source)
            if source.downcast_ref::<EvictionFailed>().is_some() =>
        {
            TokenError::CapacityExceeded(source)
        }
        other => other,
    }
}
