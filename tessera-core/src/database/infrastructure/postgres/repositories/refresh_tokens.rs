use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};
use uuid::Uuid;

use crate::database::ports::refresh_tokens::{
    CappedInsert, EvictionFailed, RefreshTokenRepository,
};
use crate::domain::tokens::value_objects::{
    FingerprintBinding, RefreshToken, SessionPolicy,
};

const SELECT_COLUMNS: &str = r#"
    id,
    user_id,
    fingerprint_binding,
    persistent,
    created_at,
    expires_at
"#;

/// Refresh-token records in the `refresh_tokens` table.
///
/// Capacity enforcement takes a transaction-scoped advisory lock derived
/// from the user id, so concurrent issuance for one user is serialized while
/// other users proceed in parallel.
#[derive(Clone)]
pub struct PostgresRefreshTokenRepository {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresRefreshTokenRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresRefreshTokenRepository")
            .field("pool_size", &self.pool.size())
            .field("idle_connections", &self.pool.num_idle())
            .finish()
    }
}

impl PostgresRefreshTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn map_row(row: &PgRow) -> Result<RefreshToken> {
        let id: Uuid = row.try_get("id").context("failed to read token id")?;
        let user_id: Uuid =
            row.try_get("user_id").context("failed to read user_id")?;
        let binding: Vec<u8> = row
            .try_get("fingerprint_binding")
            .context("failed to read fingerprint_binding")?;
        let persistent: bool =
            row.try_get("persistent").context("failed to read persistent")?;
        let created_at: DateTime<Utc> =
            row.try_get("created_at").context("failed to read created_at")?;
        let expires_at: DateTime<Utc> =
            row.try_get("expires_at").context("failed to read expires_at")?;

        let binding = FingerprintBinding::from_slice(&binding)
            .map_err(|e| anyhow!("stored binding for token {id} is corrupt: {e}"))?;

        Ok(RefreshToken {
            id,
            user_id,
            binding,
            policy: SessionPolicy::from_persistent(persistent),
            created_at,
            expires_at,
        })
    }

    async fn lock_user(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> Result<()> {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(user_id.to_string())
            .execute(&mut **tx)
            .await
            .context("failed to take per-user refresh token lock")?;
        Ok(())
    }

    async fn insert(
        tx: &mut Transaction<'_, Postgres>,
        record: &RefreshToken,
    ) -> Result<RefreshToken> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO refresh_tokens
                (id, user_id, fingerprint_binding, persistent, created_at, expires_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {SELECT_COLUMNS}
            "#
        ))
        .bind(record.id)
        .bind(record.user_id)
        .bind(record.binding.as_bytes().as_slice())
        .bind(record.policy.is_persistent())
        .bind(record.created_at)
        .bind(record.expires_at)
        .fetch_one(&mut **tx)
        .await
        .context("failed to insert refresh token")?;

        Self::map_row(&row)
    }

    /// Delete the user's oldest records so that at most `keep` remain.
    async fn evict_oldest(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        keep: usize,
    ) -> Result<Vec<Uuid>> {
        let keep = i64::try_from(keep).unwrap_or(i64::MAX);
        let rows = sqlx::query(
            r#"
            DELETE FROM refresh_tokens
            WHERE id IN (
                SELECT id FROM refresh_tokens
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                OFFSET $2
            )
            RETURNING id, created_at
            "#,
        )
        .bind(user_id)
        .bind(keep)
        .fetch_all(&mut **tx)
        .await
        .context(EvictionFailed)?;

        let mut evicted = rows
            .iter()
            .map(|row| -> Result<(DateTime<Utc>, Uuid), sqlx::Error> {
                Ok((
                    row.try_get::<DateTime<Utc>, _>("created_at")?,
                    row.try_get::<Uuid, _>("id")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .context(EvictionFailed)?;
        evicted.sort();

        Ok(evicted.into_iter().map(|(_, id)| id).collect())
    }

    async fn insert_capped(
        tx: &mut Transaction<'_, Postgres>,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<CappedInsert> {
        let evicted = Self::evict_oldest(
            tx,
            record.user_id,
            cap.max(1).saturating_sub(1),
        )
        .await?;
        let record = Self::insert(tx, record).await?;
        Ok(CappedInsert { record, evicted })
    }
}

#[async_trait]
impl RefreshTokenRepository for PostgresRefreshTokenRepository {
    async fn create(&self, record: &RefreshToken) -> Result<RefreshToken> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("failed to start transaction")?;
        let stored = Self::insert(&mut tx, record).await?;
        tx.commit().await.context("failed to commit transaction")?;
        Ok(stored)
    }

    async fn create_capped(
        &self,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<CappedInsert> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("failed to start transaction")?;
        Self::lock_user(&mut tx, record.user_id).await?;
        let outcome = Self::insert_capped(&mut tx, record, cap).await?;
        tx.commit().await.context("failed to commit transaction")?;
        Ok(outcome)
    }

    async fn rotate(
        &self,
        old_id: Uuid,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<Option<CappedInsert>> {
        let mut tx = self
            .pool()
            .begin()
            .await
            .context("failed to start transaction")?;
        Self::lock_user(&mut tx, record.user_id).await?;

        let removed = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(old_id)
            .execute(&mut *tx)
            .await
            .context("failed to delete rotated refresh token")?;

        if removed.rows_affected() == 0 {
            tx.rollback().await.context("failed to rollback transaction")?;
            return Ok(None);
        }

        let outcome = Self::insert_capped(&mut tx, record, cap).await?;
        tx.commit().await.context("failed to commit transaction")?;
        Ok(Some(outcome))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM refresh_tokens WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .context("failed to load refresh token")?;

        row.as_ref().map(Self::map_row).transpose()
    }

    async fn get_by_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {SELECT_COLUMNS} FROM refresh_tokens
            WHERE user_id = $1
            ORDER BY created_at ASC, id ASC
            "#
        ))
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .context("failed to load refresh tokens for user")?;

        rows.iter().map(Self::map_row).collect()
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .context("failed to delete refresh token")?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE user_id = $1")
                .bind(user_id)
                .execute(self.pool())
                .await
                .context("failed to delete refresh tokens for user")?;
        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result =
            sqlx::query("DELETE FROM refresh_tokens WHERE expires_at <= $1")
                .bind(now)
                .execute(self.pool())
                .await
                .context("failed to purge expired refresh tokens")?;
        Ok(result.rows_affected())
    }
}
