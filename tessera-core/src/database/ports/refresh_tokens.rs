use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::tokens::value_objects::RefreshToken;

/// Context attached by adapters when removing over-capacity records fails.
///
/// Callers recover it with `anyhow::Error::downcast_ref` to tell a failed
/// eviction apart from other store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("failed to evict refresh tokens over capacity")]
pub struct EvictionFailed;

/// Result of a capacity-enforcing insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CappedInsert {
    pub record: RefreshToken,
    /// Ids of the oldest records removed to stay within the cap.
    pub evicted: Vec<Uuid>,
}

/// Durable refresh-token records keyed by token id, queryable by user.
///
/// Absence is reported as `Ok(None)` / `false`; `Err` always means the store
/// itself failed and must never be read as "not found".
#[async_trait]
pub trait RefreshTokenRepository: Send + Sync {
    /// Insert a record without any capacity check.
    async fn create(&self, record: &RefreshToken) -> Result<RefreshToken>;

    /// Atomically evict the user's oldest records until fewer than `cap`
    /// remain, then insert `record`. Two concurrent calls for the same user
    /// must never leave more than `cap` records behind.
    async fn create_capped(
        &self,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<CappedInsert>;

    /// Atomically delete `old_id` and insert `record` under the same cap
    /// rules as [`RefreshTokenRepository::create_capped`]. Returns `None` and
    /// changes nothing when `old_id` no longer exists.
    async fn rotate(
        &self,
        old_id: Uuid,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<Option<CappedInsert>>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>>;

    /// All records of a user, oldest first.
    async fn get_by_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>>;

    /// Returns whether a record was removed.
    async fn delete_by_id(&self, id: Uuid) -> Result<bool>;

    /// Returns the number of records removed.
    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64>;

    /// Remove every record whose expiry is at or before `now`.
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;
}
