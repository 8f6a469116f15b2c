use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use uuid::Uuid;

use super::{FingerprintBinding, SessionPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("token lifetime runs past the representable time range")]
pub struct LifetimeOverflow;

/// Durable refresh-token record owned by the refresh-token store.
///
/// The record never holds raw fingerprint material, only the binding derived
/// from it. Ids are UUIDv7 so that `(created_at, id)` is a strict issuance
/// order even when two records share a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub binding: FingerprintBinding,
    pub policy: SessionPolicy,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Mint a fresh record expiring `lifetime` after `now`.
    pub fn issue(
        user_id: Uuid,
        binding: FingerprintBinding,
        policy: SessionPolicy,
        now: DateTime<Utc>,
        lifetime: Duration,
    ) -> Result<Self, LifetimeOverflow> {
        let expires_at =
            now.checked_add_signed(lifetime).ok_or(LifetimeOverflow)?;

        Ok(Self {
            id: Uuid::now_v7(),
            user_id,
            binding,
            policy,
            created_at: now,
            expires_at,
        })
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Ordering key used for oldest-first eviction.
    pub fn issuance_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}
