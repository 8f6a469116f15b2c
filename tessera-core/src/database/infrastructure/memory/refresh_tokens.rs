use std::collections::{BTreeSet, HashMap};

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::database::ports::refresh_tokens::{
    CappedInsert, RefreshTokenRepository,
};
use crate::domain::tokens::value_objects::RefreshToken;

#[derive(Debug, Default)]
struct Inner {
    records: HashMap<Uuid, RefreshToken>,
    /// Per-user issuance order, oldest first.
    by_user: HashMap<Uuid, BTreeSet<(DateTime<Utc>, Uuid)>>,
}

impl Inner {
    fn insert(&mut self, record: &RefreshToken) -> Result<()> {
        if self.records.contains_key(&record.id) {
            bail!("refresh token {} already exists", record.id);
        }
        self.by_user
            .entry(record.user_id)
            .or_default()
            .insert(record.issuance_key());
        self.records.insert(record.id, record.clone());
        Ok(())
    }

    fn remove(&mut self, id: Uuid) -> Option<RefreshToken> {
        let record = self.records.remove(&id)?;
        if let Some(order) = self.by_user.get_mut(&record.user_id) {
            order.remove(&record.issuance_key());
            if order.is_empty() {
                self.by_user.remove(&record.user_id);
            }
        }
        Some(record)
    }

    /// Drop the user's oldest records until at most `keep` remain.
    fn evict_oldest(&mut self, user_id: Uuid, keep: usize) -> Vec<Uuid> {
        let victims: Vec<Uuid> = match self.by_user.get(&user_id) {
            Some(order) if order.len() > keep => order
                .iter()
                .take(order.len() - keep)
                .map(|(_, id)| *id)
                .collect(),
            _ => Vec::new(),
        };

        for id in &victims {
            self.remove(*id);
        }
        victims
    }

    fn insert_capped(
        &mut self,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<CappedInsert> {
        if self.records.contains_key(&record.id) {
            bail!("refresh token {} already exists", record.id);
        }
        let evicted =
            self.evict_oldest(record.user_id, cap.max(1).saturating_sub(1));
        self.insert(record)?;
        Ok(CappedInsert {
            record: record.clone(),
            evicted,
        })
    }
}

/// Embedded refresh-token store.
///
/// Every operation, including the whole count/evict/insert sequence, runs
/// under a single lock acquisition, so the per-user cap holds under
/// concurrent issuance.
#[derive(Debug, Default)]
pub struct InMemoryRefreshTokenStore {
    inner: Mutex<Inner>,
}

impl InMemoryRefreshTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored record ordered by issuance, for inspection in tests and
    /// diagnostics.
    pub async fn snapshot(&self) -> Vec<RefreshToken> {
        let inner = self.inner.lock().await;
        let mut records: Vec<RefreshToken> =
            inner.records.values().cloned().collect();
        records.sort_by_key(RefreshToken::issuance_key);
        records
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl RefreshTokenRepository for InMemoryRefreshTokenStore {
    async fn create(&self, record: &RefreshToken) -> Result<RefreshToken> {
        let mut inner = self.inner.lock().await;
        inner.insert(record)?;
        Ok(record.clone())
    }

    async fn create_capped(
        &self,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<CappedInsert> {
        let mut inner = self.inner.lock().await;
        inner.insert_capped(record, cap)
    }

    async fn rotate(
        &self,
        old_id: Uuid,
        record: &RefreshToken,
        cap: usize,
    ) -> Result<Option<CappedInsert>> {
        let mut inner = self.inner.lock().await;
        if inner.records.contains_key(&record.id) {
            bail!("refresh token {} already exists", record.id);
        }
        if inner.remove(old_id).is_none() {
            return Ok(None);
        }
        inner.insert_capped(record, cap).map(Some)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<RefreshToken>> {
        Ok(self.inner.lock().await.records.get(&id).cloned())
    }

    async fn get_by_user(&self, user_id: Uuid) -> Result<Vec<RefreshToken>> {
        let inner = self.inner.lock().await;
        let records = inner
            .by_user
            .get(&user_id)
            .map(|order| {
                order
                    .iter()
                    .filter_map(|(_, id)| inner.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(records)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<bool> {
        Ok(self.inner.lock().await.remove(id).is_some())
    }

    async fn delete_by_user(&self, user_id: Uuid) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let ids: Vec<Uuid> = inner
            .by_user
            .get(&user_id)
            .map(|order| order.iter().map(|(_, id)| *id).collect())
            .unwrap_or_default();
        for id in &ids {
            inner.remove(*id);
        }
        Ok(ids.len() as u64)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.inner.lock().await;
        let expired: Vec<Uuid> = inner
            .records
            .values()
            .filter(|record| record.is_expired_at(now))
            .map(|record| record.id)
            .collect();
        for id in &expired {
            inner.remove(*id);
        }
        Ok(expired.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tokens::value_objects::{
        BINDING_LEN, FingerprintBinding, SessionPolicy,
    };
    use chrono::Duration;
    use std::sync::Arc;

    fn record(user_id: Uuid) -> RefreshToken {
        RefreshToken::issue(
            user_id,
            FingerprintBinding::from_bytes([5; BINDING_LEN]),
            SessionPolicy::Persistent,
            Utc::now(),
            Duration::days(1),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn duplicate_capped_insert_evicts_nothing() {
        let store = InMemoryRefreshTokenStore::new();
        let user = Uuid::now_v7();
        let first = record(user);
        let second = record(user);
        store.create_capped(&first, 2).await.unwrap();
        store.create_capped(&second, 2).await.unwrap();
        let before = store.snapshot().await;

        assert!(store.create_capped(&second, 2).await.is_err());
        assert_eq!(store.snapshot().await, before);
    }

    #[tokio::test]
    async fn create_capped_evicts_oldest_first() {
        let store = InMemoryRefreshTokenStore::new();
        let user = Uuid::now_v7();
        let first = record(user);
        let second = record(user);
        let third = record(user);

        store.create_capped(&first, 2).await.unwrap();
        store.create_capped(&second, 2).await.unwrap();
        let outcome = store.create_capped(&third, 2).await.unwrap();

        assert_eq!(outcome.evicted, vec![first.id]);
        let remaining: Vec<Uuid> = store
            .get_by_user(user)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(remaining, vec![second.id, third.id]);
    }

    #[tokio::test]
    async fn cap_is_per_user() {
        let store = InMemoryRefreshTokenStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();

        store.create_capped(&record(alice), 1).await.unwrap();
        let outcome = store.create_capped(&record(bob), 1).await.unwrap();

        assert!(outcome.evicted.is_empty());
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn rotate_requires_old_record() {
        let store = InMemoryRefreshTokenStore::new();
        let user = Uuid::now_v7();
        let old = record(user);
        store.create(&old).await.unwrap();

        let replacement = record(user);
        let rotated = store.rotate(old.id, &replacement, 5).await.unwrap();
        assert!(rotated.is_some());
        assert!(store.get_by_id(old.id).await.unwrap().is_none());
        assert!(store.get_by_id(replacement.id).await.unwrap().is_some());

        let again = store.rotate(old.id, &record(user), 5).await.unwrap();
        assert!(again.is_none());
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn concurrent_capped_inserts_never_exceed_cap() {
        let store = Arc::new(InMemoryRefreshTokenStore::new());
        let user = Uuid::now_v7();

        let mut handles = Vec::new();
        for _ in 0..32 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.create_capped(&record(user), 3).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.get_by_user(user).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn delete_expired_only_removes_expired() {
        let store = InMemoryRefreshTokenStore::new();
        let user = Uuid::now_v7();
        let live = record(user);
        let mut stale = record(user);
        stale.created_at = Utc::now() - Duration::days(3);
        stale.expires_at = Utc::now() - Duration::days(2);

        store.create(&live).await.unwrap();
        store.create(&stale).await.unwrap();

        assert_eq!(store.delete_expired(Utc::now()).await.unwrap(), 1);
        assert!(store.get_by_id(live.id).await.unwrap().is_some());
        assert!(store.get_by_id(stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_user_leaves_other_users() {
        let store = InMemoryRefreshTokenStore::new();
        let alice = Uuid::now_v7();
        let bob = Uuid::now_v7();
        store.create(&record(alice)).await.unwrap();
        store.create(&record(alice)).await.unwrap();
        store.create(&record(bob)).await.unwrap();

        assert_eq!(store.delete_by_user(alice).await.unwrap(), 2);
        assert!(store.get_by_user(alice).await.unwrap().is_empty());
        assert_eq!(store.get_by_user(bob).await.unwrap().len(), 1);
    }
}
