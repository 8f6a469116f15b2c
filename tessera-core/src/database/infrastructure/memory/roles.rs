use std::collections::{BTreeSet, HashMap};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::database::ports::roles::RoleRepository;
use crate::domain::tokens::value_objects::RoleTitle;

/// Role assignments held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRoleStore {
    assignments: RwLock<HashMap<Uuid, BTreeSet<RoleTitle>>>,
}

impl InMemoryRoleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn assign(&self, user_id: Uuid, role: impl Into<RoleTitle>) {
        self.assignments
            .write()
            .await
            .entry(user_id)
            .or_default()
            .insert(role.into());
    }

    pub async fn revoke(&self, user_id: Uuid, role: &str) -> bool {
        let mut assignments = self.assignments.write().await;
        let Some(roles) = assignments.get_mut(&user_id) else {
            return false;
        };
        let removed = roles.remove(role);
        if roles.is_empty() {
            assignments.remove(&user_id);
        }
        removed
    }
}

#[async_trait]
impl RoleRepository for InMemoryRoleStore {
    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<RoleTitle>> {
        Ok(self
            .assignments
            .read()
            .await
            .get(&user_id)
            .map(|roles| roles.iter().cloned().collect())
            .unwrap_or_default())
    }
}
