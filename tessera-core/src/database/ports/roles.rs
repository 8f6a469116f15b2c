use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::tokens::value_objects::RoleTitle;

/// Read-only view of role assignments; role CRUD lives elsewhere.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<RoleTitle>>;
}
