use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::database::ports::roles::RoleRepository;
use crate::domain::tokens::value_objects::RoleTitle;

#[derive(Debug, Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn roles_for_user(&self, user_id: Uuid) -> Result<Vec<RoleTitle>> {
        let titles: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.title
            FROM user_roles ur
            INNER JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.title
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to load roles for user")?;

        Ok(titles.into_iter().map(RoleTitle::from).collect())
    }
}
