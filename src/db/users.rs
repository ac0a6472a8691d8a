use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::{models::user::UserContact, services::store::UserDirectory};

#[async_trait]
impl UserDirectory for PgStore {
    async fn list_active(&self) -> anyhow::Result<Vec<UserContact>> {
        sqlx::query_as::<_, UserContact>(
            "SELECT id, email, name, is_active, created_at
             FROM users
             WHERE is_active = TRUE
             ORDER BY created_at",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list active users")
    }

    async fn find(&self, user_id: Uuid) -> anyhow::Result<Option<UserContact>> {
        sqlx::query_as::<_, UserContact>(
            "SELECT id, email, name, is_active, created_at FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load user")
    }
}
