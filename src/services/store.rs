//! Persistence contracts used by the planner and the notification clock.
//!
//! `db::PgStore` implements all of them against PostgreSQL.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{
    preferences::{NotificationPreferences, PreferencesUpdate},
    recipe::Recipe,
    user::UserContact,
    week::WeekPlan,
};

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Recipes owned by `user_id` among `ids`, in the order of `ids`.
    async fn find_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<Recipe>>;

    async fn find_all(&self, user_id: Uuid) -> anyhow::Result<Vec<Recipe>>;
}

#[async_trait]
pub trait GridStore: Send + Sync {
    /// Active grid covering the whole week starting on `monday`; the most
    /// recently created one when several qualify.
    async fn find_current_week(
        &self,
        user_id: Uuid,
        monday: NaiveDate,
    ) -> anyhow::Result<Option<WeekPlan>>;

    async fn find_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<WeekPlan>>;

    /// All grids of a user, newest first.
    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<WeekPlan>>;

    /// Insert or replace.
    async fn save(&self, plan: &WeekPlan) -> anyhow::Result<()>;

    /// Returns false when nothing was deleted.
    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[async_trait]
pub trait PreferencesStore: Send + Sync {
    /// Stored preferences, created with defaults on first access.
    async fn get_or_create(&self, user_id: Uuid) -> anyhow::Result<NotificationPreferences>;

    async fn update(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<NotificationPreferences>;
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_active(&self) -> anyhow::Result<Vec<UserContact>>;

    async fn find(&self, user_id: Uuid) -> anyhow::Result<Option<UserContact>>;
}
