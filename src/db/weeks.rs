use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use super::PgStore;
use crate::{
    models::week::{DayPlan, WeekPlan},
    services::store::GridStore,
};

const WEEK_COLUMNS: &str = "id, user_id, week_start, week_end, title, description, is_favorite, \
    is_template, template_name, tags, is_active, days, created_at, updated_at";

#[derive(Debug, FromRow)]
struct WeekRow {
    id: Uuid,
    user_id: Uuid,
    week_start: NaiveDate,
    week_end: NaiveDate,
    title: String,
    description: String,
    is_favorite: bool,
    is_template: bool,
    template_name: String,
    tags: Vec<String>,
    is_active: bool,
    days: Json<Vec<DayPlan>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WeekRow> for WeekPlan {
    type Error = anyhow::Error;

    fn try_from(r: WeekRow) -> anyhow::Result<Self> {
        let found = r.days.0.len();
        let days = r
            .days
            .0
            .try_into()
            .map_err(|_| anyhow::anyhow!("Weekly menu {} has {found} days, expected 7", r.id))?;

        Ok(Self {
            id: r.id,
            user_id: r.user_id,
            week_start: r.week_start,
            week_end: r.week_end,
            title: r.title,
            description: r.description,
            is_favorite: r.is_favorite,
            is_template: r.is_template,
            template_name: r.template_name,
            tags: r.tags,
            is_active: r.is_active,
            days,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

fn into_plans(rows: Vec<WeekRow>) -> anyhow::Result<Vec<WeekPlan>> {
    rows.into_iter().map(WeekPlan::try_from).collect()
}

#[async_trait]
impl GridStore for PgStore {
    async fn find_current_week(
        &self,
        user_id: Uuid,
        monday: NaiveDate,
    ) -> anyhow::Result<Option<WeekPlan>> {
        let sunday = monday + Duration::days(6);
        let row = sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM weekly_menus
             WHERE user_id = $1 AND is_active = TRUE AND week_start <= $2 AND week_end >= $3
             ORDER BY created_at DESC
             LIMIT 1"
        ))
        .bind(user_id)
        .bind(monday)
        .bind(sunday)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load current weekly menu")?;

        row.map(WeekPlan::try_from).transpose()
    }

    async fn find_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<WeekPlan>> {
        let row = sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM weekly_menus WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to load weekly menu")?;

        row.map(WeekPlan::try_from).transpose()
    }

    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<WeekPlan>> {
        let rows = sqlx::query_as::<_, WeekRow>(&format!(
            "SELECT {WEEK_COLUMNS} FROM weekly_menus WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list weekly menus")?;

        into_plans(rows)
    }

    async fn save(&self, plan: &WeekPlan) -> anyhow::Result<()> {
        sqlx::query(
            "INSERT INTO weekly_menus
                 (id, user_id, week_start, week_end, title, description, is_favorite,
                  is_template, template_name, tags, is_active, days, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
             ON CONFLICT (id) DO UPDATE SET
                 week_start = EXCLUDED.week_start,
                 week_end = EXCLUDED.week_end,
                 title = EXCLUDED.title,
                 description = EXCLUDED.description,
                 is_favorite = EXCLUDED.is_favorite,
                 is_template = EXCLUDED.is_template,
                 template_name = EXCLUDED.template_name,
                 tags = EXCLUDED.tags,
                 is_active = EXCLUDED.is_active,
                 days = EXCLUDED.days,
                 updated_at = EXCLUDED.updated_at
             WHERE weekly_menus.user_id = EXCLUDED.user_id",
        )
        .bind(plan.id)
        .bind(plan.user_id)
        .bind(plan.week_start)
        .bind(plan.week_end)
        .bind(&plan.title)
        .bind(&plan.description)
        .bind(plan.is_favorite)
        .bind(plan.is_template)
        .bind(&plan.template_name)
        .bind(&plan.tags)
        .bind(plan.is_active)
        .bind(Json(&plan.days))
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to save weekly menu")?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM weekly_menus WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete weekly menu")?;
        Ok(result.rows_affected() > 0)
    }
}
