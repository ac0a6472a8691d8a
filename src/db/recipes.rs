use std::collections::HashSet;

use anyhow::Context;
use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::{
    models::recipe::{Recipe, RecipeRow},
    services::store::RecipeStore,
};

const RECIPE_COLUMNS: &str =
    "id, user_id, name, description, category, meal_type, servings, ingredients, instructions, created_at";

#[async_trait]
impl RecipeStore for PgStore {
    async fn find_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<Recipe>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 AND id = ANY($2)"
        ))
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recipes by id")?;

        // Caller's order, each recipe once even when `ids` repeats it.
        let mut seen = HashSet::new();
        let recipes = ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| rows.iter().find(|r| r.id == *id))
            .cloned()
            .map(Recipe::from)
            .collect();
        Ok(recipes)
    }

    async fn find_all(&self, user_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
        let rows = sqlx::query_as::<_, RecipeRow>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE user_id = $1 ORDER BY created_at"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load recipes")?;
        Ok(rows.into_iter().map(Recipe::from).collect())
    }
}
