use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::week::MealCategory;

/// A saved recipe. Read-only from the planner's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Free-text category (cuisine, course, ...) used by the meal classifier.
    #[serde(default)]
    pub category: String,
    /// Explicit meal tag; `None` means "general".
    pub meal_type: Option<MealCategory>,
    pub servings: i32,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Recipe {
    /// Tag label used in assignment reports.
    pub fn meal_type_label(&self) -> &'static str {
        self.meal_type.map(MealCategory::label).unwrap_or("General")
    }
}

/// DB row: meal_type is TEXT, "general" or NULL for untagged recipes.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: String,
    pub category: String,
    pub meal_type: Option<String>,
    pub servings: i32,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<RecipeRow> for Recipe {
    fn from(r: RecipeRow) -> Self {
        Self {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            description: r.description,
            category: r.category,
            meal_type: r.meal_type.as_deref().and_then(|t| t.parse().ok()),
            servings: r.servings,
            ingredients: r.ingredients,
            instructions: r.instructions,
            created_at: r.created_at,
        }
    }
}
