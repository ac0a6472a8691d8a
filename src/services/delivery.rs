use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::DeliveryError;
use crate::models::{
    recipe::Recipe,
    user::UserContact,
    week::{MealCategory, WeekPlan},
};

/// Everything needed to render a meal reminder.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealReminder {
    pub user_name: String,
    pub category: MealCategory,
    pub recipe_name: String,
    pub description: String,
    pub ingredients: Vec<String>,
    pub instructions: Vec<String>,
    /// "HH:MM"
    pub meal_time: String,
    pub day_name: String,
}

impl MealReminder {
    pub fn new(
        user: &UserContact,
        category: MealCategory,
        slot_name: &str,
        recipe: &Recipe,
        meal_time: &str,
        day_name: &str,
    ) -> Self {
        let recipe_name = if slot_name.is_empty() { &recipe.name } else { slot_name };
        Self {
            user_name: user.name.clone(),
            category,
            recipe_name: recipe_name.to_string(),
            description: recipe.description.clone(),
            ingredients: recipe.ingredients.clone(),
            instructions: recipe.instructions.clone(),
            meal_time: meal_time.to_string(),
            day_name: day_name.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryMeal {
    pub meal: &'static str,
    pub recipe_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryDay {
    pub day_name: String,
    pub date: NaiveDate,
    pub meals: Vec<SummaryMeal>,
}

/// Full-week digest sent by the weekly summary lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklySummary {
    pub user_name: String,
    pub title: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub days: Vec<SummaryDay>,
}

impl WeeklySummary {
    pub fn new(user: &UserContact, plan: &WeekPlan) -> Self {
        let days = plan
            .days
            .iter()
            .map(|d| SummaryDay {
                day_name: d.day_name.clone(),
                date: d.date,
                meals: d
                    .meals
                    .iter()
                    .map(|m| SummaryMeal {
                        meal: m.category.label(),
                        recipe_name: (!m.is_empty()).then(|| m.recipe_name.clone()),
                    })
                    .collect(),
            })
            .collect();

        Self {
            user_name: user.name.clone(),
            title: plan.title.clone(),
            week_start: plan.week_start,
            week_end: plan.week_end,
            days,
        }
    }

    pub fn planned_meals(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| d.meals.iter())
            .filter(|m| m.recipe_name.is_some())
            .count()
    }
}

/// Outbound message channel for reminders and summaries.
#[async_trait]
pub trait DeliveryGateway: Send + Sync {
    /// False when credentials are missing; sends will fail with `NotConfigured`.
    fn is_configured(&self) -> bool;

    async fn send_meal_reminder(
        &self,
        address: &str,
        reminder: &MealReminder,
    ) -> Result<(), DeliveryError>;

    async fn send_weekly_summary(
        &self,
        address: &str,
        summary: &WeeklySummary,
    ) -> Result<(), DeliveryError>;

    async fn send_test(&self, address: &str, user_name: &str) -> Result<(), DeliveryError>;
}

/// Stand-in used when SMTP is not configured.
pub struct UnconfiguredGateway;

#[async_trait]
impl DeliveryGateway for UnconfiguredGateway {
    fn is_configured(&self) -> bool {
        false
    }

    async fn send_meal_reminder(&self, _: &str, _: &MealReminder) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }

    async fn send_weekly_summary(&self, _: &str, _: &WeeklySummary) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }

    async fn send_test(&self, _: &str, _: &str) -> Result<(), DeliveryError> {
        Err(DeliveryError::NotConfigured)
    }
}
