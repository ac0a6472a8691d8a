//! In-memory stores and a recording gateway for service tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::error::DeliveryError;
use crate::models::{
    preferences::{NotificationPreferences, PreferencesUpdate},
    recipe::Recipe,
    user::UserContact,
    week::{MealCategory, WeekPlan},
};
use crate::services::delivery::{DeliveryGateway, MealReminder, WeeklySummary};
use crate::services::store::{GridStore, PreferencesStore, RecipeStore, UserDirectory};

#[derive(Default)]
pub struct MemoryStore {
    pub users: Mutex<Vec<UserContact>>,
    pub recipes: Mutex<Vec<Recipe>>,
    pub grids: Mutex<HashMap<Uuid, WeekPlan>>,
    pub prefs: Mutex<HashMap<Uuid, NotificationPreferences>>,
    /// Users whose preference reads fail.
    pub failing: Mutex<HashSet<Uuid>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self, name: &str) -> UserContact {
        let user = UserContact {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", name.to_lowercase()),
            name: name.to_string(),
            is_active: true,
            created_at: Utc::now(),
        };
        self.users.lock().unwrap().push(user.clone());
        user
    }

    pub fn add_recipe(&self, user_id: Uuid, name: &str, meal_type: Option<MealCategory>) -> Recipe {
        let recipe = Recipe {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            description: format!("{name}, the house way"),
            category: String::new(),
            meal_type,
            servings: 2,
            ingredients: vec!["salt".into()],
            instructions: vec!["Cook".into()],
            created_at: Utc::now(),
        };
        self.recipes.lock().unwrap().push(recipe.clone());
        recipe
    }

    pub fn put_grid(&self, plan: WeekPlan) {
        self.grids.lock().unwrap().insert(plan.id, plan);
    }

    pub fn put_prefs(&self, prefs: NotificationPreferences) {
        self.prefs.lock().unwrap().insert(prefs.user_id, prefs);
    }

    pub fn fail_for(&self, user_id: Uuid) {
        self.failing.lock().unwrap().insert(user_id);
    }

    pub fn grid_count(&self) -> usize {
        self.grids.lock().unwrap().len()
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn find_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> anyhow::Result<Vec<Recipe>> {
        let recipes = self.recipes.lock().unwrap();
        let mut seen = HashSet::new();
        Ok(ids
            .iter()
            .filter(|id| seen.insert(**id))
            .filter_map(|id| recipes.iter().find(|r| r.id == *id && r.user_id == user_id))
            .cloned()
            .collect())
    }

    async fn find_all(&self, user_id: Uuid) -> anyhow::Result<Vec<Recipe>> {
        let recipes = self.recipes.lock().unwrap();
        Ok(recipes.iter().filter(|r| r.user_id == user_id).cloned().collect())
    }
}

#[async_trait]
impl GridStore for MemoryStore {
    async fn find_current_week(
        &self,
        user_id: Uuid,
        monday: NaiveDate,
    ) -> anyhow::Result<Option<WeekPlan>> {
        let sunday = monday + Duration::days(6);
        let grids = self.grids.lock().unwrap();
        Ok(grids
            .values()
            .filter(|p| {
                p.user_id == user_id && p.is_active && p.week_start <= monday && p.week_end >= sunday
            })
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_by_id(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<WeekPlan>> {
        let grids = self.grids.lock().unwrap();
        Ok(grids.get(&id).filter(|p| p.user_id == user_id).cloned())
    }

    async fn list(&self, user_id: Uuid) -> anyhow::Result<Vec<WeekPlan>> {
        let grids = self.grids.lock().unwrap();
        let mut plans: Vec<_> = grids.values().filter(|p| p.user_id == user_id).cloned().collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(plans)
    }

    async fn save(&self, plan: &WeekPlan) -> anyhow::Result<()> {
        self.put_grid(plan.clone());
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        let mut grids = self.grids.lock().unwrap();
        match grids.get(&id) {
            Some(p) if p.user_id == user_id => Ok(grids.remove(&id).is_some()),
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl PreferencesStore for MemoryStore {
    async fn get_or_create(&self, user_id: Uuid) -> anyhow::Result<NotificationPreferences> {
        if self.failing.lock().unwrap().contains(&user_id) {
            anyhow::bail!("preferences unavailable for {user_id}");
        }
        let mut prefs = self.prefs.lock().unwrap();
        Ok(prefs
            .entry(user_id)
            .or_insert_with(|| NotificationPreferences::defaults(user_id))
            .clone())
    }

    async fn update(
        &self,
        user_id: Uuid,
        update: &PreferencesUpdate,
    ) -> anyhow::Result<NotificationPreferences> {
        let mut prefs = self.prefs.lock().unwrap();
        let entry = prefs
            .entry(user_id)
            .or_insert_with(|| NotificationPreferences::defaults(user_id));
        entry.apply(update)?;
        Ok(entry.clone())
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn list_active(&self) -> anyhow::Result<Vec<UserContact>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().filter(|u| u.is_active).cloned().collect())
    }

    async fn find(&self, user_id: Uuid) -> anyhow::Result<Option<UserContact>> {
        let users = self.users.lock().unwrap();
        Ok(users.iter().find(|u| u.id == user_id).cloned())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    MealReminder { address: String, reminder: MealReminder },
    WeeklySummary { address: String, summary: WeeklySummary },
    Test { address: String },
}

/// Gateway that keeps every message instead of sending it.
pub struct RecordingGateway {
    configured: bool,
    pub sent: Mutex<Vec<Sent>>,
    /// Addresses whose sends never complete.
    stalled: Mutex<HashSet<String>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self { configured: true, sent: Mutex::new(Vec::new()), stalled: Mutex::default() }
    }

    pub fn unconfigured() -> Self {
        Self { configured: false, ..Self::new() }
    }

    pub fn stall_for(&self, address: &str) {
        self.stalled.lock().unwrap().insert(address.to_string());
    }

    async fn stall_if_needed(&self, address: &str) {
        let stalled = self.stalled.lock().unwrap().contains(address);
        if stalled {
            std::future::pending::<()>().await;
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    fn push(&self, message: Sent) -> Result<(), DeliveryError> {
        if !self.configured {
            return Err(DeliveryError::NotConfigured);
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}

#[async_trait]
impl DeliveryGateway for RecordingGateway {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn send_meal_reminder(
        &self,
        address: &str,
        reminder: &MealReminder,
    ) -> Result<(), DeliveryError> {
        self.stall_if_needed(address).await;
        self.push(Sent::MealReminder {
            address: address.to_string(),
            reminder: reminder.clone(),
        })
    }

    async fn send_weekly_summary(
        &self,
        address: &str,
        summary: &WeeklySummary,
    ) -> Result<(), DeliveryError> {
        self.stall_if_needed(address).await;
        self.push(Sent::WeeklySummary {
            address: address.to_string(),
            summary: summary.clone(),
        })
    }

    async fn send_test(&self, address: &str, _user_name: &str) -> Result<(), DeliveryError> {
        self.push(Sent::Test { address: address.to_string() })
    }
}
