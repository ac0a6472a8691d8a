use chrono::{NaiveDate, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::{
    error::PlanError,
    models::week::{
        default_title, monday_of, CreateMenuRequest, DuplicateMenuRequest, MealCategory,
        MealSlot, MoveSlotRequest, SlotRequest, UpdateMenuRequest, WeekPlan, WeekPlanSummary,
        DAYS_PER_WEEK,
    },
    services::{
        assignment::{self, AssignMode, AssignmentReport},
        gap_filler,
        metrics::{AUTO_ASSIGN_COUNTER, GAP_FILLS_COUNTER},
        store::{GridStore, RecipeStore},
    },
};

/// Body for POST /menus/auto-assign.
#[derive(Debug, Deserialize)]
pub struct AutoAssignRequest {
    pub recipe_ids: Vec<Uuid>,
    #[serde(default)]
    pub mode: AssignMode,
}

#[derive(Debug, Serialize)]
pub struct AutoAssignResult {
    pub menu: WeekPlan,
    pub report: AssignmentReport,
    pub summary: String,
    pub distribution: String,
}

#[derive(Debug, Serialize)]
pub struct FillResult {
    pub menu: WeekPlan,
    pub filled: usize,
}

pub struct MenuService;

impl MenuService {
    /// Active grid for the week containing `today`, created empty if missing.
    pub async fn get_or_create_current_week(
        grids: &dyn GridStore,
        user_id: Uuid,
        today: NaiveDate,
    ) -> Result<WeekPlan, PlanError> {
        Self::get_or_create_week(grids, user_id, today).await
    }

    /// Same as `get_or_create_current_week` for the week containing `start`.
    pub async fn get_or_create_week(
        grids: &dyn GridStore,
        user_id: Uuid,
        start: NaiveDate,
    ) -> Result<WeekPlan, PlanError> {
        let monday = monday_of(start);
        if let Some(plan) = grids.find_current_week(user_id, monday).await? {
            return Ok(plan);
        }

        let plan = WeekPlan::empty(user_id, monday, default_title(monday));
        grids.save(&plan).await?;
        info!("Created weekly menu {} for user {} ({})", plan.id, user_id, monday);
        Ok(plan)
    }

    pub async fn get(grids: &dyn GridStore, user_id: Uuid, id: Uuid) -> Result<WeekPlan, PlanError> {
        grids
            .find_by_id(user_id, id)
            .await?
            .ok_or(PlanError::NotFound("menu"))
    }

    pub async fn list(
        grids: &dyn GridStore,
        user_id: Uuid,
    ) -> Result<Vec<WeekPlanSummary>, PlanError> {
        let plans = grids.list(user_id).await?;
        Ok(plans.iter().map(WeekPlanSummary::from).collect())
    }

    /// New named grid. A non-template grid for a week that already has one
    /// becomes that week's current menu.
    pub async fn create(
        grids: &dyn GridStore,
        user_id: Uuid,
        req: CreateMenuRequest,
        today: NaiveDate,
    ) -> Result<WeekPlan, PlanError> {
        let title = req.title.trim();
        if title.is_empty() {
            return Err(PlanError::Invalid("title is required".into()));
        }

        let monday = monday_of(req.week_start.unwrap_or(today));
        let mut plan = WeekPlan::empty(user_id, monday, title);
        plan.description = req.description.trim().to_string();
        plan.is_template = req.is_template;
        // Templates never stand in for a week's menu.
        plan.is_active = !req.is_template;
        plan.template_name = req.template_name;
        plan.tags = req.tags;

        grids.save(&plan).await?;
        Ok(plan)
    }

    pub async fn update_info(
        grids: &dyn GridStore,
        user_id: Uuid,
        id: Uuid,
        req: UpdateMenuRequest,
    ) -> Result<WeekPlan, PlanError> {
        let mut plan = Self::get(grids, user_id, id).await?;

        if let Some(title) = req.title {
            let title = title.trim();
            if title.is_empty() {
                return Err(PlanError::Invalid("title cannot be empty".into()));
            }
            plan.title = title.to_string();
        }
        if let Some(description) = req.description {
            plan.description = description.trim().to_string();
        }
        if let Some(fav) = req.is_favorite {
            plan.is_favorite = fav;
        }
        if let Some(tags) = req.tags {
            plan.tags = tags;
        }

        Self::touch_and_save(grids, plan).await
    }

    /// Copy a grid, slots and notes included, onto the week containing `req.week_start`.
    ///
    /// The copy is an active, non-template grid. If that week already had a menu,
    /// the copy becomes the current one since the newest active grid wins.
    pub async fn duplicate(
        grids: &dyn GridStore,
        user_id: Uuid,
        id: Uuid,
        req: DuplicateMenuRequest,
    ) -> Result<WeekPlan, PlanError> {
        let source = Self::get(grids, user_id, id).await?;

        let mut copy = source.clone();
        let now = Utc::now();
        copy.id = Uuid::new_v4();
        copy.title = match req.title.as_deref().map(str::trim) {
            Some(t) if !t.is_empty() => t.to_string(),
            _ => format!("{} (copy)", source.title),
        };
        copy.is_favorite = false;
        copy.is_template = false;
        copy.is_active = true;
        copy.created_at = now;
        copy.updated_at = now;
        copy.rebase(monday_of(req.week_start));

        grids.save(&copy).await?;
        info!("Duplicated weekly menu {} into {}", source.id, copy.id);
        Ok(copy)
    }

    pub async fn delete(grids: &dyn GridStore, user_id: Uuid, id: Uuid) -> Result<(), PlanError> {
        if grids.delete(user_id, id).await? {
            Ok(())
        } else {
            Err(PlanError::NotFound("menu"))
        }
    }

    // ─── Slot editing ────────────────────────────────────────────────────────

    /// Put a recipe in a slot, or clear the slot when no recipe is given.
    pub async fn assign_slot(
        grids: &dyn GridStore,
        recipes: &dyn RecipeStore,
        user_id: Uuid,
        req: &SlotRequest,
    ) -> Result<WeekPlan, PlanError> {
        let category = slot_category(req.day_index, req.meal_index)?;
        let mut plan = Self::get(grids, user_id, req.menu_id).await?;

        let recipe = match req.recipe_id {
            Some(recipe_id) => Some(
                recipes
                    .find_by_ids(user_id, &[recipe_id])
                    .await?
                    .into_iter()
                    .next()
                    .ok_or(PlanError::NotFound("recipe"))?,
            ),
            None => None,
        };

        let slot = slot_of(&mut plan, req.day_index, category)?;
        match recipe {
            Some(r) => slot.set_recipe(r.id, &r.name),
            None => slot.clear_recipe(),
        }
        if let Some(ref notes) = req.notes {
            slot.notes = notes.trim().to_string();
        }

        Self::touch_and_save(grids, plan).await
    }

    /// Swap the full contents of two slots.
    pub async fn move_slot(
        grids: &dyn GridStore,
        user_id: Uuid,
        req: &MoveSlotRequest,
    ) -> Result<WeekPlan, PlanError> {
        let from = slot_category(req.from_day_index, req.from_meal_index)?;
        let to = slot_category(req.to_day_index, req.to_meal_index)?;
        let mut plan = Self::get(grids, user_id, req.menu_id).await?;

        let source = slot_of(&mut plan, req.from_day_index, from)?.clone();
        let target = slot_of(&mut plan, req.to_day_index, to)?.clone();
        copy_contents(slot_of(&mut plan, req.to_day_index, to)?, &source);
        copy_contents(slot_of(&mut plan, req.from_day_index, from)?, &target);

        Self::touch_and_save(grids, plan).await
    }

    pub async fn update_notes(
        grids: &dyn GridStore,
        user_id: Uuid,
        req: &SlotRequest,
    ) -> Result<WeekPlan, PlanError> {
        let category = slot_category(req.day_index, req.meal_index)?;
        let mut plan = Self::get(grids, user_id, req.menu_id).await?;

        slot_of(&mut plan, req.day_index, category)?.notes =
            req.notes.as_deref().unwrap_or_default().trim().to_string();

        Self::touch_and_save(grids, plan).await
    }

    /// Clear the recipe of a slot, keeping its note.
    pub async fn remove_from_slot(
        grids: &dyn GridStore,
        user_id: Uuid,
        req: &SlotRequest,
    ) -> Result<WeekPlan, PlanError> {
        let category = slot_category(req.day_index, req.meal_index)?;
        let mut plan = Self::get(grids, user_id, req.menu_id).await?;

        slot_of(&mut plan, req.day_index, category)?.clear_recipe();

        Self::touch_and_save(grids, plan).await
    }

    // ─── Automatic planning ──────────────────────────────────────────────────

    /// Place the given recipes into the current week.
    pub async fn auto_assign(
        grids: &dyn GridStore,
        recipes: &dyn RecipeStore,
        user_id: Uuid,
        req: &AutoAssignRequest,
        today: NaiveDate,
    ) -> Result<AutoAssignResult, PlanError> {
        if req.recipe_ids.is_empty() {
            return Err(PlanError::NoCandidates);
        }
        let candidates = recipes.find_by_ids(user_id, &req.recipe_ids).await?;
        if candidates.is_empty() {
            return Err(PlanError::NoCandidates);
        }

        let grid = Self::get_or_create_current_week(grids, user_id, today).await?;
        let result = assignment::assign(&candidates, &grid, req.mode)?;
        let menu = Self::touch_and_save(grids, result.plan).await?;

        AUTO_ASSIGN_COUNTER
            .with_label_values(&[req.mode.as_str()])
            .inc_by(result.report.total_assigned() as f64);
        info!(
            "Auto-assign ({}) for user {}: {}",
            req.mode.as_str(),
            user_id,
            result.report.distribution()
        );

        Ok(AutoAssignResult {
            summary: result.report.summary(),
            distribution: result.report.distribution(),
            report: result.report,
            menu,
        })
    }

    /// Fill every empty slot of the current week from the user's recipes.
    pub async fn fill_missing<R: Rng + Send + ?Sized>(
        grids: &dyn GridStore,
        recipes: &dyn RecipeStore,
        user_id: Uuid,
        today: NaiveDate,
        rng: &mut R,
    ) -> Result<FillResult, PlanError> {
        let grid = grids
            .find_current_week(user_id, monday_of(today))
            .await?
            .ok_or(PlanError::NoActiveWeek)?;
        let pool = recipes.find_all(user_id).await?;

        let (plan, filled) = gap_filler::fill_gaps(&grid, &pool, rng)?;
        let menu = if filled > 0 {
            Self::touch_and_save(grids, plan).await?
        } else {
            plan
        };

        GAP_FILLS_COUNTER.with_label_values(&["api"]).inc_by(filled as f64);
        info!("Filled {} empty slot(s) for user {}", filled, user_id);
        Ok(FillResult { menu, filled })
    }

    async fn touch_and_save(grids: &dyn GridStore, mut plan: WeekPlan) -> Result<WeekPlan, PlanError> {
        plan.updated_at = Utc::now();
        grids.save(&plan).await?;
        Ok(plan)
    }
}

fn slot_category(day_index: usize, meal_index: usize) -> Result<MealCategory, PlanError> {
    match MealCategory::from_index(meal_index) {
        Some(category) if day_index < DAYS_PER_WEEK => Ok(category),
        _ => Err(PlanError::InvalidSlot { day_index, meal_index }),
    }
}

fn slot_of(
    plan: &mut WeekPlan,
    day_index: usize,
    category: MealCategory,
) -> Result<&mut MealSlot, PlanError> {
    plan.slot_mut(day_index, category).ok_or(PlanError::InvalidSlot {
        day_index,
        meal_index: category.index(),
    })
}

fn copy_contents(dst: &mut MealSlot, src: &MealSlot) {
    dst.recipe_id = src.recipe_id;
    dst.recipe_name = src.recipe_name.clone();
    dst.notes = src.notes.clone();
}
