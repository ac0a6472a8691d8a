//! Automatic placement of recipes into a week grid.
//!
//! Placement never overwrites an occupied slot. Every candidate ends up either
//! in the report's `entries` or in its `unassigned` list.

use serde::Serialize;
use uuid::Uuid;

use crate::error::PlanError;
use crate::models::{
    recipe::Recipe,
    week::{MealCategory, WeekPlan, DAYS_PER_WEEK, DAY_NAMES},
};

use MealCategory::{Breakfast, Dinner, Lunch, Snack};

/// Per-weekday meal preference, Monday first. Each row is a permutation of the
/// four categories.
pub const DAILY_MEAL_PRIORITIES: [[MealCategory; 4]; DAYS_PER_WEEK] = [
    [Lunch, Dinner, Breakfast, Snack],
    [Dinner, Lunch, Snack, Breakfast],
    [Lunch, Breakfast, Dinner, Snack],
    [Dinner, Lunch, Breakfast, Snack],
    [Lunch, Dinner, Snack, Breakfast],
    [Dinner, Breakfast, Lunch, Snack],
    [Breakfast, Lunch, Dinner, Snack],
];

/// Fallback order used by the spaced placement.
pub const SPREAD_FALLBACK: [MealCategory; 4] = [Lunch, Dinner, Breakfast, Snack];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignMode {
    /// Up to seven recipes go one per day, Monday first.
    OnePerDay,
    /// Like `OnePerDay` for exactly seven recipes, but fewer recipes are spaced
    /// out across the week.
    #[default]
    Spread,
}

impl AssignMode {
    pub fn as_str(self) -> &'static str {
        match self {
            AssignMode::OnePerDay => "one_per_day",
            AssignMode::Spread => "spread",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignmentEntry {
    pub recipe_id: Uuid,
    pub recipe: String,
    pub day: &'static str,
    pub meal: &'static str,
    /// 1-based, as shown to users.
    pub day_index: usize,
    pub category: MealCategory,
    /// "General" for untagged recipes.
    pub recipe_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnassignedRecipe {
    pub recipe_id: Uuid,
    pub recipe: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AssignmentReport {
    pub entries: Vec<AssignmentEntry>,
    pub unassigned: Vec<UnassignedRecipe>,
}

impl AssignmentReport {
    pub fn total_assigned(&self) -> usize {
        self.entries.len()
    }

    pub fn total_candidates(&self) -> usize {
        self.entries.len() + self.unassigned.len()
    }

    /// One line per placement, in assignment order.
    pub fn summary(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}: {} ({})", e.day, e.recipe, e.meal))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn distribution(&self) -> String {
        format!(
            "{} of {} recipes were placed",
            self.total_assigned(),
            self.total_candidates()
        )
    }
}

#[derive(Debug, Clone)]
pub struct Assignment {
    pub plan: WeekPlan,
    pub report: AssignmentReport,
}

/// Place `candidates` into a copy of `grid`.
pub fn assign(
    candidates: &[Recipe],
    grid: &WeekPlan,
    mode: AssignMode,
) -> Result<Assignment, PlanError> {
    if candidates.is_empty() {
        return Err(PlanError::NoCandidates);
    }

    let mut placer = Placer {
        plan: grid.clone(),
        report: AssignmentReport::default(),
    };

    let n = candidates.len();
    match mode {
        _ if n > DAYS_PER_WEEK => placer.two_pass(candidates),
        AssignMode::Spread if n < DAYS_PER_WEEK => placer.spaced(candidates),
        _ => placer.one_per_day(candidates),
    }

    Ok(Assignment {
        plan: placer.plan,
        report: placer.report,
    })
}

struct Placer {
    plan: WeekPlan,
    report: AssignmentReport,
}

impl Placer {
    /// Check-then-set on a single slot.
    fn try_place(&mut self, recipe: &Recipe, day_index: usize, category: MealCategory) -> bool {
        let Some(slot) = self.plan.slot_mut(day_index, category) else {
            return false;
        };
        if !slot.is_empty() {
            return false;
        }
        slot.set_recipe(recipe.id, &recipe.name);

        self.report.entries.push(AssignmentEntry {
            recipe_id: recipe.id,
            recipe: recipe.name.clone(),
            day: DAY_NAMES[day_index],
            meal: category.label(),
            day_index: day_index + 1,
            category,
            recipe_type: recipe.meal_type_label(),
        });
        true
    }

    /// Try `first`, then `order`, on one day.
    fn place_on_day(
        &mut self,
        recipe: &Recipe,
        day_index: usize,
        first: MealCategory,
        order: &[MealCategory],
    ) -> bool {
        std::iter::once(first)
            .chain(order.iter().copied())
            .any(|category| self.try_place(recipe, day_index, category))
    }

    fn unassigned(&mut self, recipe: &Recipe) {
        self.report.unassigned.push(UnassignedRecipe {
            recipe_id: recipe.id,
            recipe: recipe.name.clone(),
        });
    }

    fn one_per_day(&mut self, candidates: &[Recipe]) {
        for (day_index, recipe) in candidates.iter().enumerate().take(DAYS_PER_WEEK) {
            let priorities = &DAILY_MEAL_PRIORITIES[day_index];
            let first = recipe.meal_type.unwrap_or(priorities[0]);
            if !self.place_on_day(recipe, day_index, first, priorities) {
                self.unassigned(recipe);
            }
        }
    }

    fn spaced(&mut self, candidates: &[Recipe]) {
        let spacing = DAYS_PER_WEEK / candidates.len();
        let mut cursor = 0usize;

        for recipe in candidates {
            let day_index = cursor.min(DAYS_PER_WEEK - 1);
            let first = recipe.meal_type.unwrap_or(Lunch);
            if !self.place_on_day(recipe, day_index, first, &SPREAD_FALLBACK) {
                self.unassigned(recipe);
            }
            cursor += spacing + 1;
        }
    }

    fn two_pass(&mut self, candidates: &[Recipe]) {
        // Pass 1: the i-th recipe tagged with a category goes to day i's slot
        // of that category.
        for category in MealCategory::ALL {
            let group = candidates.iter().filter(|r| r.meal_type == Some(category));
            for (i, recipe) in group.enumerate() {
                if i >= DAYS_PER_WEEK || !self.try_place(recipe, i, category) {
                    self.unassigned(recipe);
                }
            }
        }

        // Pass 2: untagged recipes take the first free slot in scan order.
        for recipe in candidates.iter().filter(|r| r.meal_type.is_none()) {
            let placed = (0..DAYS_PER_WEEK).any(|day_index| {
                MealCategory::ALL
                    .iter()
                    .any(|&category| self.try_place(recipe, day_index, category))
            });
            if !placed {
                self.unassigned(recipe);
            }
        }
    }
}
