use rand::{seq::SliceRandom, Rng};

use crate::error::PlanError;
use crate::models::{
    recipe::Recipe,
    week::{MealCategory, WeekPlan},
};
use crate::services::classify;

/// Fill every empty slot of a copy of `grid` with a random suitable recipe from
/// `pool`. Returns the new grid and the number of slots filled.
///
/// Candidates for a slot are the pool recipes the classifier considers suited
/// to the slot's meal; when none are, the whole pool is used.
pub fn fill_gaps<R: Rng + ?Sized>(
    grid: &WeekPlan,
    pool: &[Recipe],
    rng: &mut R,
) -> Result<(WeekPlan, usize), PlanError> {
    if pool.is_empty() {
        return Err(PlanError::EmptyRecipePool);
    }

    let all: Vec<&Recipe> = pool.iter().collect();
    let mut plan = grid.clone();
    let mut filled = 0usize;

    for day in plan.days.iter_mut() {
        for category in MealCategory::ALL {
            let slot = day.slot_mut(category);
            if !slot.is_empty() {
                continue;
            }

            let suited = classify::suited(pool, category);
            let candidates = if suited.is_empty() { &all } else { &suited };

            if let Some(recipe) = candidates.choose(rng) {
                slot.set_recipe(recipe.id, &recipe.name);
                filled += 1;
            }
        }
    }

    Ok((plan, filled))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use rand::{rngs::StdRng, SeedableRng};
    use uuid::Uuid;

    fn recipe(name: &str, category: &str) -> Recipe {
        Recipe {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            name: name.into(),
            description: String::new(),
            category: category.into(),
            meal_type: None,
            servings: 2,
            ingredients: vec![],
            instructions: vec![],
            created_at: Utc::now(),
        }
    }

    fn grid() -> WeekPlan {
        let monday = NaiveDate::from_ymd_opt(2026, 10, 12).unwrap();
        WeekPlan::empty(Uuid::new_v4(), monday, "gaps")
    }

    #[test]
    fn empty_pool_is_an_error() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            fill_gaps(&grid(), &[], &mut rng),
            Err(PlanError::EmptyRecipePool)
        ));
    }

    #[test]
    fn fills_all_28_slots_of_an_empty_grid() {
        let pool = vec![recipe("Mystery dish", ""), recipe("Another dish", "")];
        let mut rng = StdRng::seed_from_u64(7);

        let (plan, filled) = fill_gaps(&grid(), &pool, &mut rng).unwrap();

        assert_eq!(filled, 28);
        assert_eq!(plan.filled_slots(), 28);
    }

    #[test]
    fn picks_only_from_suited_recipes_when_available() {
        let pancakes = recipe("Pancakes", "");
        let yogurt = recipe("Greek yogurt", "");
        let chicken = recipe("Roast chicken", "");
        let pool = vec![pancakes.clone(), yogurt.clone(), chicken.clone()];
        let mut rng = StdRng::seed_from_u64(42);

        let (plan, _) = fill_gaps(&grid(), &pool, &mut rng).unwrap();

        for day in &plan.days {
            assert_eq!(day.slot(MealCategory::Breakfast).recipe_id, Some(pancakes.id));
            assert_eq!(day.slot(MealCategory::Lunch).recipe_id, Some(chicken.id));
            assert_eq!(day.slot(MealCategory::Dinner).recipe_id, Some(chicken.id));
            assert_eq!(day.slot(MealCategory::Snack).recipe_id, Some(yogurt.id));
        }
    }

    #[test]
    fn leaves_occupied_slots_alone() {
        let mut plan = grid();
        let kept = Uuid::new_v4();
        plan.slot_mut(2, MealCategory::Dinner).unwrap().set_recipe(kept, "Family lasagna");
        let pool = vec![recipe("Toast", "")];
        let mut rng = StdRng::seed_from_u64(3);

        let (filled_plan, filled) = fill_gaps(&plan, &pool, &mut rng).unwrap();

        assert_eq!(filled, 27);
        assert_eq!(filled_plan.slot(2, MealCategory::Dinner).unwrap().recipe_id, Some(kept));
    }

    #[test]
    fn seeded_rng_is_deterministic() {
        let pool: Vec<_> = (0..10).map(|i| recipe(&format!("Dish {i}"), "")).collect();
        let (a, _) = fill_gaps(&grid(), &pool, &mut StdRng::seed_from_u64(9)).unwrap();
        let (b, _) = fill_gaps(&grid(), &pool, &mut StdRng::seed_from_u64(9)).unwrap();
        let ids = |p: &WeekPlan| -> Vec<_> {
            p.days.iter().flat_map(|d| d.meals.iter().map(|m| m.recipe_id)).collect()
        };
        assert_eq!(ids(&a), ids(&b));
    }
}
