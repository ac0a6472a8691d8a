//! Keyword heuristics deciding which recipes suit which meal.

use crate::models::{recipe::Recipe, week::MealCategory};

/// Explicit meal tag on the recipe.
pub const TAG_SCORE: u8 = 3;
/// Free-text recipe category mentions the meal.
pub const CATEGORY_SCORE: u8 = 2;
/// Recipe name contains a typical dish keyword.
pub const NAME_SCORE: u8 = 1;

struct Keywords {
    categories: &'static [&'static str],
    names: &'static [&'static str],
}

const BREAKFAST: Keywords = Keywords {
    categories: &["breakfast", "desayuno"],
    names: &[
        "breakfast", "desayuno", "pancake", "cereal", "egg", "huevo", "sandwich", "oat", "oatmeal",
        "toast",
    ],
};

// Lunch and dinner share one "main course" table.
const MAIN_COURSE: Keywords = Keywords {
    categories: &["lunch", "dinner", "almuerzo", "cena", "main", "principal"],
    names: &[
        "pasta", "chicken", "pollo", "beef", "carne", "fish", "pescado", "rice", "arroz",
    ],
};

const SNACK: Keywords = Keywords {
    categories: &["snack", "dessert", "merienda", "postre"],
    names: &["cookie", "galleta", "fruit", "fruta", "yogurt", "yogur"],
};

fn keywords(category: MealCategory) -> &'static Keywords {
    match category {
        MealCategory::Breakfast => &BREAKFAST,
        MealCategory::Lunch | MealCategory::Dinner => &MAIN_COURSE,
        MealCategory::Snack => &SNACK,
    }
}

/// How well `recipe` suits `category`; 0 means not at all.
pub fn affinity(recipe: &Recipe, category: MealCategory) -> u8 {
    if recipe.meal_type == Some(category) {
        return TAG_SCORE;
    }

    let table = keywords(category);
    let recipe_category = recipe.category.to_lowercase();
    if table.categories.iter().any(|k| recipe_category.contains(k)) {
        return CATEGORY_SCORE;
    }

    let name = recipe.name.to_lowercase();
    if table.names.iter().any(|k| names_dish(&name, k)) {
        return NAME_SCORE;
    }

    0
}

/// Whole-word match of `keyword` in `name`, singular or plural.
fn names_dish(name: &str, keyword: &str) -> bool {
    name.split(|c: char| !c.is_alphanumeric()).any(|word| {
        word == keyword
            || word.strip_suffix('s') == Some(keyword)
            || word.strip_suffix("es") == Some(keyword)
    })
}

/// Recipes from `pool` with a non-zero affinity for `category`.
pub fn suited<'a>(pool: &'a [Recipe], category: MealCategory) -> Vec<&'a Recipe> {
    pool.iter().filter(|r| affinity(r, category) > 0).collect()
}
