use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DAYS_PER_WEEK: usize = 7;
pub const MEALS_PER_DAY: usize = 4;

pub const DAY_NAMES: [&str; DAYS_PER_WEEK] = [
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// The four meal categories, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealCategory {
    Breakfast,
    Lunch,
    Dinner,
    Snack,
}

impl MealCategory {
    pub const ALL: [MealCategory; MEALS_PER_DAY] = [
        MealCategory::Breakfast,
        MealCategory::Lunch,
        MealCategory::Dinner,
        MealCategory::Snack,
    ];

    /// Position of the category inside a day's slot list.
    pub fn index(self) -> usize {
        match self {
            MealCategory::Breakfast => 0,
            MealCategory::Lunch => 1,
            MealCategory::Dinner => 2,
            MealCategory::Snack => 3,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            MealCategory::Breakfast => "Breakfast",
            MealCategory::Lunch => "Lunch",
            MealCategory::Dinner => "Dinner",
            MealCategory::Snack => "Snack",
        }
    }
}

impl std::fmt::Display for MealCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MealCategory::Breakfast => "breakfast",
            MealCategory::Lunch => "lunch",
            MealCategory::Dinner => "dinner",
            MealCategory::Snack => "snack",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for MealCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "breakfast" | "desayuno" => Ok(MealCategory::Breakfast),
            "lunch" | "almuerzo" => Ok(MealCategory::Lunch),
            "dinner" | "cena" => Ok(MealCategory::Dinner),
            "snack" | "merienda" => Ok(MealCategory::Snack),
            _ => Err(anyhow::anyhow!("Unknown meal category: {s}")),
        }
    }
}

/// One (day, meal category) cell of the week grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSlot {
    pub category: MealCategory,
    pub recipe_id: Option<Uuid>,
    /// Denormalized recipe name, empty when the slot is free.
    #[serde(default)]
    pub recipe_name: String,
    #[serde(default)]
    pub notes: String,
}

impl MealSlot {
    pub fn empty(category: MealCategory) -> Self {
        Self {
            category,
            recipe_id: None,
            recipe_name: String::new(),
            notes: String::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recipe_id.is_none()
    }

    pub fn set_recipe(&mut self, recipe_id: Uuid, recipe_name: &str) {
        self.recipe_id = Some(recipe_id);
        self.recipe_name = recipe_name.to_string();
    }

    pub fn clear_recipe(&mut self) {
        self.recipe_id = None;
        self.recipe_name.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayPlan {
    pub day_name: String,
    pub date: NaiveDate,
    pub meals: [MealSlot; MEALS_PER_DAY],
}

impl DayPlan {
    pub fn slot(&self, category: MealCategory) -> &MealSlot {
        &self.meals[category.index()]
    }

    pub fn slot_mut(&mut self, category: MealCategory) -> &mut MealSlot {
        &mut self.meals[category.index()]
    }

    pub fn is_full(&self) -> bool {
        self.meals.iter().all(|m| !m.is_empty())
    }
}

/// A user's 7 x 4 planning grid for one calendar week.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeekPlan {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Monday of the planned week.
    pub week_start: NaiveDate,
    /// Sunday of the planned week.
    pub week_end: NaiveDate,
    pub title: String,
    pub description: String,
    pub is_favorite: bool,
    pub is_template: bool,
    pub template_name: String,
    pub tags: Vec<String>,
    pub is_active: bool,
    pub days: [DayPlan; DAYS_PER_WEEK],
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WeekPlan {
    /// Build an empty grid starting on `week_start`; dates follow consecutively.
    pub fn empty(user_id: Uuid, week_start: NaiveDate, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            week_start,
            week_end: week_start + Duration::days(6),
            title: title.into(),
            description: String::new(),
            is_favorite: false,
            is_template: false,
            template_name: String::new(),
            tags: Vec::new(),
            is_active: true,
            days: empty_days(week_start),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn day(&self, day_index: usize) -> Option<&DayPlan> {
        self.days.get(day_index)
    }

    pub fn slot(&self, day_index: usize, category: MealCategory) -> Option<&MealSlot> {
        self.days.get(day_index).map(|d| d.slot(category))
    }

    pub fn slot_mut(&mut self, day_index: usize, category: MealCategory) -> Option<&mut MealSlot> {
        self.days.get_mut(day_index).map(|d| d.slot_mut(category))
    }

    pub fn is_slot_empty(&self, day_index: usize, category: MealCategory) -> bool {
        self.slot(day_index, category).is_some_and(MealSlot::is_empty)
    }

    pub fn filled_slots(&self) -> usize {
        self.days
            .iter()
            .flat_map(|d| d.meals.iter())
            .filter(|m| !m.is_empty())
            .count()
    }

    pub fn day_for_date(&self, date: NaiveDate) -> Option<(usize, &DayPlan)> {
        self.days.iter().enumerate().find(|(_, d)| d.date == date)
    }

    /// First instant of the week (Monday 00:00:00).
    pub fn starts_at(&self) -> NaiveDateTime {
        self.week_start.and_time(NaiveTime::MIN)
    }

    /// Last instant of the week (Sunday 23:59:59).
    pub fn ends_at(&self) -> NaiveDateTime {
        self.week_end
            .and_hms_opt(23, 59, 59)
            .unwrap_or_else(|| self.week_end.and_time(NaiveTime::MIN))
    }

    /// Move the grid to a new week, recomputing every day's date.
    pub fn rebase(&mut self, week_start: NaiveDate) {
        self.week_start = week_start;
        self.week_end = week_start + Duration::days(6);
        for (i, day) in self.days.iter_mut().enumerate() {
            day.date = week_start + Duration::days(i as i64);
        }
    }
}

fn empty_days(week_start: NaiveDate) -> [DayPlan; DAYS_PER_WEEK] {
    std::array::from_fn(|i| DayPlan {
        day_name: DAY_NAMES[i].to_string(),
        date: week_start + Duration::days(i as i64),
        meals: MealCategory::ALL.map(MealSlot::empty),
    })
}

/// Monday of the ISO week containing `date`.
pub fn monday_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Default title for a freshly created week.
pub fn default_title(week_start: NaiveDate) -> String {
    let week_end = week_start + Duration::days(6);
    format!(
        "Weekly menu {} - {}",
        week_start.format("%d/%m/%Y"),
        week_end.format("%d/%m/%Y")
    )
}

/// Lightweight listing row for GET /menus.
#[derive(Debug, Clone, Serialize)]
pub struct WeekPlanSummary {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub is_favorite: bool,
    pub is_template: bool,
    pub template_name: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&WeekPlan> for WeekPlanSummary {
    fn from(p: &WeekPlan) -> Self {
        Self {
            id: p.id,
            title: p.title.clone(),
            description: p.description.clone(),
            week_start: p.week_start,
            week_end: p.week_end,
            is_favorite: p.is_favorite,
            is_template: p.is_template,
            template_name: p.template_name.clone(),
            tags: p.tags.clone(),
            created_at: p.created_at,
        }
    }
}

/// Body for POST /menus.
#[derive(Debug, Deserialize)]
pub struct CreateMenuRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub week_start: Option<NaiveDate>,
    #[serde(default)]
    pub is_template: bool,
    #[serde(default)]
    pub template_name: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body for PUT /menus/{id}.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateMenuRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub is_favorite: Option<bool>,
    pub tags: Option<Vec<String>>,
}

/// Body for POST /menus/{id}/duplicate.
#[derive(Debug, Deserialize)]
pub struct DuplicateMenuRequest {
    pub title: Option<String>,
    pub week_start: NaiveDate,
}

/// Slot coordinates plus an optional recipe, used by the slot editing routes.
#[derive(Debug, Deserialize)]
pub struct SlotRequest {
    pub menu_id: Uuid,
    pub day_index: usize,
    pub meal_index: usize,
    pub recipe_id: Option<Uuid>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MoveSlotRequest {
    pub menu_id: Uuid,
    pub from_day_index: usize,
    pub from_meal_index: usize,
    pub to_day_index: usize,
    pub to_meal_index: usize,
}
