use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::week::MealCategory;

pub const DEFAULT_LEAD_MINUTES: i32 = 30;
pub const MAX_LEAD_MINUTES: i32 = 120;
pub const DEFAULT_TIMEZONE: &str = "America/Guatemala";

/// Per-user notification preferences, one row per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    /// Master switch for every email notification.
    pub email_enabled: bool,
    pub meal_reminders_enabled: bool,
    /// Minutes before the meal time at which the reminder fires.
    pub lead_minutes: i32,
    pub weekly_summary_enabled: bool,
    /// Lowercase English weekday, e.g. "sunday".
    pub weekly_summary_day: String,
    /// "HH:MM", compared verbatim against the current minute.
    pub weekly_summary_time: String,
    pub breakfast_time: String,
    pub lunch_time: String,
    pub dinner_time: String,
    pub snack_time: String,
    pub timezone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreferences {
    pub fn defaults(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            email_enabled: true,
            meal_reminders_enabled: true,
            lead_minutes: DEFAULT_LEAD_MINUTES,
            weekly_summary_enabled: true,
            weekly_summary_day: "sunday".into(),
            weekly_summary_time: "20:00".into(),
            breakfast_time: "08:00".into(),
            lunch_time: "13:00".into(),
            dinner_time: "20:00".into(),
            snack_time: "17:00".into(),
            timezone: DEFAULT_TIMEZONE.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn meal_time_str(&self, category: MealCategory) -> &str {
        match category {
            MealCategory::Breakfast => &self.breakfast_time,
            MealCategory::Lunch => &self.lunch_time,
            MealCategory::Dinner => &self.dinner_time,
            MealCategory::Snack => &self.snack_time,
        }
    }

    fn meal_time_mut(&mut self, category: MealCategory) -> &mut String {
        match category {
            MealCategory::Breakfast => &mut self.breakfast_time,
            MealCategory::Lunch => &mut self.lunch_time,
            MealCategory::Dinner => &mut self.dinner_time,
            MealCategory::Snack => &mut self.snack_time,
        }
    }

    pub fn meal_time(&self, category: MealCategory) -> Option<NaiveTime> {
        parse_clock(self.meal_time_str(category))
    }

    /// Exact instant of `category` on `date`.
    pub fn meal_instant(&self, category: MealCategory, date: NaiveDate) -> Option<NaiveDateTime> {
        self.meal_time(category).map(|t| date.and_time(t))
    }

    /// Meal instant minus the configured lead time.
    pub fn reminder_instant(&self, category: MealCategory, date: NaiveDate) -> Option<NaiveDateTime> {
        self.meal_instant(category, date)
            .map(|at| at - chrono::Duration::minutes(i64::from(self.lead_minutes)))
    }

    pub fn should_send_meal_reminders(&self) -> bool {
        self.email_enabled && self.meal_reminders_enabled
    }

    pub fn should_send_weekly_summary(&self) -> bool {
        self.email_enabled && self.weekly_summary_enabled
    }

    /// Apply a validated partial update.
    pub fn apply(&mut self, update: &PreferencesUpdate) -> anyhow::Result<()> {
        update.validate()?;

        if let Some(v) = update.email_enabled {
            self.email_enabled = v;
        }
        if let Some(v) = update.meal_reminders_enabled {
            self.meal_reminders_enabled = v;
        }
        if let Some(v) = update.lead_minutes {
            self.lead_minutes = v;
        }
        if let Some(v) = update.weekly_summary_enabled {
            self.weekly_summary_enabled = v;
        }
        if let Some(ref v) = update.weekly_summary_day {
            let day: Weekday = v.trim().parse()?;
            self.weekly_summary_day = weekday_name(day).to_string();
        }
        if let Some(ref v) = update.weekly_summary_time {
            self.weekly_summary_time = normalize_clock(v)?;
        }
        if let Some(ref times) = update.meal_times {
            for (category, value) in times.entries() {
                *self.meal_time_mut(category) = normalize_clock(value)?;
            }
        }
        if let Some(ref v) = update.timezone {
            self.timezone = v.trim().to_string();
        }
        self.updated_at = Utc::now();
        Ok(())
    }
}

/// Meal times keyed by category; absent keys are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MealTimesUpdate {
    pub breakfast: Option<String>,
    pub lunch: Option<String>,
    pub dinner: Option<String>,
    pub snack: Option<String>,
}

impl MealTimesUpdate {
    fn entries(&self) -> impl Iterator<Item = (MealCategory, &String)> {
        [
            (MealCategory::Breakfast, self.breakfast.as_ref()),
            (MealCategory::Lunch, self.lunch.as_ref()),
            (MealCategory::Dinner, self.dinner.as_ref()),
            (MealCategory::Snack, self.snack.as_ref()),
        ]
        .into_iter()
        .filter_map(|(c, v)| v.map(|v| (c, v)))
    }
}

/// Body for PUT /notifications/preferences.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub email_enabled: Option<bool>,
    pub meal_reminders_enabled: Option<bool>,
    pub lead_minutes: Option<i32>,
    pub weekly_summary_enabled: Option<bool>,
    pub weekly_summary_day: Option<String>,
    pub weekly_summary_time: Option<String>,
    pub meal_times: Option<MealTimesUpdate>,
    pub timezone: Option<String>,
}

impl PreferencesUpdate {
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(m) = self.lead_minutes {
            anyhow::ensure!(
                (0..=MAX_LEAD_MINUTES).contains(&m),
                "lead_minutes must be between 0 and {MAX_LEAD_MINUTES}"
            );
        }
        if let Some(ref day) = self.weekly_summary_day {
            anyhow::ensure!(
                day.trim().parse::<Weekday>().is_ok(),
                "Invalid weekday: {day}"
            );
        }
        if let Some(ref t) = self.weekly_summary_time {
            normalize_clock(t)?;
        }
        if let Some(ref times) = self.meal_times {
            for (category, value) in times.entries() {
                anyhow::ensure!(
                    parse_clock(value).is_some(),
                    "Invalid time for {category}: {value}"
                );
            }
        }
        if let Some(ref tz) = self.timezone {
            anyhow::ensure!(!tz.trim().is_empty(), "Timezone is required");
        }
        Ok(())
    }
}

/// Parse a "H:MM" / "HH:MM" wall-clock string.
pub fn parse_clock(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Canonical zero-padded "HH:MM" form, so minute matching is a plain string compare.
pub fn normalize_clock(s: &str) -> anyhow::Result<String> {
    parse_clock(s)
        .map(|t| t.format("%H:%M").to_string())
        .ok_or_else(|| anyhow::anyhow!("Invalid time format (expected HH:MM): {s}"))
}

/// Lowercase English weekday name, as stored in `weekly_summary_day`.
pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}
