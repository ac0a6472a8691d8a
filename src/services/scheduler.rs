//! Notification clock: meal reminders, weekly summaries and the daily ledger sweep.
//!
//! Each lane is a tokio task. Stopping flips a watch channel; a tick already
//! running is allowed to finish, and `shutdown` waits for it.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Datelike, Duration, Local, NaiveDateTime, NaiveTime, Timelike};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{DeliveryError, PlanError};
use crate::models::{
    preferences::{weekday_name, NotificationPreferences},
    user::UserContact,
    week::{monday_of, MealCategory, WeekPlan},
};
use crate::services::{
    dedup::{DedupKey, DedupLedger},
    delivery::{DeliveryGateway, MealReminder, WeeklySummary},
    metrics,
    store::{GridStore, PreferencesStore, RecipeStore, UserDirectory},
};

const TOTAL_JOBS: usize = 3;

#[derive(Debug, Clone)]
pub struct ClockSettings {
    /// Tolerance around a reminder or meal instant.
    pub window: Duration,
    /// Upper bound for one user's work inside a tick.
    pub timeout: std::time::Duration,
    /// Local time at which the dedup ledger is cleared.
    pub cleanup_time: NaiveTime,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            window: Duration::minutes(5),
            timeout: std::time::Duration::from_secs(20),
            cleanup_time: NaiveTime::MIN,
        }
    }
}

impl ClockSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            window: Duration::minutes(config.notify_window_minutes),
            timeout: std::time::Duration::from_secs(config.notify_timeout_secs),
            cleanup_time: config.dedup_cleanup_time,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Inside the window around meal time minus lead time.
    OnTime { instant: NaiveDateTime },
    /// The on-time reminder was missed; inside the window around the meal itself.
    Late,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DueReminder {
    pub day_index: usize,
    pub category: MealCategory,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub meal_at: NaiveDateTime,
    pub trigger: Trigger,
}

impl DueReminder {
    /// Ledger keys that suppress this reminder.
    fn blocking_keys(&self, user_id: Uuid) -> Vec<DedupKey> {
        let day = self.meal_at.date();
        let day_key = DedupKey::for_day(user_id, self.category, day);
        match self.trigger {
            Trigger::OnTime { instant } => {
                vec![DedupKey::at(user_id, self.category, day, instant), day_key]
            }
            Trigger::Late => vec![day_key],
        }
    }

    /// Keys recorded once the reminder went out.
    fn recorded_keys(&self, user_id: Uuid, prefs: &NotificationPreferences) -> Vec<DedupKey> {
        let day = self.meal_at.date();
        let instant = match self.trigger {
            Trigger::OnTime { instant } => instant,
            Trigger::Late => self.meal_at - Duration::minutes(i64::from(prefs.lead_minutes)),
        };
        vec![
            DedupKey::at(user_id, self.category, day, instant),
            DedupKey::for_day(user_id, self.category, day),
        ]
    }
}

/// Populated slots of today's column whose reminder is due at `now`.
/// Does not consult the ledger.
pub fn due_reminders(
    plan: &WeekPlan,
    prefs: &NotificationPreferences,
    now: NaiveDateTime,
    window: Duration,
) -> Vec<DueReminder> {
    let Some((day_index, day)) = plan.day_for_date(now.date()) else {
        return Vec::new();
    };

    let mut due = Vec::new();
    for slot in day.meals.iter() {
        let Some(recipe_id) = slot.recipe_id else {
            continue;
        };
        let (Some(meal_at), Some(reminder_at)) = (
            prefs.meal_instant(slot.category, day.date),
            prefs.reminder_instant(slot.category, day.date),
        ) else {
            warn!("Unparseable {} time for user {}", slot.category, prefs.user_id);
            continue;
        };

        let trigger = if within(now, reminder_at, window) {
            Trigger::OnTime { instant: reminder_at }
        } else if within(now, meal_at, window) {
            Trigger::Late
        } else {
            continue;
        };

        due.push(DueReminder {
            day_index,
            category: slot.category,
            recipe_id,
            recipe_name: slot.recipe_name.clone(),
            meal_at,
            trigger,
        });
    }
    due
}

fn within(now: NaiveDateTime, target: NaiveDateTime, window: Duration) -> bool {
    let offset = now - target;
    offset <= window && offset >= -window
}

/// True when `now` is exactly the user's configured summary day and minute.
pub fn weekly_summary_due(prefs: &NotificationPreferences, now: NaiveDateTime) -> bool {
    prefs.should_send_weekly_summary()
        && weekday_name(now.weekday()) == prefs.weekly_summary_day
        && now.format("%H:%M").to_string() == prefs.weekly_summary_time
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NextMeal {
    pub day_index: usize,
    pub day_name: String,
    pub category: MealCategory,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub at: NaiveDateTime,
}

/// First populated slot, from today on in slot order, whose meal instant is after `now`.
pub fn next_meal(
    plan: &WeekPlan,
    prefs: &NotificationPreferences,
    now: NaiveDateTime,
) -> Option<NextMeal> {
    let today = now.date();
    plan.days
        .iter()
        .enumerate()
        .filter(|(_, d)| d.date >= today)
        .flat_map(|(i, d)| d.meals.iter().map(move |m| (i, d, m)))
        .find_map(|(day_index, day, slot)| {
            let recipe_id = slot.recipe_id?;
            let at = prefs.meal_instant(slot.category, day.date)?;
            (at > now).then(|| NextMeal {
                day_index,
                day_name: day.day_name.clone(),
                category: slot.category,
                recipe_id,
                recipe_name: slot.recipe_name.clone(),
                at,
            })
        })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub users: usize,
    pub sent: usize,
    pub failed_users: usize,
}

impl TickReport {
    fn record(
        &mut self,
        lane: &str,
        user: &UserContact,
        outcome: Result<anyhow::Result<usize>, tokio::time::error::Elapsed>,
    ) {
        self.users += 1;
        match outcome {
            Ok(Ok(n)) => self.sent += n,
            Ok(Err(e)) => {
                self.failed_users += 1;
                warn!("{lane}: failed for user {}: {e:#}", user.id);
            }
            Err(_) => {
                self.failed_users += 1;
                warn!("{lane}: timed out for user {}", user.id);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClockStatus {
    pub initialized: bool,
    pub active_jobs: usize,
    pub total_jobs: usize,
    pub delivery_configured: bool,
}

pub struct NotificationClock {
    users: Arc<dyn UserDirectory>,
    grids: Arc<dyn GridStore>,
    prefs: Arc<dyn PreferencesStore>,
    recipes: Arc<dyn RecipeStore>,
    gateway: Arc<dyn DeliveryGateway>,
    ledger: Arc<dyn DedupLedger>,
    settings: ClockSettings,
    shutdown: Mutex<Option<watch::Sender<bool>>>,
    lanes: Mutex<Vec<JoinHandle<()>>>,
    active_jobs: Arc<AtomicUsize>,
}

impl NotificationClock {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        grids: Arc<dyn GridStore>,
        prefs: Arc<dyn PreferencesStore>,
        recipes: Arc<dyn RecipeStore>,
        gateway: Arc<dyn DeliveryGateway>,
        ledger: Arc<dyn DedupLedger>,
        settings: ClockSettings,
    ) -> Self {
        Self {
            users,
            grids,
            prefs,
            recipes,
            gateway,
            ledger,
            settings,
            shutdown: Mutex::new(None),
            lanes: Mutex::new(Vec::new()),
            active_jobs: Arc::new(AtomicUsize::new(0)),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Spawn the three lanes. A second call while running does nothing.
    pub fn start(self: &Arc<Self>) {
        let rx = {
            let mut guard = self.shutdown.lock().unwrap_or_else(|e| e.into_inner());
            if guard.is_some() {
                debug!("Notification clock already running");
                return;
            }
            let (tx, rx) = watch::channel(false);
            *guard = Some(tx);
            rx
        };

        // Every minute, on the minute boundary
        self.spawn_lane(
            "meal-reminders",
            rx.clone(),
            |now| {
                let secs_past = now.second() as u64;
                if secs_past == 0 { 60 } else { 60 - secs_past }
            },
            |clock| async move {
                let report = clock.run_meal_reminder_tick(Local::now().naive_local()).await;
                if report.sent > 0 || report.failed_users > 0 {
                    info!(
                        "Meal reminders: {} sent, {} user(s) failed",
                        report.sent, report.failed_users
                    );
                }
            },
        );

        // Every hour at :00
        self.spawn_lane(
            "weekly-summary",
            rx.clone(),
            |now| 3600 - (now.minute() * 60 + now.second()) as u64,
            |clock| async move {
                let report = clock.run_weekly_summary_tick(Local::now().naive_local()).await;
                if report.sent > 0 {
                    info!("Weekly summary: {} sent", report.sent);
                }
            },
        );

        // Once a day at the cleanup time
        let cleanup_time = self.settings.cleanup_time;
        self.spawn_lane(
            "ledger-cleanup",
            rx,
            move |now| secs_until(now, cleanup_time),
            |clock| async move {
                if let Err(e) = clock.clear_ledger().await {
                    warn!("Dedup ledger cleanup failed: {e:#}");
                }
            },
        );

        info!(
            "Notification clock started (delivery configured: {})",
            self.gateway.is_configured()
        );
    }

    /// Signal every lane to exit after its current tick.
    pub fn stop(&self) {
        let tx = self.shutdown.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(tx) = tx {
            let _ = tx.send(true);
            info!("Notification clock stopping");
        }
    }

    /// Stop, then wait up to `grace` for in-flight ticks to finish.
    pub async fn shutdown(&self, grace: std::time::Duration) {
        self.stop();
        let lanes = std::mem::take(&mut *self.lanes.lock().unwrap_or_else(|e| e.into_inner()));
        if lanes.is_empty() {
            return;
        }

        let joined = tokio::time::timeout(grace, async {
            for lane in lanes {
                if let Err(e) = lane.await {
                    warn!("Notification lane ended abnormally: {e}");
                }
            }
        })
        .await;
        match joined {
            Ok(()) => info!("Notification clock stopped"),
            Err(_) => warn!("Notification clock did not stop within {}s", grace.as_secs()),
        }
    }

    pub fn status(&self) -> ClockStatus {
        let initialized = self
            .shutdown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some();
        ClockStatus {
            initialized,
            active_jobs: self.active_jobs.load(Ordering::SeqCst),
            total_jobs: TOTAL_JOBS,
            delivery_configured: self.gateway.is_configured(),
        }
    }

    fn spawn_lane<W, T, F>(
        self: &Arc<Self>,
        name: &'static str,
        mut rx: watch::Receiver<bool>,
        wait_secs: W,
        tick: T,
    ) where
        W: Fn(NaiveTime) -> u64 + Send + 'static,
        T: Fn(Arc<Self>) -> F + Send + 'static,
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let clock = Arc::clone(self);
        let active = Arc::clone(&self.active_jobs);
        active.fetch_add(1, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            loop {
                let secs = wait_secs(Local::now().time()).max(1);
                let stopped = tokio::select! {
                    _ = tokio::time::sleep(std::time::Duration::from_secs(secs)) => false,
                    _ = rx.changed() => true,
                };
                if stopped || *rx.borrow() {
                    break;
                }
                tick(Arc::clone(&clock)).await;
            }
            active.fetch_sub(1, Ordering::SeqCst);
            debug!("Lane {name} stopped");
        });
        self.lanes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(handle);
    }

    // ─── Ticks ───────────────────────────────────────────────────────────────

    pub async fn run_meal_reminder_tick(&self, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        for user in self.active_users("meal reminders").await {
            let outcome = tokio::time::timeout(self.settings.timeout, self.remind_user(&user, now)).await;
            report.record("meal reminders", &user, outcome);
        }
        report
    }

    pub async fn run_weekly_summary_tick(&self, now: NaiveDateTime) -> TickReport {
        let mut report = TickReport::default();
        for user in self.active_users("weekly summary").await {
            let outcome =
                tokio::time::timeout(self.settings.timeout, self.summarize_for_user(&user, now)).await;
            report.record("weekly summary", &user, outcome);
        }
        report
    }

    pub async fn clear_ledger(&self) -> anyhow::Result<()> {
        let entries = self.ledger.len().await?;
        self.ledger.clear().await?;
        metrics::DEDUP_LEDGER_GAUGE.set(0.0);
        info!("Dedup ledger cleared ({entries} entries)");
        Ok(())
    }

    /// Active users, or none when the directory fails or times out.
    async fn active_users(&self, lane: &str) -> Vec<UserContact> {
        match tokio::time::timeout(self.settings.timeout, self.users.list_active()).await {
            Ok(Ok(users)) => users,
            Ok(Err(e)) => {
                warn!("{lane}: failed to list users: {e:#}");
                Vec::new()
            }
            Err(_) => {
                warn!("{lane}: listing users timed out");
                Vec::new()
            }
        }
    }

    async fn remind_user(&self, user: &UserContact, now: NaiveDateTime) -> anyhow::Result<usize> {
        let prefs = self.prefs.get_or_create(user.id).await?;
        if !prefs.should_send_meal_reminders() {
            return Ok(0);
        }
        let Some(plan) = self.grids.find_current_week(user.id, monday_of(now.date())).await? else {
            return Ok(0);
        };

        let mut sent = 0;
        for due in due_reminders(&plan, &prefs, now, self.settings.window) {
            if self.already_sent(&due.blocking_keys(user.id)).await? {
                continue;
            }

            let Some(recipe) = self
                .recipes
                .find_by_ids(user.id, &[due.recipe_id])
                .await?
                .into_iter()
                .next()
            else {
                warn!(
                    "Recipe {} in {} slot of user {} no longer exists; skipping",
                    due.recipe_id, due.category, user.id
                );
                continue;
            };

            let day_name = plan
                .day(due.day_index)
                .map(|d| d.day_name.as_str())
                .unwrap_or_default();
            let reminder = MealReminder::new(
                user,
                due.category,
                &due.recipe_name,
                &recipe,
                prefs.meal_time_str(due.category),
                day_name,
            );

            match self.gateway.send_meal_reminder(&user.email, &reminder).await {
                Ok(()) => {
                    for key in due.recorded_keys(user.id, &prefs) {
                        self.ledger.record(key).await?;
                    }
                    match self.ledger.len().await {
                        Ok(n) => metrics::DEDUP_LEDGER_GAUGE.set(n as f64),
                        Err(e) => warn!("Could not read dedup ledger size: {e:#}"),
                    }
                    metrics::notification("meal_reminder", true);
                    info!(
                        "Meal reminder ({:?}) sent to {} for {} {}",
                        due.trigger, user.email, due.category, reminder.recipe_name
                    );
                    sent += 1;
                }
                Err(e) => {
                    metrics::notification("meal_reminder", false);
                    log_delivery_failure("meal reminder", user, &e);
                }
            }
        }
        Ok(sent)
    }

    async fn summarize_for_user(&self, user: &UserContact, now: NaiveDateTime) -> anyhow::Result<usize> {
        let prefs = self.prefs.get_or_create(user.id).await?;
        if !weekly_summary_due(&prefs, now) {
            return Ok(0);
        }
        let Some(plan) = self.grids.find_current_week(user.id, monday_of(now.date())).await? else {
            debug!("Weekly summary: no current menu for user {}", user.id);
            return Ok(0);
        };

        let summary = WeeklySummary::new(user, &plan);
        match self.gateway.send_weekly_summary(&user.email, &summary).await {
            Ok(()) => {
                metrics::notification("weekly_summary", true);
                info!("Weekly summary sent to {}", user.email);
                Ok(1)
            }
            Err(e) => {
                metrics::notification("weekly_summary", false);
                log_delivery_failure("weekly summary", user, &e);
                Ok(0)
            }
        }
    }

    async fn already_sent(&self, keys: &[DedupKey]) -> anyhow::Result<bool> {
        for key in keys {
            if self.ledger.contains(key).await? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    // ─── On demand ───────────────────────────────────────────────────────────

    /// Send a reminder for the user's next upcoming meal right away.
    /// The dedup ledger is neither read nor written.
    pub async fn send_next_meal_notification(
        &self,
        user_id: Uuid,
        now: NaiveDateTime,
    ) -> Result<NextMeal, PlanError> {
        let user = self.find_user(user_id).await?;
        let prefs = self.prefs.get_or_create(user_id).await?;
        let plan = self
            .grids
            .find_current_week(user_id, monday_of(now.date()))
            .await?
            .ok_or(PlanError::NoActiveWeek)?;

        let next = next_meal(&plan, &prefs, now).ok_or(PlanError::NoUpcomingMeal)?;
        let recipe = self
            .recipes
            .find_by_ids(user_id, &[next.recipe_id])
            .await?
            .into_iter()
            .next()
            .ok_or(PlanError::NotFound("recipe"))?;

        let reminder = MealReminder::new(
            &user,
            next.category,
            &next.recipe_name,
            &recipe,
            prefs.meal_time_str(next.category),
            &next.day_name,
        );
        let result = self.gateway.send_meal_reminder(&user.email, &reminder).await;
        metrics::notification("next_meal", result.is_ok());
        result?;

        info!("Next-meal reminder sent to {} ({} {})", user.email, next.day_name, next.category);
        Ok(next)
    }

    pub async fn send_test_notification(&self, user_id: Uuid) -> Result<(), PlanError> {
        let user = self.find_user(user_id).await?;
        let result = self.gateway.send_test(&user.email, &user.name).await;
        metrics::notification("test", result.is_ok());
        result?;
        info!("Test notification sent to {}", user.email);
        Ok(())
    }

    async fn find_user(&self, user_id: Uuid) -> Result<UserContact, PlanError> {
        self.users
            .find(user_id)
            .await?
            .ok_or(PlanError::NotFound("user"))
    }
}

fn log_delivery_failure(what: &str, user: &UserContact, e: &DeliveryError) {
    match e {
        DeliveryError::NotConfigured => debug!("Skipping {what} for {}: {e}", user.id),
        _ => warn!("Failed to send {what} to user {}: {e}", user.id),
    }
}

/// Seconds from `now` until the next occurrence of `target` (a full day when equal).
pub fn secs_until(now: NaiveTime, target: NaiveTime) -> u64 {
    let now_secs = now.num_seconds_from_midnight() as u64;
    let target_secs = target.num_seconds_from_midnight() as u64;
    if now_secs < target_secs {
        target_secs - now_secs
    } else {
        86_400 - now_secs + target_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dedup::MemoryLedger;
    use crate::services::testing::{MemoryStore, RecordingGateway, Sent};
    use async_trait::async_trait;
    use chrono::NaiveDate;

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        gateway: Arc<RecordingGateway>,
        ledger: Arc<MemoryLedger>,
        clock: Arc<NotificationClock>,
        user: UserContact,
        plan: WeekPlan,
    }

    /// A user with "Chicken soup" for Friday lunch, lunch at 13:00, lead 30.
    fn add_lunch_eater(store: &MemoryStore, name: &str) -> (UserContact, WeekPlan) {
        let user = store.add_user(name);
        let recipe = store.add_recipe(user.id, "Chicken soup", Some(MealCategory::Lunch));

        let mut plan = WeekPlan::empty(user.id, monday_of(friday()), "week");
        plan.slot_mut(4, MealCategory::Lunch)
            .unwrap()
            .set_recipe(recipe.id, &recipe.name);
        store.put_grid(plan.clone());
        store.put_prefs(NotificationPreferences::defaults(user.id));
        (user, plan)
    }

    fn clock_over(
        store: &Arc<MemoryStore>,
        gateway: &Arc<RecordingGateway>,
        ledger: Arc<dyn DedupLedger>,
    ) -> Arc<NotificationClock> {
        Arc::new(NotificationClock::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store.clone(),
            gateway.clone(),
            ledger,
            ClockSettings::default(),
        ))
    }

    fn fixture_with(gateway: RecordingGateway) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(gateway);
        let ledger = Arc::new(MemoryLedger::new());
        let (user, plan) = add_lunch_eater(&store, "Ana");
        let clock = clock_over(&store, &gateway, ledger.clone());
        Fixture { store, gateway, ledger, clock, user, plan }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingGateway::new())
    }

    #[test]
    fn reminder_fires_inside_the_lead_window_only() {
        let f = fixture();
        let prefs = NotificationPreferences::defaults(f.user.id);
        let window = Duration::minutes(5);

        let due = due_reminders(&f.plan, &prefs, at(friday(), 12, 31), window);
        assert_eq!(due.len(), 1);
        assert_eq!(
            due[0].trigger,
            Trigger::OnTime { instant: at(friday(), 12, 30) }
        );

        assert!(due_reminders(&f.plan, &prefs, at(friday(), 12, 0), window).is_empty());

        let late = due_reminders(&f.plan, &prefs, at(friday(), 13, 1), window);
        assert_eq!(late.len(), 1);
        assert_eq!(late[0].trigger, Trigger::Late);

        // Thursday has nothing planned.
        let thursday = friday().pred_opt().unwrap();
        assert!(due_reminders(&f.plan, &prefs, at(thursday, 12, 31), window).is_empty());
    }

    #[tokio::test]
    async fn two_checks_in_one_window_send_once() {
        let f = fixture();

        let first = f.clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;
        let second = f.clock.run_meal_reminder_tick(at(friday(), 12, 33)).await;
        let late = f.clock.run_meal_reminder_tick(at(friday(), 13, 1)).await;

        assert_eq!(first.sent, 1);
        assert_eq!(second.sent, 0);
        assert_eq!(late.sent, 0);
        assert_eq!(f.gateway.sent().len(), 1);
        assert_eq!(f.ledger.len().await.unwrap(), 2);

        match &f.gateway.sent()[0] {
            Sent::MealReminder { address, reminder } => {
                assert_eq!(address, "ana@example.com");
                assert_eq!(reminder.recipe_name, "Chicken soup");
                assert_eq!(reminder.meal_time, "13:00");
                assert_eq!(reminder.day_name, "Friday");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missed_reminder_falls_back_to_meal_time_once() {
        let f = fixture();

        assert_eq!(f.clock.run_meal_reminder_tick(at(friday(), 13, 1)).await.sent, 1);
        assert_eq!(f.clock.run_meal_reminder_tick(at(friday(), 13, 3)).await.sent, 0);
        assert!(f
            .ledger
            .contains(&DedupKey::for_day(f.user.id, MealCategory::Lunch, friday()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn cleared_ledger_allows_resending() {
        let f = fixture();

        f.clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;
        f.clock.clear_ledger().await.unwrap();
        let again = f.clock.run_meal_reminder_tick(at(friday(), 12, 32)).await;

        assert_eq!(again.sent, 1);
        assert_eq!(f.gateway.sent().len(), 2);
    }

    #[tokio::test]
    async fn disabled_preferences_suppress_reminders() {
        let f = fixture();
        let mut prefs = NotificationPreferences::defaults(f.user.id);
        prefs.email_enabled = false;
        f.store.put_prefs(prefs);

        let report = f.clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;
        assert_eq!(report.users, 1);
        assert_eq!(report.sent, 0);
        assert!(f.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn unconfigured_delivery_records_nothing() {
        let f = fixture_with(RecordingGateway::unconfigured());

        let report = f.clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed_users, 0);
        assert_eq!(f.ledger.len().await.unwrap(), 0);
        assert!(!f.clock.status().delivery_configured);
    }

    #[tokio::test]
    async fn deleted_recipe_is_skipped() {
        let f = fixture();
        f.store.recipes.lock().unwrap().clear();

        let report = f.clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;

        assert_eq!(report.sent, 0);
        assert_eq!(report.failed_users, 0);
        assert!(f.gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn weekly_summary_matches_day_and_minute() {
        let f = fixture();
        let sunday = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let prefs = NotificationPreferences::defaults(f.user.id);

        assert!(weekly_summary_due(&prefs, at(sunday, 20, 0)));
        assert!(!weekly_summary_due(&prefs, at(sunday, 20, 1)));
        assert!(!weekly_summary_due(&prefs, at(friday(), 20, 0)));

        let report = f.clock.run_weekly_summary_tick(at(sunday, 20, 0)).await;
        assert_eq!(report.sent, 1);
        match &f.gateway.sent()[0] {
            Sent::WeeklySummary { summary, .. } => {
                assert_eq!(summary.days.len(), 7);
                assert_eq!(summary.planned_meals(), 1);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[tokio::test]
    async fn next_meal_bypasses_the_ledger() {
        let f = fixture();

        let next = f
            .clock
            .send_next_meal_notification(f.user.id, at(friday(), 9, 0))
            .await
            .unwrap();
        assert_eq!(next.category, MealCategory::Lunch);
        assert_eq!(next.at, at(friday(), 13, 0));

        // Sending again is allowed and nothing is recorded.
        f.clock
            .send_next_meal_notification(f.user.id, at(friday(), 9, 1))
            .await
            .unwrap();
        assert_eq!(f.gateway.sent().len(), 2);
        assert_eq!(f.ledger.len().await.unwrap(), 0);

        let err = f
            .clock
            .send_next_meal_notification(f.user.id, at(friday(), 13, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NoUpcomingMeal));
    }

    #[tokio::test]
    async fn test_notification_reports_missing_delivery() {
        let f = fixture_with(RecordingGateway::unconfigured());
        let err = f.clock.send_test_notification(f.user.id).await.unwrap_err();
        assert!(matches!(err, PlanError::Delivery(DeliveryError::NotConfigured)));

        let err = f.clock.send_test_notification(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, PlanError::NotFound("user")));
    }

    /// Ledger whose size cannot be read.
    struct UncountableLedger(MemoryLedger);

    #[async_trait]
    impl DedupLedger for UncountableLedger {
        async fn contains(&self, key: &DedupKey) -> anyhow::Result<bool> {
            self.0.contains(key).await
        }

        async fn record(&self, key: DedupKey) -> anyhow::Result<()> {
            self.0.record(key).await
        }

        async fn clear(&self) -> anyhow::Result<()> {
            self.0.clear().await
        }

        async fn len(&self) -> anyhow::Result<usize> {
            anyhow::bail!("SCARD failed")
        }
    }

    #[tokio::test]
    async fn unreadable_ledger_size_does_not_fail_the_user() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let (user, mut plan) = add_lunch_eater(&store, "Ana");
        let cookie = store.add_recipe(user.id, "Cookies", Some(MealCategory::Snack));
        plan.slot_mut(4, MealCategory::Snack)
            .unwrap()
            .set_recipe(cookie.id, &cookie.name);
        store.put_grid(plan);
        let mut prefs = NotificationPreferences::defaults(user.id);
        prefs.snack_time = "13:00".into();
        store.put_prefs(prefs);
        let clock = clock_over(&store, &gateway, Arc::new(UncountableLedger(MemoryLedger::new())));

        let report = clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;

        assert_eq!(report, TickReport { users: 1, sent: 2, failed_users: 0 });
        assert_eq!(gateway.sent().len(), 2);

        let again = clock.run_meal_reminder_tick(at(friday(), 12, 32)).await;
        assert_eq!(again.sent, 0);
        assert_eq!(gateway.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_user_does_not_block_the_next_one() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let (broken, _) = add_lunch_eater(&store, "Broken");
        let (ana, _) = add_lunch_eater(&store, "Ana");
        store.fail_for(broken.id);
        let clock = clock_over(&store, &gateway, Arc::new(MemoryLedger::new()));

        let report = clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;

        assert_eq!(report, TickReport { users: 2, sent: 1, failed_users: 1 });
        match &gateway.sent()[..] {
            [Sent::MealReminder { address, .. }] => assert_eq!(address, &ana.email),
            other => panic!("unexpected messages: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_delivery_times_out_and_the_tick_moves_on() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(RecordingGateway::new());
        let (stuck, _) = add_lunch_eater(&store, "Stuck");
        let (ana, _) = add_lunch_eater(&store, "Ana");
        gateway.stall_for(&stuck.email);
        let ledger = Arc::new(MemoryLedger::new());
        let clock = clock_over(&store, &gateway, ledger.clone());

        let started = tokio::time::Instant::now();
        let report = clock.run_meal_reminder_tick(at(friday(), 12, 31)).await;

        assert_eq!(report, TickReport { users: 2, sent: 1, failed_users: 1 });
        assert!(started.elapsed() >= ClockSettings::default().timeout);
        match &gateway.sent()[..] {
            [Sent::MealReminder { address, .. }] => assert_eq!(address, &ana.email),
            other => panic!("unexpected messages: {other:?}"),
        }
        // Nothing recorded for the stalled user, so the next tick retries.
        let stuck_day = DedupKey::for_day(stuck.id, MealCategory::Lunch, friday());
        assert!(!ledger.contains(&stuck_day).await.unwrap());
    }

    #[tokio::test]
    async fn start_is_idempotent_and_stop_ends_lanes() {
        let f = fixture();
        assert!(!f.clock.status().initialized);

        f.clock.start();
        f.clock.start();
        let status = f.clock.status();
        assert!(status.initialized);
        assert_eq!(status.active_jobs, 3);
        assert_eq!(status.total_jobs, 3);

        f.clock.stop();
        for _ in 0..50 {
            if f.clock.status().active_jobs == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        let status = f.clock.status();
        assert!(!status.initialized);
        assert_eq!(status.active_jobs, 0);
    }

    #[tokio::test]
    async fn shutdown_waits_for_every_lane() {
        let f = fixture();
        f.clock.start();
        assert_eq!(f.clock.status().active_jobs, 3);

        f.clock.shutdown(std::time::Duration::from_secs(5)).await;

        // No polling: the lanes have already been joined.
        let status = f.clock.status();
        assert!(!status.initialized);
        assert_eq!(status.active_jobs, 0);

        // Restart after a shutdown spawns a fresh set of lanes.
        f.clock.start();
        assert_eq!(f.clock.status().active_jobs, 3);
        f.clock.shutdown(std::time::Duration::from_secs(5)).await;
        assert_eq!(f.clock.status().active_jobs, 0);
    }

    #[test]
    fn secs_until_wraps_past_midnight() {
        let t = |h, m| NaiveTime::from_hms_opt(h, m, 0).unwrap();
        assert_eq!(secs_until(t(23, 0), t(0, 0)), 3600);
        assert_eq!(secs_until(t(8, 0), t(9, 0)), 3600);
        assert_eq!(secs_until(t(9, 0), t(9, 0)), 86_400);
    }
}
