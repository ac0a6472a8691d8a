use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_gauge, CounterVec, Gauge};

lazy_static! {
    // ── Event counters (increment on each event) ────────────────────────────
    pub static ref NOTIFICATIONS_COUNTER: CounterVec = register_counter_vec!(
        "mealplan_notifications_total",
        "Notifications by kind (meal_reminder, weekly_summary, next_meal, test) and status",
        &["kind", "status"]
    ).unwrap();

    pub static ref AUTO_ASSIGN_COUNTER: CounterVec = register_counter_vec!(
        "mealplan_auto_assignments_total",
        "Recipes placed by the assignment engine, by mode",
        &["mode"]
    ).unwrap();

    pub static ref GAP_FILLS_COUNTER: CounterVec = register_counter_vec!(
        "mealplan_gap_fills_total",
        "Empty slots filled with a random suitable recipe",
        &["source"]
    ).unwrap();

    // ── Scheduler state ─────────────────────────────────────────────────────
    pub static ref DEDUP_LEDGER_GAUGE: Gauge = register_gauge!(
        "mealplan_dedup_ledger_entries",
        "Entries currently held in the notification dedup ledger"
    ).unwrap();
}

pub fn notification(kind: &str, ok: bool) {
    NOTIFICATIONS_COUNTER
        .with_label_values(&[kind, if ok { "sent" } else { "failed" }])
        .inc();
}
