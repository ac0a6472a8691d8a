/// Run one notification tick against the database, outside the API process.
/// Useful from cron when the in-process clock is disabled, or to replay a missed minute.
///
/// Usage: send-reminders [meal|summary|cleanup] [--at "YYYY-MM-DD HH:MM"]
///   --at  : Local instant to evaluate (defaults to now)
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, NaiveDateTime};
use clap::{Parser, ValueEnum};

use mealplan_api::{
    config::{Config, DedupBackend},
    db::{self, PgStore},
    services::{
        dedup::{DedupLedger, MemoryLedger, RedisLedger},
        delivery::{DeliveryGateway, UnconfiguredGateway},
        email::EmailService,
        scheduler::{ClockSettings, NotificationClock},
    },
};

#[derive(Clone, Copy, ValueEnum)]
enum Lane {
    /// Meal reminders due at the given minute
    Meal,
    /// Weekly summaries scheduled for the given minute
    Summary,
    /// Clear the dedup ledger
    Cleanup,
}

#[derive(Parser)]
#[command(name = "send-reminders", about = "Run one meal-plan notification tick")]
struct Args {
    #[arg(value_enum, default_value = "meal")]
    lane: Lane,

    /// Local instant to evaluate, "YYYY-MM-DD HH:MM"
    #[arg(long)]
    at: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let now = match args.at.as_deref() {
        Some(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
            .with_context(|| format!("--at must be \"YYYY-MM-DD HH:MM\", got '{s}'"))?,
        None => Local::now().naive_local(),
    };

    let config = Config::from_env()?;
    let pool = db::create_pool(&config.database_url).await?;
    let store = Arc::new(PgStore::new(pool));

    // A memory ledger only dedups within this run; use Redis to share with the API.
    let ledger: Arc<dyn DedupLedger> = match config.dedup_backend {
        DedupBackend::Memory => Arc::new(MemoryLedger::new()),
        DedupBackend::Redis => Arc::new(RedisLedger::new(redis::Client::open(
            config.redis_url.as_str(),
        )?)),
    };
    let gateway: Arc<dyn DeliveryGateway> = match EmailService::new(&config) {
        Some(email) => Arc::new(email),
        None => {
            tracing::warn!("SMTP not configured: nothing will be delivered");
            Arc::new(UnconfiguredGateway)
        }
    };

    let clock = NotificationClock::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store,
        gateway,
        ledger,
        ClockSettings::from_config(&config),
    );

    match args.lane {
        Lane::Meal => {
            let report = clock.run_meal_reminder_tick(now).await;
            tracing::info!(
                "Meal reminders at {now}: {} user(s), {} sent, {} failed",
                report.users,
                report.sent,
                report.failed_users
            );
        }
        Lane::Summary => {
            let report = clock.run_weekly_summary_tick(now).await;
            tracing::info!(
                "Weekly summaries at {now}: {} user(s), {} sent, {} failed",
                report.users,
                report.sent,
                report.failed_users
            );
        }
        Lane::Cleanup => clock.clear_ledger().await?,
    }

    Ok(())
}
