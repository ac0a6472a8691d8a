use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mealplan_api::{
    config::{Config, DedupBackend},
    db::{self, PgStore},
    router,
    services::{
        dedup::{DedupLedger, MemoryLedger, RedisLedger},
        delivery::{DeliveryGateway, UnconfiguredGateway},
        email::EmailService,
        scheduler::{ClockSettings, NotificationClock},
    },
    AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);

    let pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&pool).await?;
    info!("Database connected and migrations applied");
    let store = Arc::new(PgStore::new(pool));

    let ledger: Arc<dyn DedupLedger> = match config.dedup_backend {
        DedupBackend::Memory => Arc::new(MemoryLedger::new()),
        DedupBackend::Redis => {
            let client = redis::Client::open(config.redis_url.as_str())?;
            // Fail fast on a bad URL or unreachable server
            client.get_multiplexed_async_connection().await?;
            info!("Redis connected (dedup ledger)");
            Arc::new(RedisLedger::new(client))
        }
    };

    let gateway: Arc<dyn DeliveryGateway> = match EmailService::new(&config) {
        Some(email) => {
            if !email.verify_connection().await {
                warn!("SMTP server did not answer the connection check; sends may fail");
            }
            info!("SMTP email service configured");
            Arc::new(email)
        }
        None => {
            info!("SMTP not configured: email notifications disabled");
            Arc::new(UnconfiguredGateway)
        }
    };

    let clock = Arc::new(NotificationClock::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        gateway,
        ledger,
        ClockSettings::from_config(&config),
    ));
    if config.scheduler_enabled {
        clock.start();
    } else {
        info!("Notification clock disabled (SCHEDULER_ENABLED=false)");
    }

    let state = AppState {
        config: config.clone(),
        store,
        clock: clock.clone(),
    };
    let app = router(state);

    let addr = format!("{}:{}", config.host, config.port);
    info!("{} API listening on {}", config.app_name, addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Let a tick that is mid-send finish before the runtime goes away
    clock
        .shutdown(std::time::Duration::from_secs(config.notify_timeout_secs))
        .await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
