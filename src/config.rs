use std::env;

use chrono::NaiveTime;

use crate::models::preferences::parse_clock;

/// Where the notification dedup ledger lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupBackend {
    Memory,
    Redis,
}

impl std::str::FromStr for DedupBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(DedupBackend::Memory),
            "redis" => Ok(DedupBackend::Redis),
            other => Err(anyhow::anyhow!("DEDUP_BACKEND must be 'memory' or 'redis', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub jwt_secret: String,
    pub host: String,
    pub port: u16,
    pub app_name: String,
    // Notification clock
    pub scheduler_enabled: bool,
    pub dedup_backend: DedupBackend,
    pub notify_timeout_secs: u64,
    pub notify_window_minutes: i64,
    pub dedup_cleanup_time: NaiveTime,
    // SMTP (optional)
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub smtp_from: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let cleanup = env::var("DEDUP_CLEANUP_TIME").unwrap_or_else(|_| "00:00".into());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".into()),
            jwt_secret: required("JWT_SECRET")?,
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".into())
                .parse()?,
            app_name: env::var("APP_NAME").unwrap_or_else(|_| "Meal Planner".into()),
            scheduler_enabled: env::var("SCHEDULER_ENABLED")
                .map(|v| !matches!(v.trim(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            dedup_backend: env::var("DEDUP_BACKEND")
                .unwrap_or_else(|_| "memory".into())
                .parse()?,
            notify_timeout_secs: env::var("NOTIFY_TIMEOUT_SECS")
                .unwrap_or_else(|_| "20".into())
                .parse()?,
            notify_window_minutes: env::var("NOTIFY_WINDOW_MINUTES")
                .unwrap_or_else(|_| "5".into())
                .parse()?,
            dedup_cleanup_time: parse_clock(&cleanup)
                .ok_or_else(|| anyhow::anyhow!("DEDUP_CLEANUP_TIME must be HH:MM, got '{cleanup}'"))?,
            smtp_host: env::var("SMTP_HOST").ok().filter(|s| !s.is_empty()),
            smtp_port: env::var("SMTP_PORT").ok().and_then(|v| v.parse().ok()),
            smtp_username: env::var("SMTP_USERNAME").ok().filter(|s| !s.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|s| !s.is_empty()),
            smtp_from: env::var("SMTP_FROM").ok().filter(|s| !s.is_empty()),
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).map_err(|_| anyhow::anyhow!("Missing required env var: {}", key))
}
