//! Ledger of notifications already sent, cleared once a day.

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

use crate::models::week::MealCategory;

const REDIS_LEDGER_KEY: &str = "mealplan:notified";

/// Identity of one notifiable event.
///
/// With `instant` set the key names one computed reminder instant; without it
/// the key covers the meal for the whole day.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub user_id: Uuid,
    pub category: MealCategory,
    pub day: NaiveDate,
    pub instant: Option<NaiveDateTime>,
}

impl DedupKey {
    pub fn at(user_id: Uuid, category: MealCategory, day: NaiveDate, instant: NaiveDateTime) -> Self {
        Self { user_id, category, day, instant: Some(instant) }
    }

    pub fn for_day(user_id: Uuid, category: MealCategory, day: NaiveDate) -> Self {
        Self { user_id, category, day, instant: None }
    }
}

impl std::fmt::Display for DedupKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.instant {
            Some(at) => write!(
                f,
                "{}:{}:{}:{}",
                self.user_id,
                self.category,
                self.day,
                at.format("%H%M")
            ),
            None => write!(f, "{}:{}:{}:day", self.user_id, self.category, self.day),
        }
    }
}

#[async_trait]
pub trait DedupLedger: Send + Sync {
    async fn contains(&self, key: &DedupKey) -> anyhow::Result<bool>;

    async fn record(&self, key: DedupKey) -> anyhow::Result<()>;

    /// Forget everything. Called on the daily boundary.
    async fn clear(&self) -> anyhow::Result<()>;

    async fn len(&self) -> anyhow::Result<usize>;
}

/// Process-local ledger. History is lost on restart.
#[derive(Default)]
pub struct MemoryLedger {
    sent: Mutex<HashSet<DedupKey>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<DedupKey>> {
        // A poisoned set is still a valid set.
        self.sent.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn contains(&self, key: &DedupKey) -> anyhow::Result<bool> {
        Ok(self.lock().contains(key))
    }

    async fn record(&self, key: DedupKey) -> anyhow::Result<()> {
        self.lock().insert(key);
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        self.lock().clear();
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        Ok(self.lock().len())
    }
}

/// Redis-backed ledger: one SET shared by every API instance, survives restarts.
/// The set also carries a 2-day TTL in case the daily sweep never runs.
pub struct RedisLedger {
    client: redis::Client,
}

impl RedisLedger {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }

    async fn conn(&self) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        Ok(self.client.get_multiplexed_async_connection().await?)
    }
}

#[async_trait]
impl DedupLedger for RedisLedger {
    async fn contains(&self, key: &DedupKey) -> anyhow::Result<bool> {
        let mut conn = self.conn().await?;
        let present: bool = redis::cmd("SISMEMBER")
            .arg(REDIS_LEDGER_KEY)
            .arg(key.to_string())
            .query_async(&mut conn)
            .await?;
        Ok(present)
    }

    async fn record(&self, key: DedupKey) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::pipe()
            .cmd("SADD")
            .arg(REDIS_LEDGER_KEY)
            .arg(key.to_string())
            .ignore()
            .cmd("EXPIRE")
            .arg(REDIS_LEDGER_KEY)
            .arg(172_800u64) // 2 days
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        let mut conn = self.conn().await?;
        let _: () = redis::cmd("DEL")
            .arg(REDIS_LEDGER_KEY)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn len(&self) -> anyhow::Result<usize> {
        let mut conn = self.conn().await?;
        let n: usize = redis::cmd("SCARD")
            .arg(REDIS_LEDGER_KEY)
            .query_async(&mut conn)
            .await?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    #[tokio::test]
    async fn memory_ledger_records_and_clears() {
        let ledger = MemoryLedger::new();
        let user = Uuid::new_v4();
        let at = date().and_hms_opt(12, 30, 0).unwrap();
        let key = DedupKey::at(user, MealCategory::Lunch, date(), at);

        assert!(!ledger.contains(&key).await.unwrap());
        ledger.record(key.clone()).await.unwrap();
        ledger.record(key.clone()).await.unwrap();
        assert!(ledger.contains(&key).await.unwrap());
        assert_eq!(ledger.len().await.unwrap(), 1);

        ledger.clear().await.unwrap();
        assert!(!ledger.contains(&key).await.unwrap());
        assert_eq!(ledger.len().await.unwrap(), 0);
    }

    #[test]
    fn instant_and_day_keys_differ() {
        let user = Uuid::new_v4();
        let at = date().and_hms_opt(12, 30, 0).unwrap();
        let instant = DedupKey::at(user, MealCategory::Lunch, date(), at);
        let day = DedupKey::for_day(user, MealCategory::Lunch, date());

        assert_ne!(instant, day);
        assert_ne!(instant.to_string(), day.to_string());
        assert!(instant.to_string().ends_with(":lunch:2026-10-16:1230"));
    }
}
