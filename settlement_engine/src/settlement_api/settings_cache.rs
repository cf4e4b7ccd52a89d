//! Read-through cache for platform settings.
//!
//! The commission rate is read on every new payment, but changes rarely. [`SettingsCache`] keeps the last value read
//! from the database for a fixed time-to-live. Writes through [`SettingsCache::set_commission_rate`] invalidate the
//! cached value immediately; other writers can call [`SettingsCache::invalidate`].
use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use log::*;
use tokio::sync::RwLock;

use crate::{
    commission::CommissionRate,
    settlement_api::errors::SettlementError,
    traits::SettingsManagement,
};

pub const COMMISSION_RATE_KEY: &str = "commission_rate";
pub const DEFAULT_SETTINGS_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
pub struct SettingsCache<B> {
    db: B,
    default_rate: CommissionRate,
    ttl: Duration,
    commission_rate: Arc<RwLock<Option<(CommissionRate, Instant)>>>,
}

impl<B> SettingsCache<B> {
    pub fn new(db: B, default_rate: CommissionRate, ttl: Duration) -> Self {
        Self { db, default_rate, ttl, commission_rate: Arc::new(RwLock::new(None)) }
    }

    pub fn default_rate(&self) -> CommissionRate {
        self.default_rate
    }

    /// Drops the cached values. The next read goes to the database.
    pub async fn invalidate(&self) {
        *self.commission_rate.write().await = None;
        debug!("🪛️ Settings cache invalidated");
    }
}

impl<B> SettingsCache<B>
where B: SettingsManagement
{
    /// The current platform commission rate. Falls back to the configured default if the database has no rate, or has
    /// one that cannot be used.
    pub async fn commission_rate(&self) -> Result<CommissionRate, SettlementError> {
        if let Some((rate, fetched_at)) = *self.commission_rate.read().await {
            if fetched_at.elapsed() < self.ttl {
                return Ok(rate);
            }
        }
        let mut cached = self.commission_rate.write().await;
        // Another task may have refreshed the value while we waited for the lock
        if let Some((rate, fetched_at)) = *cached {
            if fetched_at.elapsed() < self.ttl {
                return Ok(rate);
            }
        }
        let rate = match self.db.fetch_setting(COMMISSION_RATE_KEY).await? {
            Some(value) => value.parse::<CommissionRate>().unwrap_or_else(|e| {
                let default = self.default_rate;
                warn!("🪛️ The stored commission rate is unusable ({e}). Using the default of {default}");
                self.default_rate
            }),
            None => self.default_rate,
        };
        trace!("🪛️ Commission rate loaded: {rate}");
        *cached = Some((rate, Instant::now()));
        Ok(rate)
    }

    /// Stores a new platform commission rate. Existing payment intents keep the rate they were created with.
    pub async fn set_commission_rate(&self, rate: CommissionRate) -> Result<(), SettlementError> {
        self.db.store_setting(COMMISSION_RATE_KEY, &rate.to_string()).await?;
        info!("🪛️ Commission rate changed to {rate}");
        self.invalidate().await;
        Ok(())
    }
}
