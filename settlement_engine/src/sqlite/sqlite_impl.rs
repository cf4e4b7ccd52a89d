//! `SqliteDatabase` is a concrete implementation of a settlement engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`] module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, intents, jobs, new_pool, settings, statistics};
use crate::{
    db_types::{
        IntentEvent,
        Job,
        JobApplication,
        NewPaymentIntent,
        Page,
        Pagination,
        PaymentIntent,
        StatisticsDelta,
        StatisticsSnapshot,
    },
    traits::{
        IntentManagement,
        IntentTransition,
        JobManagement,
        LedgerError,
        SettingsManagement,
        SettlementDatabase,
        StatisticsManagement,
        TransitionResult,
    },
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SettlementDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let intent = intents::insert_intent(intent, &mut tx).await?;
        statistics::apply_delta(&StatisticsDelta::for_transition(None, &intent), &mut tx).await?;
        tx.commit().await?;
        Ok(intent)
    }

    /// Runs the guarded update, the log entry, the statistics delta and (for completed collections) the job update in
    /// one transaction. A statistics recompute can therefore only ever see all of these or none of them.
    async fn transition_intent(
        &self,
        id: i64,
        transition: IntentTransition,
    ) -> Result<TransitionResult, LedgerError> {
        let mut tx = self.pool.begin().await?;
        let result = intents::transition_intent(id, &transition, &mut tx).await?;
        match &result {
            TransitionResult::Applied(intent) if transition.changes_primary_status() => {
                let delta = StatisticsDelta::for_transition(Some(transition.required_status()), intent);
                statistics::apply_delta(&delta, &mut tx).await?;
            },
            TransitionResult::Applied(_) => {},
            TransitionResult::Unchanged(_) => trace!("🗃️ Intent #{id} left as it was"),
        }
        tx.commit().await?;
        Ok(result)
    }

    async fn close(&mut self) -> Result<(), LedgerError> {
        self.pool.close().await;
        Ok(())
    }
}

impl IntentManagement for SqliteDatabase {
    async fn fetch_intent(&self, id: i64) -> Result<Option<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let intent = intents::fetch_intent(id, &mut conn).await?;
        Ok(intent)
    }

    async fn fetch_intent_by_collection_id(&self, correlation_id: &str) -> Result<Option<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let intent = intents::fetch_intent_by_collection_id(correlation_id, &mut conn).await?;
        Ok(intent)
    }

    async fn fetch_intent_by_payout_id(&self, correlation_id: &str) -> Result<Option<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let intent = intents::fetch_intent_by_payout_id(correlation_id, &mut conn).await?;
        Ok(intent)
    }

    async fn fetch_intents_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Page<PaymentIntent>, LedgerError> {
        // Read transaction, so the count and the page come from the same snapshot
        let mut tx = self.pool.begin().await?;
        let page = intents::fetch_intents_for_user(user_id, pagination, &mut tx).await?;
        tx.commit().await?;
        Ok(page)
    }

    async fn fetch_stale_collections(&self, created_before: DateTime<Utc>) -> Result<Vec<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let intents = intents::fetch_stale_collections(created_before, &mut conn).await?;
        Ok(intents)
    }

    async fn fetch_uncorrelated_payouts(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<PaymentIntent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let intents = intents::fetch_uncorrelated_payouts(claimed_before, &mut conn).await?;
        Ok(intents)
    }

    async fn fetch_intent_events(&self, intent_id: i64) -> Result<Vec<IntentEvent>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let events = intents::fetch_intent_events(intent_id, &mut conn).await?;
        Ok(events)
    }
}

impl JobManagement for SqliteDatabase {
    async fn fetch_job(&self, job_id: &str) -> Result<Option<Job>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let job = jobs::fetch_job(job_id, &mut conn).await?;
        Ok(job)
    }

    async fn fetch_application(&self, application_id: &str) -> Result<Option<JobApplication>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let application = jobs::fetch_application(application_id, &mut conn).await?;
        Ok(application)
    }

    async fn upsert_job(&self, job: Job) -> Result<Job, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let job = jobs::upsert_job(job, &mut conn).await?;
        Ok(job)
    }

    async fn upsert_application(&self, application: JobApplication) -> Result<JobApplication, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let application = jobs::upsert_application(application, &mut conn).await?;
        Ok(application)
    }
}

impl StatisticsManagement for SqliteDatabase {
    async fn fetch_statistics(&self) -> Result<StatisticsSnapshot, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let snapshot = statistics::fetch_statistics(&mut conn).await?;
        Ok(snapshot)
    }

    async fn recompute_statistics(&self) -> Result<StatisticsSnapshot, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let snapshot = statistics::recompute(&mut conn).await?;
        debug!("📊️ Statistics recomputed. {} intents in total", snapshot.total_count());
        Ok(snapshot)
    }
}

impl SettingsManagement for SqliteDatabase {
    async fn fetch_setting(&self, key: &str) -> Result<Option<String>, LedgerError> {
        let mut conn = self.pool.acquire().await?;
        let value = settings::fetch_setting(key, &mut conn).await?;
        Ok(value)
    }

    async fn store_setting(&self, key: &str, value: &str) -> Result<(), LedgerError> {
        let mut conn = self.pool.acquire().await?;
        settings::store_setting(key, value, &mut conn).await?;
        debug!("🗃️ Setting '{key}' updated");
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
