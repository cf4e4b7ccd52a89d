use std::time::Duration;

use log::*;
use settlement_engine::{SqliteDatabase, StatisticsApi};
use tokio::task::JoinHandle;

use crate::server::ServerSettlementApi;

/// Starts the reconciliation worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// Every `interval`, collections that have been waiting on the gateway for longer than `older_than` are looked up
/// with the gateway and resolved if the gateway has a final answer.
pub fn start_reconciliation_worker(
    api: ServerSettlementApi,
    interval: Duration,
    older_than: chrono::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        // The first tick completes immediately; skip it so that start-up is not slowed by gateway queries
        timer.tick().await;
        info!("🕰️ Reconciliation worker started");
        loop {
            timer.tick().await;
            debug!("🕰️ Running stale collection reconciliation");
            match api.reconcile_stale(older_than).await {
                Ok(report) if report.examined == 0 => trace!("🕰️ No stale collections"),
                Ok(report) => info!(
                    "🕰️ Reconciliation: {} examined, {} resolved, {} still pending, {} errors",
                    report.examined, report.resolved, report.still_pending, report.errors
                ),
                Err(e) => error!("🕰️ Error running reconciliation job: {e}"),
            }
        }
    })
}

/// Starts the statistics refresh worker. Do not await the returned JoinHandle, as it will run indefinitely.
///
/// A full recompute replaces whatever the incremental updates produced, so any drift heals on the next run.
pub fn start_statistics_worker(db: SqliteDatabase, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(interval);
        let api = StatisticsApi::new(db);
        info!("🕰️ Statistics refresh worker started");
        loop {
            timer.tick().await;
            if let Err(e) = api.refresh().await {
                error!("🕰️ Error refreshing statistics: {e}");
            }
        }
    })
}
