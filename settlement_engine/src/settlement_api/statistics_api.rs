use log::*;

use crate::{db_types::StatisticsSnapshot, settlement_api::errors::SettlementError, traits::StatisticsManagement};

pub struct StatisticsApi<B> {
    db: B,
}

impl<B> StatisticsApi<B>
where B: StatisticsManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// The snapshot as it stands, including incremental updates since the last refresh.
    pub async fn snapshot(&self) -> Result<StatisticsSnapshot, SettlementError> {
        let snapshot = self.db.fetch_statistics().await?;
        Ok(snapshot)
    }

    /// Rebuilds the snapshot from the ledger.
    pub async fn refresh(&self) -> Result<StatisticsSnapshot, SettlementError> {
        let snapshot = self.db.recompute_statistics().await?;
        info!(
            "📊️ Statistics refreshed: {} payments, {} completed for a volume of {}",
            snapshot.total_count(),
            snapshot.completed_count,
            snapshot.completed_volume
        );
        Ok(snapshot)
    }
}
