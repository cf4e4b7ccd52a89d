use crate::{db_types::StatisticsSnapshot, traits::LedgerError};

/// The statistics rollup.
///
/// Incremental updates are not part of this trait: every ledger write folds its own delta into the snapshot in the
/// same transaction (see [`crate::traits::SettlementDatabase`]), so a recompute never double counts a transition.
#[allow(async_fn_in_trait)]
pub trait StatisticsManagement {
    async fn fetch_statistics(&self) -> Result<StatisticsSnapshot, LedgerError>;

    /// Rebuilds the snapshot from the ledger in one atomic write and returns it. Running this twice with no ledger
    /// activity in between yields identical snapshots.
    async fn recompute_statistics(&self) -> Result<StatisticsSnapshot, LedgerError>;
}
