use thiserror::Error;

use crate::{
    db_types::{NewPaymentIntent, PaymentIntent},
    traits::{
        IntentManagement,
        IntentTransition,
        JobManagement,
        SettingsManagement,
        StatisticsManagement,
        TransitionResult,
    },
};

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("A live payment intent already exists for job {job_id}, application {application_id}")]
    LiveIntentExists { job_id: String, application_id: String },
    #[error("Payment intent {0} does not exist")]
    IntentNotFound(i64),
    #[error("Stored data could not be read. {0}")]
    InvalidData(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => Self::InvalidData(e.to_string()),
            _ => Self::DatabaseError(e.to_string()),
        }
    }
}

/// The ledger behind the settlement engine.
///
/// Payment intents are created once and then only ever changed through [`SettlementDatabase::transition_intent`].
/// Each transition names the state it expects to find the intent in. If the intent is in any other state the
/// transition is not applied and the current record is returned as [`TransitionResult::Unchanged`], which is how
/// duplicate or racing callbacks are turned into no-ops.
#[allow(async_fn_in_trait)]
pub trait SettlementDatabase:
    Clone + IntentManagement + JobManagement + StatisticsManagement + SettingsManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Stores a new intent in the `Initiated` state and counts it in the statistics rollup, atomically.
    ///
    /// Fails with [`LedgerError::LiveIntentExists`] if another intent for the same job and application exists and has
    /// not failed. This check is enforced by the storage layer, so two concurrent inserts cannot both succeed.
    async fn insert_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, LedgerError>;

    /// Atomically applies `transition` to the intent with the given id, appends an entry to the intent's transition
    /// log, folds the change into the statistics rollup and, for a completed collection, marks the job as fulfilled.
    async fn transition_intent(
        &self,
        id: i64,
        transition: IntentTransition,
    ) -> Result<TransitionResult, LedgerError>;

    async fn close(&mut self) -> Result<(), LedgerError>;
}
