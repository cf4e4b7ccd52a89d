use chrono::{DateTime, Utc};

use crate::{
    db_types::{IntentEvent, Page, Pagination, PaymentIntent},
    traits::LedgerError,
};

/// Read access to payment intents.
#[allow(async_fn_in_trait)]
pub trait IntentManagement {
    async fn fetch_intent(&self, id: i64) -> Result<Option<PaymentIntent>, LedgerError>;

    /// Looks up an intent by the correlation id the gateway assigned to its collection request.
    async fn fetch_intent_by_collection_id(&self, correlation_id: &str) -> Result<Option<PaymentIntent>, LedgerError>;

    /// Looks up an intent by the correlation id the gateway assigned to its current payout request.
    async fn fetch_intent_by_payout_id(&self, correlation_id: &str) -> Result<Option<PaymentIntent>, LedgerError>;

    /// Intents where `user_id` is either the payer or the payee, newest first.
    async fn fetch_intents_for_user(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Page<PaymentIntent>, LedgerError>;

    /// Intents created before `created_before` whose collection is still unresolved (`Initiated` or
    /// `AwaitingCollectionResult`), oldest first.
    async fn fetch_stale_collections(&self, created_before: DateTime<Utc>) -> Result<Vec<PaymentIntent>, LedgerError>;

    /// Payouts claimed before `claimed_before` that are still waiting for a gateway correlation id, oldest first.
    async fn fetch_uncorrelated_payouts(
        &self,
        claimed_before: DateTime<Utc>,
    ) -> Result<Vec<PaymentIntent>, LedgerError>;

    /// The transition log for an intent, in the order the transitions were applied.
    async fn fetch_intent_events(&self, intent_id: i64) -> Result<Vec<IntentEvent>, LedgerError>;
}
