use chrono::{DateTime, Utc};
use mockall::mock;
use settlement_engine::{
    db_types::{IntentEvent, Page, Pagination, PaymentIntent, StatisticsSnapshot},
    traits::LedgerError,
    IntentManagement,
    StatisticsManagement,
};

mock! {
    pub IntentManager {}
    impl IntentManagement for IntentManager {
        async fn fetch_intent(&self, id: i64) -> Result<Option<PaymentIntent>, LedgerError>;
        async fn fetch_intent_by_collection_id(&self, correlation_id: &str)
            -> Result<Option<PaymentIntent>, LedgerError>;
        async fn fetch_intent_by_payout_id(&self, correlation_id: &str) -> Result<Option<PaymentIntent>, LedgerError>;
        async fn fetch_intents_for_user(&self, user_id: &str, pagination: Pagination)
            -> Result<Page<PaymentIntent>, LedgerError>;
        async fn fetch_stale_collections(&self, created_before: DateTime<Utc>)
            -> Result<Vec<PaymentIntent>, LedgerError>;
        async fn fetch_uncorrelated_payouts(&self, claimed_before: DateTime<Utc>)
            -> Result<Vec<PaymentIntent>, LedgerError>;
        async fn fetch_intent_events(&self, intent_id: i64) -> Result<Vec<IntentEvent>, LedgerError>;
    }
}

mock! {
    pub StatisticsManager {}
    impl StatisticsManagement for StatisticsManager {
        async fn fetch_statistics(&self) -> Result<StatisticsSnapshot, LedgerError>;
        async fn recompute_statistics(&self) -> Result<StatisticsSnapshot, LedgerError>;
    }
}
