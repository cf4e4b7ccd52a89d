use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{IntentEvent, Page, Pagination, PaymentIntent},
    settlement_api::errors::SettlementError,
    traits::IntentManagement,
};

/// Read-only access to payments, scoped to the people involved in them.
pub struct HistoryApi<B> {
    db: B,
}

impl<B> Debug for HistoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HistoryApi")
    }
}

impl<B> HistoryApi<B>
where B: IntentManagement
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    /// Fetches a payment on behalf of `user_id`, who must be its payer or payee.
    pub async fn payment_status(&self, id: i64, user_id: &str) -> Result<PaymentIntent, SettlementError> {
        let intent = self.payment_by_id(id).await?;
        if !intent.is_party(user_id) {
            debug!("💻️ User {user_id} asked for payment #{id}, but is not a party to it");
            return Err(SettlementError::NotAuthorized(format!("You are not a party to payment #{id}")));
        }
        Ok(intent)
    }

    /// Fetches any payment. For administrators.
    pub async fn payment_by_id(&self, id: i64) -> Result<PaymentIntent, SettlementError> {
        self.db.fetch_intent(id).await?.ok_or_else(|| SettlementError::NotFound(format!("Payment {id}")))
    }

    /// The payments `user_id` has made or received, newest first.
    pub async fn payment_history(
        &self,
        user_id: &str,
        pagination: Pagination,
    ) -> Result<Page<PaymentIntent>, SettlementError> {
        let page = self.db.fetch_intents_for_user(user_id, pagination).await?;
        trace!("💻️ Page {} of payment history for {user_id}: {} of {}", page.page, page.items.len(), page.total);
        Ok(page)
    }

    pub async fn payment_events(&self, id: i64) -> Result<Vec<IntentEvent>, SettlementError> {
        let events = self.db.fetch_intent_events(id).await?;
        Ok(events)
    }
}
