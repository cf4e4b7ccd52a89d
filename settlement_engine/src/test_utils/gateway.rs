//! An in-memory [`PaymentGateway`] whose answers are scripted by the test.
//!
//! Unless told otherwise, every request is accepted and given a sequential correlation id (`col-1`, `pay-1`, ...).
//! Accepted requests are remembered by reference, so [`PaymentGateway::find_transfer`] can find them again.
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use crate::traits::{
    CollectionOrder,
    GatewayError,
    PaymentGateway,
    PayoutOrder,
    TransferKind,
    TransferState,
    TransferStatus,
};

#[derive(Default)]
struct Script {
    collections: VecDeque<Result<String, GatewayError>>,
    payouts: VecDeque<Result<String, GatewayError>>,
    statuses: HashMap<String, Result<TransferStatus, GatewayError>>,
    collection_orders: Vec<CollectionOrder>,
    payout_orders: Vec<PayoutOrder>,
    status_queries: Vec<String>,
    accepted: HashMap<(TransferKind, String), String>,
    collection_count: u64,
    payout_count: u64,
}

impl Script {
    /// Transfers nobody scripted a status for are still pending.
    fn status_of(&self, correlation_id: &str) -> Result<TransferStatus, GatewayError> {
        self.statuses.get(correlation_id).cloned().unwrap_or_else(|| {
            Ok(TransferStatus {
                correlation_id: correlation_id.to_string(),
                state: TransferState::Pending,
                receipt: None,
                reason: None,
            })
        })
    }
}

#[derive(Clone, Default)]
pub struct ScriptedGateway {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `delay` before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().expect("Scripted gateway lock poisoned")
    }

    /// The next collection request gets this answer.
    pub fn next_collection(&self, answer: Result<String, GatewayError>) -> &Self {
        self.script().collections.push_back(answer);
        self
    }

    /// The next payout request gets this answer.
    pub fn next_payout(&self, answer: Result<String, GatewayError>) -> &Self {
        self.script().payouts.push_back(answer);
        self
    }

    pub fn set_status(&self, correlation_id: &str, state: TransferState, receipt: Option<&str>) -> &Self {
        let status = TransferStatus {
            correlation_id: correlation_id.to_string(),
            state,
            receipt: receipt.map(String::from),
            reason: None,
        };
        self.script().statuses.insert(correlation_id.to_string(), Ok(status));
        self
    }

    pub fn set_status_error(&self, correlation_id: &str, error: GatewayError) -> &Self {
        self.script().statuses.insert(correlation_id.to_string(), Err(error));
        self
    }

    pub fn collection_orders(&self) -> Vec<CollectionOrder> {
        self.script().collection_orders.clone()
    }

    pub fn payout_orders(&self) -> Vec<PayoutOrder> {
        self.script().payout_orders.clone()
    }

    pub fn status_queries(&self) -> Vec<String> {
        self.script().status_queries.clone()
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl PaymentGateway for ScriptedGateway {
    async fn initiate_collection(&self, order: CollectionOrder) -> Result<String, GatewayError> {
        self.pause().await;
        let mut script = self.script();
        script.collection_count += 1;
        let default = format!("col-{}", script.collection_count);
        let answer = script.collections.pop_front().unwrap_or(Ok(default));
        if let Ok(correlation_id) = &answer {
            script.accepted.insert((TransferKind::Collection, order.reference.clone()), correlation_id.clone());
        }
        script.collection_orders.push(order);
        answer
    }

    async fn initiate_payout(&self, order: PayoutOrder) -> Result<String, GatewayError> {
        self.pause().await;
        let mut script = self.script();
        script.payout_count += 1;
        let default = format!("pay-{}", script.payout_count);
        let answer = script.payouts.pop_front().unwrap_or(Ok(default));
        if let Ok(correlation_id) = &answer {
            script.accepted.insert((TransferKind::Payout, order.reference.clone()), correlation_id.clone());
        }
        script.payout_orders.push(order);
        answer
    }

    async fn query_status(&self, correlation_id: &str) -> Result<TransferStatus, GatewayError> {
        self.pause().await;
        let mut script = self.script();
        script.status_queries.push(correlation_id.to_string());
        script.status_of(correlation_id)
    }

    async fn find_transfer(&self, kind: TransferKind, reference: &str) -> Result<Option<TransferStatus>, GatewayError> {
        self.pause().await;
        let script = self.script();
        match script.accepted.get(&(kind, reference.to_string())) {
            Some(correlation_id) => script.status_of(correlation_id).map(Some),
            None => Ok(None),
        }
    }
}
