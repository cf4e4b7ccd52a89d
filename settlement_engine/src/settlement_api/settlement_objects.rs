use serde::{Deserialize, Serialize};

use crate::{
    commission::Split,
    db_types::{Money, PaymentStatus},
};

/// A payer's request to pay for a job. Amounts have already been normalised to minor units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatePaymentRequest {
    pub job_id: String,
    pub application_id: String,
    /// The caller. Must own the job.
    pub payer_id: String,
    /// Mobile-money number that will be debited
    pub payer_contact: String,
    /// Mobile-money number that receives the payout
    pub payee_contact: String,
    pub amount: Money,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiatedPayment {
    pub intent_id: i64,
    pub split: Split,
    pub status: PaymentStatus,
    pub collection_correlation_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Succeeded,
    Failed,
}

/// The gateway's verdict on a collection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionResult {
    pub correlation_id: String,
    pub outcome: TransferOutcome,
    pub receipt: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_code: Option<String>,
}

pub const TIMEOUT_CODE: &str = "TIMEOUT";
/// Failure code for collections the gateway has no record of. They never left this server.
pub const NOT_SUBMITTED_CODE: &str = "NOT_SUBMITTED";

impl CollectionResult {
    pub fn succeeded(correlation_id: &str, receipt: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            outcome: TransferOutcome::Succeeded,
            receipt,
            failure_reason: None,
            failure_code: None,
        }
    }

    pub fn failed(correlation_id: &str, reason: &str, code: Option<String>) -> Self {
        Self {
            correlation_id: correlation_id.to_string(),
            outcome: TransferOutcome::Failed,
            receipt: None,
            failure_reason: Some(reason.to_string()),
            failure_code: code,
        }
    }

    /// The payer never confirmed the debit in time.
    pub fn timed_out(correlation_id: &str) -> Self {
        Self::failed(correlation_id, "The payer did not confirm the payment in time", Some(TIMEOUT_CODE.into()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutResult {
    pub correlation_id: String,
    pub outcome: TransferOutcome,
    pub reason: Option<String>,
}

/// An inbound gateway notification, already authenticated and normalised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayCallback {
    Collection(CollectionResult),
    Payout(PayoutResult),
}

impl GatewayCallback {
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::Collection(r) => &r.correlation_id,
            Self::Payout(r) => &r.correlation_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallbackOutcome {
    /// The callback moved the payment forward.
    Applied,
    /// The payment had already reached the state the callback reports on. Nothing was changed.
    Duplicate,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationReport {
    pub examined: usize,
    pub resolved: usize,
    pub still_pending: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    /// Public base URL of this server. Callback URLs handed to the gateway are built from it.
    pub callback_base_url: String,
    pub currency: String,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self { callback_base_url: "http://localhost:4444".into(), currency: "XOF".into() }
    }
}

impl SettlementConfig {
    pub fn collection_callback_url(&self) -> String {
        format!("{}/callbacks/collection", self.callback_base_url.trim_end_matches('/'))
    }

    pub fn payout_callback_url(&self) -> String {
        format!("{}/callbacks/payout", self.callback_base_url.trim_end_matches('/'))
    }
}
