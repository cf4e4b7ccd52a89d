use std::fmt::Display;

use momo_tools::TransactionState;
use serde::{Deserialize, Serialize};
use settle_common::Money;
use settlement_engine::{
    commission::CommissionRate,
    db_types::{IntentEvent, PaymentIntent},
    settlement_objects::{CollectionResult, InitiatePaymentRequest, PayoutResult, TransferOutcome},
};

use crate::errors::ServerError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//--------------------------------------     LooseAmount      ---------------------------------------------------------
/// An amount as clients and gateways actually send it: a JSON number or a string, in major units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LooseAmount {
    Number(serde_json::Number),
    Text(String),
}

impl LooseAmount {
    /// Normalises the amount into minor units. Zero, negative and over-precise amounts are rejected.
    pub fn to_money(&self, decimals: u32) -> Result<Money, ServerError> {
        let text = match self {
            LooseAmount::Number(n) => n.to_string(),
            LooseAmount::Text(s) => s.clone(),
        };
        let amount = Money::from_major_units(&text, decimals).map_err(|e| ServerError::InvalidAmount(e.to_string()))?;
        if !amount.is_positive() {
            return Err(ServerError::InvalidAmount(format!("The amount must be positive, but was {text}")));
        }
        Ok(amount)
    }
}

//--------------------------------------  Payment initiation  ---------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequestBody {
    pub job_id: String,
    pub application_id: String,
    pub amount: LooseAmount,
    pub payer_contact: String,
    pub payee_contact: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl PaymentRequestBody {
    pub fn into_request(self, payer_id: &str, decimals: u32) -> Result<InitiatePaymentRequest, ServerError> {
        let amount = self.amount.to_money(decimals)?;
        Ok(InitiatePaymentRequest {
            job_id: self.job_id.trim().to_string(),
            application_id: self.application_id.trim().to_string(),
            payer_id: payer_id.to_string(),
            payer_contact: self.payer_contact.trim().to_string(),
            payee_contact: self.payee_contact.trim().to_string(),
            amount,
            description: self.description.filter(|d| !d.trim().is_empty()),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HistoryParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// A payment together with its transition log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub payment: PaymentIntent,
    pub events: Vec<IntentEvent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionRateBody {
    pub rate: CommissionRate,
}

//--------------------------------------   Gateway callbacks   --------------------------------------------------------
/// The gateway's notification that a collection reached a final state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionCallbackBody {
    pub transaction_id: String,
    pub status: TransactionState,
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default, alias = "message")]
    pub reason: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    /// Echo of the collected amount. Informational only; the ledger's amount is authoritative.
    #[serde(default)]
    pub amount: Option<LooseAmount>,
}

impl CollectionCallbackBody {
    /// `None` for a non-final status, which carries nothing to apply.
    pub fn into_result(self) -> Option<CollectionResult> {
        match self.status {
            TransactionState::Pending => None,
            TransactionState::Successful => Some(CollectionResult::succeeded(&self.transaction_id, self.receipt)),
            TransactionState::Failed => {
                let reason = self.reason.unwrap_or_else(|| "The gateway reported the collection as failed".into());
                Some(CollectionResult::failed(&self.transaction_id, &reason, self.code))
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoutCallbackBody {
    pub transaction_id: String,
    pub status: TransactionState,
    #[serde(default, alias = "message")]
    pub reason: Option<String>,
}

impl PayoutCallbackBody {
    pub fn into_result(self) -> Option<PayoutResult> {
        let outcome = match self.status {
            TransactionState::Pending => return None,
            TransactionState::Successful => TransferOutcome::Succeeded,
            TransactionState::Failed => TransferOutcome::Failed,
        };
        Some(PayoutResult { correlation_id: self.transaction_id, outcome, reason: self.reason })
    }
}

/// The gateway gave up waiting for the payer to approve a collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutCallbackBody {
    pub transaction_id: String,
}

impl TimeoutCallbackBody {
    pub fn into_result(self) -> CollectionResult {
        CollectionResult::timed_out(&self.transaction_id)
    }
}
