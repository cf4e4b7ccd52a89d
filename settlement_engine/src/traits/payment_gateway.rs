use serde::{Deserialize, Serialize};
use settle_common::Money;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// No definitive answer: network failure, timeout or credential failure.
    #[error("The payment gateway is unavailable. {0}")]
    Unavailable(String),
    /// The gateway looked at the request and declined it.
    #[error("The payment gateway declined the request. {reason}")]
    Rejected { reason: String, code: Option<String> },
}

impl GatewayError {
    pub fn reason(&self) -> &str {
        match self {
            Self::Unavailable(reason) | Self::Rejected { reason, .. } => reason,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Unavailable(_) => Some("UNAVAILABLE"),
            Self::Rejected { code, .. } => code.as_deref(),
        }
    }
}

/// Debit `amount` from the payer's mobile-money account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOrder {
    pub reference: String,
    pub payer_contact: String,
    pub amount: Money,
    pub description: String,
    pub callback_url: String,
}

/// Credit `amount` to the payee's mobile-money account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutOrder {
    pub reference: String,
    pub payee_contact: String,
    pub amount: Money,
    pub remarks: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferKind {
    Collection,
    Payout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferState {
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatus {
    pub correlation_id: String,
    pub state: TransferState,
    pub receipt: Option<String>,
    pub reason: Option<String>,
}

/// The capability surface of the external mobile-money gateway.
///
/// Requests only start a transfer. A successful return carries the gateway's correlation id; the final outcome is
/// reported later through a callback. Implementations must bound every call with a timeout and report it as
/// [`GatewayError::Unavailable`].
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn initiate_collection(&self, order: CollectionOrder) -> Result<String, GatewayError>;

    async fn initiate_payout(&self, order: PayoutOrder) -> Result<String, GatewayError>;

    async fn query_status(&self, correlation_id: &str) -> Result<TransferStatus, GatewayError>;

    /// Looks a transfer up by the reference we gave it. `Ok(None)` means the gateway has no record of it.
    async fn find_transfer(&self, kind: TransferKind, reference: &str) -> Result<Option<TransferStatus>, GatewayError>;
}
