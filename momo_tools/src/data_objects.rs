use std::fmt::Display;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use settle_common::{Money, Secret};

//--------------------------------------     AccessToken      ---------------------------------------------------------
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: Secret<String>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: String, expires_at: DateTime<Utc>) -> Self {
        Self { token: Secret::new(token), expires_at }
    }

    /// A token is considered usable if it will still be valid `margin` from `now`. The margin covers the time a request
    /// spends in flight.
    pub fn is_usable_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TokenRequest<'a> {
    pub api_key: &'a str,
    pub api_secret: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    /// Lifetime of the token in seconds
    pub expires_in: i64,
}

//--------------------------------------   Collection/Payout   --------------------------------------------------------
/// A request to debit `amount` from the payer's mobile-money account.
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub payer_contact: String,
    pub amount: Money,
    /// Our reference for the transfer. The gateway echoes it in callbacks.
    pub reference: String,
    pub description: String,
    /// Where the gateway should deliver the asynchronous result
    pub callback_url: String,
}

/// A request to credit `amount` to the payee's mobile-money account.
#[derive(Debug, Clone)]
pub struct PayoutRequest {
    pub payee_contact: String,
    pub amount: Money,
    pub reference: String,
    pub remarks: String,
    pub callback_url: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct TransferBody<'a> {
    pub site_id: &'a str,
    pub currency: &'a str,
    pub contact: &'a str,
    pub amount: i64,
    pub reference: &'a str,
    pub description: &'a str,
    pub notify_url: &'a str,
}

/// The gateway's synchronous acknowledgement of a collection or payout request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReceipt {
    /// The gateway-assigned correlation id for this transfer
    pub transaction_id: String,
    pub status: TransactionState,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default, alias = "description")]
    pub message: Option<String>,
}

//--------------------------------------  TransactionStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    #[serde(alias = "INITIATED", alias = "ACCEPTED")]
    Pending,
    #[serde(alias = "SUCCESS", alias = "COMPLETED")]
    Successful,
    #[serde(alias = "FAILURE", alias = "REFUSED", alias = "CANCELLED", alias = "EXPIRED")]
    Failed,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Successful => write!(f, "Successful"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// The result of a status query for a single transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    pub transaction_id: String,
    pub status: TransactionState,
    /// The operator's receipt reference, present once funds have moved
    #[serde(default)]
    pub receipt: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}
