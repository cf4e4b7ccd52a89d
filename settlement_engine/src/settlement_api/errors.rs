use thiserror::Error;

use crate::{
    commission::CommissionError,
    traits::{GatewayError, LedgerError},
};

/// Everything that can go wrong in a settlement operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SettlementError {
    #[error("Invalid amount. {0}")]
    InvalidAmount(String),
    #[error("Invalid request. {0}")]
    ValidationError(String),
    #[error("Not authorized. {0}")]
    NotAuthorized(String),
    #[error("Job {job_id} (application {application_id}) has already been paid, or a payment is in progress")]
    AlreadyPaid { job_id: String, application_id: String },
    #[error("{0} was not found")]
    NotFound(String),
    #[error("The payment gateway is unavailable. {0}")]
    GatewayUnavailable(String),
    #[error("The payment gateway declined the request. {reason}")]
    GatewayRejected { reason: String, code: Option<String> },
    #[error("No payment is associated with gateway reference {0}")]
    UnknownCorrelation(String),
    #[error("The payout could not be started. {0}")]
    PayoutFailure(String),
    #[error("A payout cannot be started for this payment. {0}")]
    PayoutNotAllowed(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl SettlementError {
    /// A stable, machine-readable name for the error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "InvalidAmount",
            Self::ValidationError(_) => "ValidationError",
            Self::NotAuthorized(_) => "NotAuthorized",
            Self::AlreadyPaid { .. } => "AlreadyPaid",
            Self::NotFound(_) => "NotFound",
            Self::GatewayUnavailable(_) => "GatewayUnavailable",
            Self::GatewayRejected { .. } => "GatewayRejected",
            Self::UnknownCorrelation(_) => "UnknownCorrelation",
            Self::PayoutFailure(_) => "PayoutFailure",
            Self::PayoutNotAllowed(_) => "PayoutNotAllowed",
            Self::DatabaseError(_) => "DatabaseError",
        }
    }
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::LiveIntentExists { job_id, application_id } => Self::AlreadyPaid { job_id, application_id },
            LedgerError::IntentNotFound(id) => Self::NotFound(format!("Payment {id}")),
            LedgerError::DatabaseError(s) | LedgerError::InvalidData(s) => Self::DatabaseError(s),
        }
    }
}

impl From<CommissionError> for SettlementError {
    fn from(e: CommissionError) -> Self {
        match e {
            CommissionError::InvalidAmount(_) | CommissionError::Overflow(_) => Self::InvalidAmount(e.to_string()),
            CommissionError::RateOutOfRange(_) | CommissionError::InvalidRate(_) => {
                Self::ValidationError(e.to_string())
            },
        }
    }
}

impl From<GatewayError> for SettlementError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Unavailable(s) => Self::GatewayUnavailable(s),
            GatewayError::Rejected { reason, code } => Self::GatewayRejected { reason, code },
        }
    }
}
