use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use serde::{Deserialize, Serialize};
pub use settle_common::Money;
use sqlx::{FromRow, Type};
use thiserror::Error;

use crate::commission::{CommissionRate, Split};

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------       JobStatus       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Open,
    InProgress,
    /// The job has been paid for. Set by the settlement engine when the collection succeeds.
    Fulfilled,
    Cancelled,
}

impl Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Open => write!(f, "open"),
            JobStatus::InProgress => write!(f, "in_progress"),
            JobStatus::Fulfilled => write!(f, "fulfilled"),
            JobStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

//--------------------------------------   ApplicationStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Pending,
    Accepted,
    Rejected,
    Withdrawn,
}

impl Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplicationStatus::Pending => write!(f, "pending"),
            ApplicationStatus::Accepted => write!(f, "accepted"),
            ApplicationStatus::Rejected => write!(f, "rejected"),
            ApplicationStatus::Withdrawn => write!(f, "withdrawn"),
        }
    }
}

//--------------------------------------          Job          ---------------------------------------------------------
/// The parts of a job posting that settlement cares about. Jobs are owned by the marketplace; the engine only reads
/// them and marks them as fulfilled.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    /// The user that posted the job. Only the owner may pay for it.
    pub owner_id: String,
    pub title: String,
    pub status: JobStatus,
    pub fulfilled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct JobApplication {
    pub id: String,
    pub job_id: String,
    /// The service provider who applied. They are the payee once the application is accepted.
    pub applicant_id: String,
    pub status: ApplicationStatus,
}

//--------------------------------------     PaymentStatus     ---------------------------------------------------------
/// Primary state of a payment intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    /// The intent exists, but the collection request has not been accepted by the gateway yet.
    Initiated,
    /// The gateway accepted the collection request. Waiting for its callback.
    AwaitingCollectionResult,
    /// Funds were collected from the payer.
    Completed,
    /// The collection was declined, timed out or failed to start.
    Failed,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Initiated => write!(f, "Initiated"),
            PaymentStatus::AwaitingCollectionResult => write!(f, "AwaitingCollectionResult"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Initiated" => Ok(Self::Initiated),
            "AwaitingCollectionResult" => Ok(Self::AwaitingCollectionResult),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

impl From<String> for PaymentStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payment status: {value}. But this conversion cannot fail. Defaulting to Failed");
            PaymentStatus::Failed
        })
    }
}

//--------------------------------------     PayoutStatus      ---------------------------------------------------------
/// Payout sub-state. Only meaningful once the primary state is [`PaymentStatus::Completed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    None,
    AwaitingPayoutResult,
    PayoutCompleted,
    PayoutFailed,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::PayoutCompleted | Self::PayoutFailed)
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::None => write!(f, "None"),
            PayoutStatus::AwaitingPayoutResult => write!(f, "AwaitingPayoutResult"),
            PayoutStatus::PayoutCompleted => write!(f, "PayoutCompleted"),
            PayoutStatus::PayoutFailed => write!(f, "PayoutFailed"),
        }
    }
}

impl FromStr for PayoutStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "AwaitingPayoutResult" => Ok(Self::AwaitingPayoutResult),
            "PayoutCompleted" => Ok(Self::PayoutCompleted),
            "PayoutFailed" => Ok(Self::PayoutFailed),
            s => Err(ConversionError(format!("Invalid payout status: {s}"))),
        }
    }
}

impl From<String> for PayoutStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid payout status: {value}. But this conversion cannot fail. Defaulting to None");
            PayoutStatus::None
        })
    }
}

//--------------------------------------     PaymentIntent     ---------------------------------------------------------
/// One attempt to pay for a job through the two-phase collect-then-payout flow.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: i64,
    pub job_id: String,
    pub application_id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub payer_contact: String,
    pub payee_contact: String,
    pub description: Option<String>,
    pub currency: String,
    pub total_amount: Money,
    pub payee_amount: Money,
    pub commission_amount: Money,
    #[sqlx(try_from = "String")]
    pub commission_rate: CommissionRate,
    pub status: PaymentStatus,
    pub payout_status: PayoutStatus,
    pub collection_correlation_id: Option<String>,
    pub payout_correlation_id: Option<String>,
    /// The reference we gave the gateway for the current payout attempt
    pub payout_reference: Option<String>,
    pub collection_receipt: Option<String>,
    pub failure_reason: Option<String>,
    pub failure_code: Option<String>,
    pub payout_failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub payout_completed_at: Option<DateTime<Utc>>,
}

impl PaymentIntent {
    /// The reference we hand to the gateway, and which it echoes back to us.
    pub fn reference(&self) -> String {
        format!("sps-intent-{}", self.id)
    }

    pub fn split(&self) -> Split {
        Split {
            total: self.total_amount,
            payee_amount: self.payee_amount,
            commission: self.commission_amount,
            rate: self.commission_rate,
        }
    }

    /// True if `user_id` is the payer or the payee of this intent.
    pub fn is_party(&self, user_id: &str) -> bool {
        self.payer_id == user_id || self.payee_id == user_id
    }

    pub fn is_settled(&self) -> bool {
        self.status == PaymentStatus::Failed ||
            (self.status == PaymentStatus::Completed && self.payout_status.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPaymentIntent {
    pub job_id: String,
    pub application_id: String,
    pub payer_id: String,
    pub payee_id: String,
    pub payer_contact: String,
    pub payee_contact: String,
    pub description: Option<String>,
    pub currency: String,
    pub split: Split,
}

//--------------------------------------      IntentEvent      ---------------------------------------------------------
/// A row in the append-only transition log for an intent.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct IntentEvent {
    pub id: i64,
    pub intent_id: i64,
    /// "collection" or "payout"
    pub phase: String,
    pub from_state: String,
    pub to_state: String,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

//--------------------------------------  StatisticsSnapshot   ---------------------------------------------------------
/// The derived rollup over all payment intents.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub initiated_count: i64,
    pub awaiting_count: i64,
    pub completed_count: i64,
    pub failed_count: i64,
    pub completed_volume: Money,
    pub commission_volume: Money,
    pub average_completed_amount: Money,
    pub first_completed_at: Option<DateTime<Utc>>,
    pub last_completed_at: Option<DateTime<Utc>>,
}

impl StatisticsSnapshot {
    pub fn total_count(&self) -> i64 {
        self.initiated_count + self.awaiting_count + self.completed_count + self.failed_count
    }
}

/// The change to the statistics rollup caused by one committed primary-state transition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsDelta {
    pub initiated: i64,
    pub awaiting: i64,
    pub completed: i64,
    pub failed: i64,
    pub completed_volume: Money,
    pub commission_volume: Money,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StatisticsDelta {
    /// The delta for an intent that moved from `from` (or was just created, if `None`) into its current state.
    pub fn for_transition(from: Option<PaymentStatus>, intent: &PaymentIntent) -> Self {
        let mut delta = Self::default();
        if let Some(from) = from {
            *delta.counter(from) -= 1;
        }
        *delta.counter(intent.status) += 1;
        if intent.status == PaymentStatus::Completed {
            delta.completed_volume = intent.total_amount;
            delta.commission_volume = intent.commission_amount;
            delta.completed_at = intent.completed_at;
        }
        delta
    }

    fn counter(&mut self, status: PaymentStatus) -> &mut i64 {
        match status {
            PaymentStatus::Initiated => &mut self.initiated,
            PaymentStatus::AwaitingCollectionResult => &mut self.awaiting,
            PaymentStatus::Completed => &mut self.completed,
            PaymentStatus::Failed => &mut self.failed,
        }
    }
}

//--------------------------------------      Pagination       ---------------------------------------------------------
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// 1-based page number
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { page: 1, per_page: 20 }
    }
}

impl Pagination {
    /// Clamps out-of-range values into something sensible rather than failing the request.
    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        let default = Self::default();
        let page = page.unwrap_or(default.page).max(1);
        let per_page = per_page.unwrap_or(default.per_page).clamp(1, MAX_PAGE_SIZE);
        Self { page, per_page }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
}
