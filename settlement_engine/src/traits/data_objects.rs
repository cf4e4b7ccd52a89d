use std::fmt::Display;

use chrono::{DateTime, Utc};

use crate::db_types::{PaymentIntent, PaymentStatus, PayoutStatus};

/// A single, guarded change to a payment intent.
///
/// Each variant knows which state the intent must currently be in for the change to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentTransition {
    /// `Initiated` -> `AwaitingCollectionResult`. The gateway accepted the collection request.
    CollectionRequested { correlation_id: String },
    /// `from` -> `Failed`. `from` is `Initiated` for synchronous failures and `AwaitingCollectionResult` for callbacks.
    CollectionFailed { from: PaymentStatus, reason: String, code: Option<String> },
    /// `AwaitingCollectionResult` -> `Completed`. The job is marked as fulfilled in the same transaction.
    CollectionCompleted { receipt: Option<String>, completed_at: DateTime<Utc> },
    /// Payout `from` -> `AwaitingPayoutResult` on a `Completed` intent. `from` is `None` for the automatic payout and
    /// `PayoutFailed` for an explicit retry. Claiming the payout before calling the gateway is what prevents a double
    /// payout. `reference` is what the gateway will know this payout attempt by.
    PayoutClaimed { from: PayoutStatus, reference: String },
    /// Records the gateway's correlation id on a claimed payout.
    PayoutRequested { correlation_id: String },
    /// `AwaitingPayoutResult` -> `PayoutFailed`
    PayoutFailed { reason: String },
    /// `AwaitingPayoutResult` -> `PayoutCompleted`
    PayoutCompleted { completed_at: DateTime<Utc> },
}

impl IntentTransition {
    /// The primary state the intent must be in for this transition to apply.
    pub fn required_status(&self) -> PaymentStatus {
        match self {
            Self::CollectionRequested { .. } => PaymentStatus::Initiated,
            Self::CollectionFailed { from, .. } => *from,
            Self::CollectionCompleted { .. } => PaymentStatus::AwaitingCollectionResult,
            _ => PaymentStatus::Completed,
        }
    }

    /// The payout sub-state the intent must be in, if the transition cares about it.
    pub fn required_payout_status(&self) -> Option<PayoutStatus> {
        match self {
            Self::PayoutClaimed { from, .. } => Some(*from),
            Self::PayoutRequested { .. } | Self::PayoutFailed { .. } | Self::PayoutCompleted { .. } => {
                Some(PayoutStatus::AwaitingPayoutResult)
            },
            _ => None,
        }
    }

    pub fn target_status(&self) -> PaymentStatus {
        match self {
            Self::CollectionRequested { .. } => PaymentStatus::AwaitingCollectionResult,
            Self::CollectionFailed { .. } => PaymentStatus::Failed,
            _ => PaymentStatus::Completed,
        }
    }

    pub fn target_payout_status(&self) -> PayoutStatus {
        match self {
            Self::CollectionRequested { .. } | Self::CollectionFailed { .. } | Self::CollectionCompleted { .. } => {
                PayoutStatus::None
            },
            Self::PayoutClaimed { .. } | Self::PayoutRequested { .. } => PayoutStatus::AwaitingPayoutResult,
            Self::PayoutFailed { .. } => PayoutStatus::PayoutFailed,
            Self::PayoutCompleted { .. } => PayoutStatus::PayoutCompleted,
        }
    }

    pub fn is_payout_phase(&self) -> bool {
        self.required_payout_status().is_some()
    }

    /// True if the transition moves the primary state, and so changes the statistics rollup.
    pub fn changes_primary_status(&self) -> bool {
        self.required_status() != self.target_status()
    }

    /// A short description for the transition log.
    pub fn detail(&self) -> Option<String> {
        match self {
            Self::CollectionRequested { correlation_id } => Some(format!("collection id {correlation_id}")),
            Self::CollectionFailed { reason, code: Some(code), .. } => Some(format!("[{code}] {reason}")),
            Self::CollectionFailed { reason, code: None, .. } => Some(reason.clone()),
            Self::CollectionCompleted { receipt, .. } => receipt.as_ref().map(|r| format!("receipt {r}")),
            Self::PayoutClaimed { from, reference } => Some(format!("claimed from {from} as {reference}")),
            Self::PayoutRequested { correlation_id } => Some(format!("payout id {correlation_id}")),
            Self::PayoutFailed { reason } => Some(reason.clone()),
            Self::PayoutCompleted { .. } => None,
        }
    }
}

impl Display for IntentTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_payout_phase() {
            let from = self.required_payout_status().unwrap_or(PayoutStatus::None);
            write!(f, "payout {from} -> {}", self.target_payout_status())
        } else {
            write!(f, "{} -> {}", self.required_status(), self.target_status())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionResult {
    /// The transition was applied. Holds the updated intent.
    Applied(PaymentIntent),
    /// The intent was not in the required state. Holds the intent as it currently is.
    Unchanged(PaymentIntent),
}

impl TransitionResult {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }

    pub fn intent(&self) -> &PaymentIntent {
        match self {
            Self::Applied(intent) | Self::Unchanged(intent) => intent,
        }
    }

    pub fn into_intent(self) -> PaymentIntent {
        match self {
            Self::Applied(intent) | Self::Unchanged(intent) => intent,
        }
    }
}
