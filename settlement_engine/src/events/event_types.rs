use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::db_types::PaymentIntent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    CollectionRequested,
    PaymentCompleted,
    PaymentFailed,
    PayoutCompleted,
    PayoutFailed,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::CollectionRequested => "CollectionRequested",
            Self::PaymentCompleted => "PaymentCompleted",
            Self::PaymentFailed => "PaymentFailed",
            Self::PayoutCompleted => "PayoutCompleted",
            Self::PayoutFailed => "PayoutFailed",
        };
        f.write_str(s)
    }
}

/// A message for the marketplace's notification subsystem. Delivery is best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub recipient: String,
    pub kind: NotificationKind,
    pub message: String,
    pub link: String,
}

impl NotificationEvent {
    pub fn new(recipient: &str, kind: NotificationKind, intent: &PaymentIntent) -> Self {
        let amount = format!("{} {}", intent.total_amount, intent.currency);
        let payout = format!("{} {}", intent.payee_amount, intent.currency);
        let message = match kind {
            NotificationKind::CollectionRequested => {
                format!("A payment of {amount} for job {} has been requested from the client", intent.job_id)
            },
            NotificationKind::PaymentCompleted => {
                format!("The payment of {amount} for job {} is complete", intent.job_id)
            },
            NotificationKind::PaymentFailed => {
                let reason = intent.failure_reason.as_deref().unwrap_or("unknown reason");
                format!("The payment of {amount} for job {} failed: {reason}", intent.job_id)
            },
            NotificationKind::PayoutCompleted => format!("{payout} has been paid out to you for job {}", intent.job_id),
            NotificationKind::PayoutFailed => format!(
                "The payout of {payout} for job {} could not be completed. Our team has been notified",
                intent.job_id
            ),
        };
        Self { recipient: recipient.to_string(), kind, message, link: format!("/payments/{}", intent.id) }
    }
}

/// Raised when a payout fails, either synchronously or via the gateway's callback. Collected funds are still held by
/// the platform, so this needs operator attention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutFailedEvent {
    pub intent: PaymentIntent,
    pub reason: String,
}

impl PayoutFailedEvent {
    pub fn new(intent: PaymentIntent, reason: String) -> Self {
        Self { intent, reason }
    }
}
