use log::*;
use settlement_engine::events::{EventHandlers, EventHooks, NotificationEvent, PayoutFailedEvent};

pub const NOTIFICATION_BUFFER_SIZE: usize = 100;

/// Hooks the engine's notification and payout-failure events up to their delivery.
///
/// Delivery to users belongs to the marketplace's notification service, which picks the events up from the structured
/// log lines written here (target `sps::notifications`). Payout failures are logged at error level so that operators
/// are alerted; the collected funds need a manual retry through the admin API.
pub fn create_notification_event_handlers() -> EventHandlers {
    let mut hooks = EventHooks::default();
    hooks.on_notification(|ev: NotificationEvent| {
        Box::pin(async move {
            info!(
                target: "sps::notifications",
                "📬️ [{}] to {}: {} ({})", ev.kind, ev.recipient, ev.message, ev.link
            );
        })
    });
    hooks.on_payout_failed(|ev: PayoutFailedEvent| {
        Box::pin(async move {
            let PayoutFailedEvent { intent, reason } = ev;
            error!(
                target: "sps::notifications",
                "📬️ Payout of {} {} to {} for payment #{} failed: {reason}. Retry with POST \
                 /api/admin/payments/{}/retry-payout",
                intent.payee_amount, intent.currency, intent.payee_id, intent.id, intent.id
            );
        })
    });
    EventHandlers::new(NOTIFICATION_BUFFER_SIZE, hooks)
}
