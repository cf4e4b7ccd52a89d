//! Inbound dispatch for gateway callbacks
//!
//! The callback routes do not run settlement logic themselves. They verify and normalise the payload, push it onto
//! this queue and acknowledge the gateway. A single handler task drains the queue and feeds each callback to
//! [`SettlementApi::handle_callback`], which is idempotent, so redelivered callbacks are harmless.
use std::sync::Arc;

use log::*;
use settlement_engine::{
    events::{EventHandler, EventProducer},
    settlement_objects::{CallbackOutcome, GatewayCallback},
    SettlementError,
};

use crate::server::ServerSettlementApi;

pub const CALLBACK_QUEUE_SIZE: usize = 250;

/// The sending half of the callback queue. Cheap to clone; one per HTTP worker.
#[derive(Clone)]
pub struct CallbackQueue {
    producer: EventProducer<GatewayCallback>,
}

impl CallbackQueue {
    /// Queues a callback, waiting for room if the queue is full. Returns `false` if the handler has stopped.
    pub async fn enqueue(&self, callback: GatewayCallback) -> bool {
        trace!("🔐️ Queueing callback for {}", callback.correlation_id());
        self.producer.publish_event_wait(callback).await
    }
}

/// Builds the callback queue and the handler that drains it. Spawn the handler with
/// [`EventHandler::start_handler`]; it runs until every [`CallbackQueue`] clone has been dropped.
pub fn create_callback_queue(
    api: ServerSettlementApi,
    buffer_size: usize,
) -> (CallbackQueue, EventHandler<GatewayCallback>) {
    let api = Arc::new(api);
    let handler = EventHandler::new(
        buffer_size,
        Arc::new(move |callback: GatewayCallback| {
            let api = Arc::clone(&api);
            Box::pin(async move {
                let correlation_id = callback.correlation_id().to_string();
                log_outcome(&correlation_id, api.handle_callback(callback).await);
            })
        }),
    );
    let queue = CallbackQueue { producer: handler.subscribe() };
    (queue, handler)
}

fn log_outcome(correlation_id: &str, outcome: Result<CallbackOutcome, SettlementError>) {
    match outcome {
        Ok(CallbackOutcome::Applied) => debug!("🔐️ Callback for {correlation_id} applied"),
        Ok(CallbackOutcome::Duplicate) => info!("🔐️ Duplicate callback for {correlation_id} ignored"),
        Err(SettlementError::UnknownCorrelation(id)) => {
            warn!("🔐️ Callback for unknown gateway reference {id}. Nothing was changed. Needs investigation.")
        },
        Err(e) => error!("🔐️ Could not process callback for {correlation_id}. {e}"),
    }
}
