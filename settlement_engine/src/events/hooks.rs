use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{EventHandler, EventProducer, Handler, NotificationEvent, PayoutFailedEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub notification_producer: Vec<EventProducer<NotificationEvent>>,
    pub payout_failed_producer: Vec<EventProducer<PayoutFailedEvent>>,
}

impl EventProducers {
    pub fn notify(&self, event: NotificationEvent) {
        for producer in &self.notification_producer {
            producer.publish_event(event.clone());
        }
    }

    pub fn payout_failed(&self, event: PayoutFailedEvent) {
        for producer in &self.payout_failed_producer {
            producer.publish_event(event.clone());
        }
    }
}

pub struct EventHandlers {
    pub on_notification: Option<EventHandler<NotificationEvent>>,
    pub on_payout_failed: Option<EventHandler<PayoutFailedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_notification = hooks.on_notification.map(|f| EventHandler::new(buffer_size, f));
        let on_payout_failed = hooks.on_payout_failed.map(|f| EventHandler::new(buffer_size, f));
        Self { on_notification, on_payout_failed }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_notification {
            result.notification_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_failed {
            result.payout_failed_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_notification {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_payout_failed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_notification: Option<Handler<NotificationEvent>>,
    pub on_payout_failed: Option<Handler<PayoutFailedEvent>>,
}

impl EventHooks {
    pub fn on_notification<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(NotificationEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_notification = Some(Arc::new(f));
        self
    }

    pub fn on_payout_failed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payout_failed = Some(Arc::new(f));
        self
    }
}
