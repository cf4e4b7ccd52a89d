//! Fire-and-forget pub-sub plumbing for settlement events
//!
//! Components publish events onto a bounded channel and a single handler task drains it, running the subscriber's
//! async callback for each event on its own task. Handlers see only the event itself, never the engine's state.
//!
//! Publishing never waits. If the channel is full or the handler has gone away, the event is dropped and a warning is
//! logged, so a slow or broken subscriber cannot hold up a settlement transition.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight handlers to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Without this, the channel would never close
        drop(self.sender);
        let mut jobs = JoinSet::new();
        while let Some(ev) = self.listener.recv().await {
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            jobs.spawn(async move { (handler)(ev).await });
            // Reap whatever has already finished so the set does not grow without bound
            while let Some(done) = jobs.try_join_next() {
                if let Err(e) = done {
                    warn!("📬️ An event handler panicked or was cancelled: {e}");
                }
            }
        }
        debug!("📬️ All producers have gone. Waiting for {} outstanding handlers", jobs.len());
        while let Some(done) = jobs.join_next().await {
            if let Err(e) = done {
                warn!("📬️ An event handler panicked or was cancelled: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Queues the event for the handler. Returns `false` if it was dropped.
    pub fn publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("📬️ Event channel is full. Dropping event");
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("📬️ Event handler has shut down. Dropping event");
                false
            },
        }
    }

    /// Queues the event, waiting for space in the channel if necessary. Use this only where the caller can afford to
    /// wait, e.g. an inbound queue that must not lose messages.
    pub async fn publish_event_wait(&self, event: E) -> bool {
        match self.sender.send(event).await {
            Ok(()) => true,
            Err(e) => {
                error!("📬️ Failed to send event: {e}");
                false
            },
        }
    }
}
