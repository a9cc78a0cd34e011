//! Engine Event Broadcasting
//!
//! Events are broadcast using `tokio::sync::broadcast`, a multi-producer,
//! multi-consumer channel. Every subscriber receives a copy of each event.
//! A subscriber that falls more than the channel capacity behind skips the
//! overwritten events and keeps listening.

use crate::shared::event::{EngineEvent, EventType};
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;

/// Broadcast channel owned by the engine
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Broadcast an event to all subscribers
    ///
    /// # Returns
    ///
    /// Number of active subscribers that received the event (0 if no subscribers)
    pub fn publish(&self, event: EngineEvent) -> usize {
        match self.tx.send(event) {
            Ok(subscriber_count) => {
                tracing::trace!("[Realtime] Event broadcast to {} subscribers", subscriber_count);
                subscriber_count
            }
            Err(e) => {
                // No subscribers, that's okay
                tracing::debug!("[Realtime] No subscribers to receive event: {:?}", e.0.event_type());
                0
            }
        }
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
            filter: None,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Run `handler` for every event on a background task.
    ///
    /// Must be called inside a tokio runtime. The listener stops when the
    /// returned handle is dropped or disposed.
    pub fn listen<F>(&self, mut handler: F) -> ListenerHandle
    where
        F: FnMut(EngineEvent) + Send + 'static,
    {
        let mut subscription = self.subscribe();
        let task = tokio::spawn(async move {
            while let Some(event) = subscription.recv().await {
                handler(event);
            }
        });
        ListenerHandle { task }
    }
}

/// Owned subscription token
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<EngineEvent>,
    filter: Option<BTreeSet<EventType>>,
}

impl Subscription {
    /// Only deliver events of the given types
    pub fn only<I>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = EventType>,
    {
        self.filter = Some(types.into_iter().collect());
        self
    }

    fn wants(&self, event: &EngineEvent) -> bool {
        self.filter
            .as_ref()
            .map_or(true, |types| types.contains(&event.event_type()))
    }

    /// Next matching event; `None` once the bus is gone
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("[Realtime] Subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next matching event already delivered, without waiting
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if self.wants(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!("[Realtime] Subscriber lagged, skipped {} events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every matching event already delivered
    pub fn drain(&mut self) -> Vec<EngineEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// End the subscription
    pub fn dispose(self) {}
}

/// Background listener; aborted on drop
#[derive(Debug)]
pub struct ListenerHandle {
    task: JoinHandle<()>,
}

impl ListenerHandle {
    pub fn dispose(self) {}

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
