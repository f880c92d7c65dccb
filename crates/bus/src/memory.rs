use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::{BusError, EventEnvelope, EventPublisher, Result};

#[derive(Debug, Default)]
struct BusState {
    subscribers: HashMap<String, Vec<mpsc::UnboundedSender<EventEnvelope>>>,
    /// Present only on recording buses.
    published: Option<Vec<EventEnvelope>>,
    fail_on_publish: bool,
}

/// In-process publish/subscribe channel.
///
/// Every subscriber of a topic receives its own copy of each envelope
/// published to it. Envelopes published before a subscription exists are
/// not replayed. Accepted envelopes are kept only by a bus built with
/// [`recording`](InMemoryEventBus::recording).
#[derive(Debug, Clone, Default)]
pub struct InMemoryEventBus {
    state: Arc<RwLock<BusState>>,
}

impl InMemoryEventBus {
    /// Creates a new bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a bus that also keeps every accepted envelope for inspection.
    pub fn recording() -> Self {
        let state = BusState {
            published: Some(Vec::new()),
            ..BusState::default()
        };
        Self {
            state: Arc::new(RwLock::new(state)),
        }
    }

    /// Subscribes to every envelope published with the given event type.
    pub fn subscribe(&self, event_type: impl Into<String>) -> Subscription {
        let event_type = event_type.into();
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .entry(event_type.clone())
            .or_default()
            .push(tx);

        Subscription {
            event_type,
            receiver: rx,
        }
    }

    /// Delivers an already published envelope again, as a broker retry would.
    ///
    /// Bypasses failure injection and is not recorded in [`published`](Self::published).
    pub fn redeliver(&self, envelope: &EventEnvelope) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        Self::deliver(&mut state, envelope);
    }

    /// Configures the bus to reject publishes.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .fail_on_publish = fail;
    }

    /// Returns every envelope accepted so far, in publish order.
    ///
    /// Always empty unless the bus is [`recording`](Self::recording).
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .clone()
            .unwrap_or_default()
    }

    /// Returns the accepted envelopes of one event type.
    pub fn published_of_type(&self, event_type: &str) -> Vec<EventEnvelope> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .published
            .iter()
            .flatten()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Closes every subscription; receivers see the end of their stream.
    pub fn close(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .subscribers
            .clear();
    }

    fn deliver(state: &mut BusState, envelope: &EventEnvelope) {
        if let Some(senders) = state.subscribers.get_mut(&envelope.event_type) {
            // Drop subscriptions whose receiver is gone.
            senders.retain(|tx| tx.send(envelope.clone()).is_ok());
        }
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    #[tracing::instrument(
        skip(self, envelope),
        fields(event_type = %envelope.event_type, order_id = %envelope.order_id)
    )]
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);

        if state.fail_on_publish {
            metrics::counter!("event_publish_failures_total", "event_type" => envelope.event_type.clone())
                .increment(1);
            return Err(BusError::Transport("broker unavailable".to_string()));
        }

        Self::deliver(&mut state, &envelope);
        metrics::counter!("events_published_total", "event_type" => envelope.event_type.clone())
            .increment(1);
        tracing::debug!(idempotency_key = %envelope.idempotency_key, "Event published");
        if let Some(log) = state.published.as_mut() {
            log.push(envelope);
        }
        Ok(())
    }
}

/// Receiving end of a topic subscription.
#[derive(Debug)]
pub struct Subscription {
    event_type: String,
    receiver: mpsc::UnboundedReceiver<EventEnvelope>,
}

impl Subscription {
    /// The event type this subscription receives.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Waits for the next envelope. Returns `None` once the bus is closed.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.recv().await
    }

    /// Returns the next envelope if one is already queued.
    pub fn try_recv(&mut self) -> Option<EventEnvelope> {
        self.receiver.try_recv().ok()
    }
}
