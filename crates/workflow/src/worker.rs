//! Subscription loop that feeds envelopes to an event handler.

use std::sync::Arc;

use async_trait::async_trait;
use bus::{EventEnvelope, Subscription};
use tokio::task::JoinSet;

use crate::error::Result;
use crate::supervisor::Shutdown;

/// A consumer of one event type.
///
/// Delivery is at least once: `handle` may see the same envelope again
/// and must leave state unchanged the second time.
#[async_trait]
pub trait EventHandler: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// The event type this handler subscribes to.
    fn event_type(&self) -> &'static str;

    async fn handle(&self, envelope: EventEnvelope) -> Result<()>;
}

/// Runs a handler over a subscription, one task per delivered envelope.
///
/// Envelopes for different orders are handled concurrently. On shutdown
/// the worker stops receiving and waits for in-flight handlers to finish.
pub struct ConsumerWorker<H> {
    handler: Arc<H>,
    subscription: Subscription,
}

impl<H: EventHandler> ConsumerWorker<H> {
    pub fn new(handler: Arc<H>, subscription: Subscription) -> Self {
        Self {
            handler,
            subscription,
        }
    }

    pub async fn run(mut self, shutdown: Shutdown) {
        let name = self.handler.name();
        let mut in_flight = JoinSet::new();
        tracing::info!(
            consumer = name,
            event_type = self.handler.event_type(),
            "Consumer started"
        );

        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                received = self.subscription.recv() => {
                    let Some(envelope) = received else {
                        tracing::info!(consumer = name, "Subscription closed");
                        break;
                    };
                    let handler = Arc::clone(&self.handler);
                    in_flight.spawn(dispatch(handler, envelope));
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(consumer = name, error = %e, "Handler task panicked");
                    }
                }
            }
        }

        let draining = in_flight.len();
        if draining > 0 {
            tracing::info!(consumer = name, draining, "Waiting for in-flight events");
        }
        while let Some(joined) = in_flight.join_next().await {
            if let Err(e) = joined {
                tracing::error!(consumer = name, error = %e, "Handler task panicked");
            }
        }
        tracing::info!(consumer = name, "Consumer stopped");
    }
}

async fn dispatch<H: EventHandler>(handler: Arc<H>, envelope: EventEnvelope) {
    let consumer = handler.name();
    if let Err(e) = handler.handle(envelope.clone()).await {
        tracing::error!(
            consumer,
            order_id = %envelope.order_id,
            event_type = %envelope.event_type,
            idempotency_key = %envelope.idempotency_key,
            kind = ?e.kind(),
            error = %e,
            "Event handling failed"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use bus::{EventPublisherExt, InMemoryEventBus};
    use chrono::Utc;
    use common::{OrderId, UserId};
    use domain::{Money, OrderCreatedData, OrderEvent};

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<OrderId>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn event_type(&self) -> &'static str {
            OrderEvent::CREATED
        }

        async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.seen.lock().unwrap().push(envelope.order_id);
            Ok(())
        }
    }

    fn created(id: i64) -> OrderEvent {
        OrderEvent::OrderCreated(OrderCreatedData {
            order_id: OrderId::new(id),
            user_id: UserId::new(1),
            total: Money::from_cents(100),
            created_at: Utc::now(),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_events_drain_on_shutdown() {
        let bus = InMemoryEventBus::new();
        let recorder = Arc::new(Recorder::default());
        let worker = ConsumerWorker::new(recorder.clone(), bus.subscribe(OrderEvent::CREATED));
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(worker.run(shutdown.clone()));

        bus.publish_event(&created(1)).await.unwrap();
        bus.publish_event(&created(2)).await.unwrap();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        shutdown.trigger();
        handle.await.unwrap();

        let mut seen = recorder.seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![OrderId::new(1), OrderId::new(2)]);
    }

    #[tokio::test]
    async fn test_worker_stops_when_bus_closes() {
        let bus = InMemoryEventBus::new();
        let worker = ConsumerWorker::new(
            Arc::new(Recorder::default()),
            bus.subscribe(OrderEvent::CREATED),
        );
        let handle = tokio::spawn(worker.run(Shutdown::new()));

        bus.close();
        handle.await.unwrap();
    }
}
