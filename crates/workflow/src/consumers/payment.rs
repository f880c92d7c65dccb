//! Simulated payment gateway reacting to new orders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bus::{EventEnvelope, EventPublisher};
use chrono::Utc;
use domain::{OrderEvent, OrderStatus};
use store::OrderStore;

use crate::chance::RandomSource;
use crate::error::{ErrorKind, Result};
use crate::service::OrderService;
use crate::supervisor::Shutdown;
use crate::worker::EventHandler;

/// Moves a new order to processing, waits out the simulated gateway
/// latency, then completes it with probability `success_rate`.
///
/// A failed draw leaves the order in processing for the expiry sweep.
pub struct PaymentSimulationConsumer<S, P> {
    service: Arc<OrderService<S, P>>,
    random: Arc<dyn RandomSource>,
    delay: Duration,
    success_rate: f64,
    shutdown: Shutdown,
}

impl<S, P> PaymentSimulationConsumer<S, P>
where
    S: OrderStore,
    P: EventPublisher,
{
    pub fn new(
        service: Arc<OrderService<S, P>>,
        random: Arc<dyn RandomSource>,
        delay: Duration,
        success_rate: f64,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            service,
            random,
            delay,
            success_rate,
            shutdown,
        }
    }
}

#[async_trait]
impl<S, P> EventHandler for PaymentSimulationConsumer<S, P>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    fn name(&self) -> &'static str {
        "payment-simulation"
    }

    fn event_type(&self) -> &'static str {
        OrderEvent::CREATED
    }

    #[tracing::instrument(
        skip(self, envelope),
        fields(order_id = %envelope.order_id, idempotency_key = %envelope.idempotency_key)
    )]
    async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
        envelope.expect_type(OrderEvent::CREATED)?;
        let order_id = envelope.order_id;
        let store = self.service.store();

        let Some(order) = store.find_order(order_id).await? else {
            tracing::warn!("Order not found; discarding event");
            return Ok(());
        };

        if order.is_terminal() {
            tracing::info!(status = %order.status, "Order already settled; discarding event");
            return Ok(());
        }

        // Re-entering processing on redelivery is a harmless rewrite.
        let entered = store
            .transition_order_status(
                order_id,
                &[OrderStatus::Pending, OrderStatus::Processing],
                OrderStatus::Processing,
                Utc::now(),
            )
            .await?;
        if entered.is_none() {
            tracing::info!("Order settled concurrently; discarding event");
            return Ok(());
        }
        tracing::info!("Payment processing started");

        tokio::select! {
            () = tokio::time::sleep(self.delay) => {}
            () = self.shutdown.wait() => {
                tracing::info!("Shutdown during payment; order left processing");
                return Ok(());
            }
        }

        let draw = self.random.next_unit();
        if draw >= self.success_rate {
            metrics::counter!("order_payment_failures_total").increment(1);
            tracing::info!(draw, success_rate = self.success_rate, "Payment failed; order left processing");
            return Ok(());
        }

        let completed = match self.service.transition(order_id, OrderStatus::Completed).await {
            Ok(order) => order,
            Err(e) if matches!(e.kind(), ErrorKind::InvalidTransition | ErrorKind::NotFound) => {
                tracing::info!(error = %e, "Order left processing before payment completed");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        metrics::counter!("orders_completed_total").increment(1);
        tracing::info!("Order completed");
        self.service.publish(&completed.completed_event()).await
    }
}
