//! Notification recorders for completed and expired orders.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bus::{EventEnvelope, EventPublisher};
use domain::{DomainEvent, NewNotification, Notification, OrderEvent};
use store::OrderStore;

use crate::error::Result;
use crate::service::OrderService;
use crate::worker::EventHandler;

/// Outbound email side effect.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<()>;
}

/// Stand-in mail gateway: waits a fixed delay and logs the message.
#[derive(Debug, Clone)]
pub struct LoggingEmailSender {
    delay: Duration,
}

impl LoggingEmailSender {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl EmailSender for LoggingEmailSender {
    async fn send(&self, notification: &Notification) -> Result<()> {
        tokio::time::sleep(self.delay).await;
        tracing::info!(
            order_id = %notification.order_id,
            message = %notification.message,
            "Email sent"
        );
        Ok(())
    }
}

/// Records a completion notification and emails it.
///
/// The notification is keyed by the envelope's idempotency key; a
/// redelivered event finds the key taken and sends nothing.
pub struct CompletionNotifier<S, P> {
    service: Arc<OrderService<S, P>>,
    email: Arc<dyn EmailSender>,
}

impl<S, P> CompletionNotifier<S, P> {
    pub fn new(service: Arc<OrderService<S, P>>, email: Arc<dyn EmailSender>) -> Self {
        Self { service, email }
    }
}

#[async_trait]
impl<S, P> EventHandler for CompletionNotifier<S, P>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    fn name(&self) -> &'static str {
        "completion-notifier"
    }

    fn event_type(&self) -> &'static str {
        OrderEvent::COMPLETED
    }

    #[tracing::instrument(
        skip(self, envelope),
        fields(order_id = %envelope.order_id, idempotency_key = %envelope.idempotency_key)
    )]
    async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
        envelope.expect_type(OrderEvent::COMPLETED)?;
        let event: OrderEvent = envelope.decode()?;

        let notification = NewNotification::order_completed(event.order_id())
            .with_idempotency_key(envelope.idempotency_key.as_str());

        let store = self.service.store();
        let Some(saved) = store.save_notification(notification).await? else {
            tracing::info!("Completion already recorded; skipping");
            return Ok(());
        };
        metrics::counter!("notifications_recorded_total", "kind" => saved.kind.as_str())
            .increment(1);

        // No transaction is open across the send.
        self.email.send(&saved).await?;
        store.mark_notification_email_sent(saved.id).await?;
        Ok(())
    }
}

/// Records an expiry notification. No email is sent.
pub struct ExpiryNotifier<S, P> {
    service: Arc<OrderService<S, P>>,
}

impl<S, P> ExpiryNotifier<S, P> {
    pub fn new(service: Arc<OrderService<S, P>>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S, P> EventHandler for ExpiryNotifier<S, P>
where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    fn name(&self) -> &'static str {
        "expiry-notifier"
    }

    fn event_type(&self) -> &'static str {
        OrderEvent::EXPIRED
    }

    #[tracing::instrument(
        skip(self, envelope),
        fields(order_id = %envelope.order_id, idempotency_key = %envelope.idempotency_key)
    )]
    async fn handle(&self, envelope: EventEnvelope) -> Result<()> {
        envelope.expect_type(OrderEvent::EXPIRED)?;
        let OrderEvent::OrderExpired(data) = envelope.decode::<OrderEvent>()? else {
            tracing::warn!("Payload is not an expiry; discarding event");
            return Ok(());
        };

        let notification =
            NewNotification::order_expired(data.order_id, data.expiry_threshold_minutes)
                .with_idempotency_key(envelope.idempotency_key.as_str());

        match self.service.store().save_notification(notification).await? {
            Some(saved) => {
                metrics::counter!("notifications_recorded_total", "kind" => saved.kind.as_str())
                    .increment(1);
            }
            None => tracing::info!("Expiry already recorded; skipping"),
        }
        Ok(())
    }
}
