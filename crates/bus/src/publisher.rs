use std::sync::Arc;

use async_trait::async_trait;
use domain::DomainEvent;

use crate::{EventEnvelope, Result};

/// Fire-and-forget publish side of the event channel.
///
/// A returned error means the transport did not accept the envelope; the
/// caller decides whether to retry or log.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes an envelope to the topic named by its event type.
    async fn publish(&self, envelope: EventEnvelope) -> Result<()>;
}

#[async_trait]
impl<P: EventPublisher + ?Sized> EventPublisher for Arc<P> {
    async fn publish(&self, envelope: EventEnvelope) -> Result<()> {
        (**self).publish(envelope).await
    }
}

/// Convenience methods available on every [`EventPublisher`].
#[async_trait]
pub trait EventPublisherExt: EventPublisher {
    /// Wraps a domain event in an envelope and publishes it.
    async fn publish_event<E: DomainEvent>(&self, event: &E) -> Result<()> {
        let envelope = EventEnvelope::from_event(event)?;
        self.publish(envelope).await
    }
}

impl<P: EventPublisher + ?Sized> EventPublisherExt for P {}
