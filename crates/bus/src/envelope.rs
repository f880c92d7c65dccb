use chrono::{DateTime, Utc};
use common::OrderId;
use domain::DomainEvent;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use uuid::Uuid;

use crate::{BusError, Result};

/// Unique identifier for a single publication.
///
/// A redelivered envelope keeps its id; a re-published event gets a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A domain event on the wire, with the routing fields consumers key on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique identifier for this publication.
    pub event_id: EventId,

    /// The event type tag, also used as the topic (e.g. "OrderCreated").
    pub event_type: String,

    /// The order this event is about.
    pub order_id: OrderId,

    /// Stable across redeliveries of the same state transition.
    pub idempotency_key: String,

    /// When the transition happened.
    pub occurred_at: DateTime<Utc>,

    /// The event payload as JSON.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wraps a domain event.
    pub fn from_event<E: DomainEvent>(event: &E) -> Result<Self> {
        Ok(Self {
            event_id: EventId::new(),
            event_type: event.event_type().to_string(),
            order_id: event.order_id(),
            idempotency_key: event.idempotency_key(),
            occurred_at: event.occurred_at(),
            payload: serde_json::to_value(event)?,
        })
    }

    /// Decodes the payload back into a domain event.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Fails unless this envelope carries `expected`.
    pub fn expect_type(&self, expected: &'static str) -> Result<()> {
        if self.event_type == expected {
            Ok(())
        } else {
            Err(BusError::UnexpectedEventType {
                expected,
                actual: self.event_type.clone(),
            })
        }
    }
}
