//! Core domain event trait.

use chrono::{DateTime, Utc};
use common::OrderId;
use serde::{Serialize, de::DeserializeOwned};

/// Trait for domain events.
///
/// Domain events represent facts that have happened in the domain.
/// They are immutable and should be named in past tense.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + Clone {
    /// Returns the event type name.
    ///
    /// This doubles as the topic the event is published on.
    fn event_type(&self) -> &'static str;

    /// Returns the order the event refers to.
    fn order_id(&self) -> OrderId;

    /// Returns the timestamp of the transition that produced the event.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Returns a key identifying the logical event.
    ///
    /// Redeliveries of the same transition share the key, so consumers can
    /// detect duplicates.
    fn idempotency_key(&self) -> String {
        format!(
            "{}:{}:{}",
            self.order_id(),
            self.event_type(),
            self.occurred_at().timestamp_millis()
        )
    }
}
