//! Event channel for order domain events.
//!
//! Publishing is fire-and-forget with at-least-once semantics: a successful
//! `publish` means the transport accepted the envelope, nothing more.
//! Subscribers must tolerate seeing the same envelope twice; the
//! [`EventEnvelope::idempotency_key`] identifies redeliveries.

pub mod envelope;
pub mod error;
pub mod memory;
pub mod publisher;

pub use envelope::{EventEnvelope, EventId};
pub use error::{BusError, Result};
pub use memory::{InMemoryEventBus, Subscription};
pub use publisher::{EventPublisher, EventPublisherExt};
