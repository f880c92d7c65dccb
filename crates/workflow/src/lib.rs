//! Order lifecycle workflow.
//!
//! [`OrderService`] creates and deletes orders inside one store transaction
//! each and publishes domain events after commit. Background consumers pick
//! those events up:
//!
//! 1. [`PaymentSimulationConsumer`] moves new orders to processing and,
//!    after a delay, completes them with a configured probability.
//! 2. [`CompletionNotifier`] and [`ExpiryNotifier`] record notifications.
//! 3. [`ExpirySweeper`] periodically expires orders left open too long.
//!
//! [`CatalogService`] manages the products and users orders refer to.
//!
//! Delivery is at least once. Every automated status change is a guarded
//! compare-and-set in the store and every notification is keyed by the
//! event's idempotency key, so redelivery never repeats a side effect.

pub mod catalog;
pub mod chance;
pub mod config;
pub mod consumers;
pub mod error;
pub mod runtime;
pub mod service;
pub mod supervisor;
pub mod sweeper;
pub mod worker;

pub use catalog::CatalogService;
pub use chance::{RandomSource, ScriptedRandom, SeededRandom};
pub use config::{ConfigError, EventProcessingSettings};
pub use consumers::{
    CompletionNotifier, EmailSender, ExpiryNotifier, LoggingEmailSender,
    PaymentSimulationConsumer,
};
pub use error::{ErrorKind, Result, WorkflowError};
pub use runtime::{spawn_consumer, start_event_processing};
pub use service::OrderService;
pub use supervisor::{Shutdown, ShutdownTimedOut, Supervisor};
pub use sweeper::{ExpirySweeper, SweepReport};
pub use worker::{ConsumerWorker, EventHandler};
