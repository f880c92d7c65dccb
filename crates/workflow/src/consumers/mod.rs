//! Event consumers driving the order lifecycle after creation.

pub mod notifier;
pub mod payment;

pub use notifier::{CompletionNotifier, EmailSender, ExpiryNotifier, LoggingEmailSender};
pub use payment::PaymentSimulationConsumer;
