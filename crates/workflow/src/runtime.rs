//! Wires the consumers and the sweeper onto a bus under one supervisor.

use std::sync::Arc;

use bus::{EventPublisher, InMemoryEventBus};
use store::OrderStore;

use crate::chance::RandomSource;
use crate::config::EventProcessingSettings;
use crate::consumers::{CompletionNotifier, EmailSender, ExpiryNotifier, PaymentSimulationConsumer};
use crate::service::OrderService;
use crate::supervisor::Supervisor;
use crate::sweeper::ExpirySweeper;
use crate::worker::{ConsumerWorker, EventHandler};

/// Subscribes a handler to its event type and supervises its worker.
pub fn spawn_consumer<H: EventHandler>(supervisor: &mut Supervisor, bus: &InMemoryEventBus, handler: H) {
    let subscription = bus.subscribe(handler.event_type());
    let name = handler.name();
    let worker = ConsumerWorker::new(Arc::new(handler), subscription);
    supervisor.spawn(name, worker.run(supervisor.shutdown_signal()));
}

/// Starts the three consumers and the expiry sweeper.
///
/// Subscriptions exist before this returns, so events published afterwards
/// are not missed.
pub fn start_event_processing<S, P>(
    supervisor: &mut Supervisor,
    service: Arc<OrderService<S, P>>,
    bus: &InMemoryEventBus,
    settings: &EventProcessingSettings,
    random: Arc<dyn RandomSource>,
    email: Arc<dyn EmailSender>,
) where
    S: OrderStore + 'static,
    P: EventPublisher + 'static,
{
    let payment = PaymentSimulationConsumer::new(
        Arc::clone(&service),
        random,
        settings.payment_processing_delay,
        settings.completion_success_rate,
        supervisor.shutdown_signal(),
    );
    spawn_consumer(supervisor, bus, payment);
    spawn_consumer(
        supervisor,
        bus,
        CompletionNotifier::new(Arc::clone(&service), email),
    );
    spawn_consumer(supervisor, bus, ExpiryNotifier::new(Arc::clone(&service)));

    let sweeper = ExpirySweeper::new(
        service,
        settings.expiry_threshold_minutes,
        settings.expiry_check_interval,
    );
    supervisor.spawn("expiry-sweeper", sweeper.run(supervisor.shutdown_signal()));
}
