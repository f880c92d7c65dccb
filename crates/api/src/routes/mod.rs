//! HTTP route handlers.

pub mod catalog;
pub mod health;
pub mod metrics;
pub mod orders;

use std::sync::Arc;

use bus::EventPublisher;
use store::OrderStore;
use workflow::{CatalogService, OrderService};

/// Shared application state accessible from all handlers.
pub struct AppState<S, P> {
    pub order_service: Arc<OrderService<S, P>>,
}

impl<S, P> AppState<S, P>
where
    S: OrderStore,
    P: EventPublisher,
{
    pub fn new(order_service: Arc<OrderService<S, P>>) -> Self {
        Self { order_service }
    }

    /// Product and user management over the order service's store.
    pub fn catalog(&self) -> CatalogService<'_, S> {
        CatalogService::new(self.order_service.store())
    }
}
