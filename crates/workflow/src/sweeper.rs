//! Periodic reclaim of orders stuck in pending or processing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bus::EventPublisher;
use chrono::Utc;
use domain::OrderStatus;
use store::OrderStore;
use tokio::time::MissedTickBehavior;

use crate::error::{ErrorKind, Result};
use crate::service::OrderService;
use crate::supervisor::Shutdown;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Stale open orders found by the scan.
    pub scanned: usize,
    /// Orders moved to expired.
    pub expired: usize,
    /// Orders that settled or vanished between scan and update.
    pub skipped: usize,
    /// Expired orders whose OrderExpired event was not published.
    pub publish_failures: usize,
}

/// Expires open orders older than a threshold, on a fixed interval.
pub struct ExpirySweeper<S, P> {
    service: Arc<OrderService<S, P>>,
    threshold_minutes: u32,
    interval: Duration,
}

impl<S, P> ExpirySweeper<S, P>
where
    S: OrderStore,
    P: EventPublisher,
{
    pub fn new(service: Arc<OrderService<S, P>>, threshold_minutes: u32, interval: Duration) -> Self {
        Self {
            service,
            threshold_minutes,
            interval,
        }
    }

    /// Runs one scan.
    ///
    /// Each expiry is its own guarded update, so an order completed after
    /// the scan is skipped rather than expired. A failed publish is logged
    /// and does not stop the remaining orders. Stops early, between orders,
    /// once `shutdown` fires.
    #[tracing::instrument(skip(self, shutdown), fields(threshold_minutes = self.threshold_minutes))]
    pub async fn sweep_once(&self, shutdown: &Shutdown) -> Result<SweepReport> {
        let started = Instant::now();
        let cutoff = Utc::now() - chrono::Duration::minutes(i64::from(self.threshold_minutes));

        let stale = self
            .service
            .store()
            .list_orders_by_status_older_than(&OrderStatus::OPEN, cutoff)
            .await?;

        let mut report = SweepReport {
            scanned: stale.len(),
            ..SweepReport::default()
        };

        for order in stale {
            if shutdown.is_triggered() {
                tracing::info!("Shutdown requested; ending sweep early");
                break;
            }

            let expired = match self.service.transition(order.id, OrderStatus::Expired).await {
                Ok(expired) => expired,
                Err(e) if matches!(e.kind(), ErrorKind::InvalidTransition | ErrorKind::NotFound) => {
                    tracing::debug!(order_id = %order.id, error = %e, "Skipping order");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            report.expired += 1;
            metrics::counter!("orders_expired_total").increment(1);
            tracing::info!(order_id = %expired.id, previous = %order.status, "Order expired");

            let event = expired.expired_event(self.threshold_minutes);
            if let Err(e) = self.service.publish(&event).await {
                report.publish_failures += 1;
                tracing::warn!(order_id = %expired.id, error = %e, "OrderExpired not published");
            }
        }

        metrics::histogram!("expiry_sweep_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        if report.scanned > 0 {
            tracing::info!(
                scanned = report.scanned,
                expired = report.expired,
                skipped = report.skipped,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }

    /// Sweeps every `interval` until `shutdown` fires.
    ///
    /// A sweep that overruns the interval delays the next one; ticks
    /// never overlap.
    pub async fn run(self, shutdown: Shutdown) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tracing::info!(
            interval_secs = self.interval.as_secs(),
            threshold_minutes = self.threshold_minutes,
            "Expiry sweeper started"
        );

        loop {
            tokio::select! {
                () = shutdown.wait() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.sweep_once(&shutdown).await {
                        tracing::error!(error = %e, "Expiry sweep failed");
                    }
                }
            }
        }

        tracing::info!("Expiry sweeper stopped");
    }
}
