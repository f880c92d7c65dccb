//! API server entry point.

use std::error::Error;
use std::sync::Arc;

use api::config::{Config, LogFormat};
use api::routes::AppState;
use bus::InMemoryEventBus;
use metrics_exporter_prometheus::PrometheusHandle;
use store::{InMemoryStore, OrderStore, PostgresStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use workflow::{
    EventProcessingSettings, LoggingEmailSender, OrderService, SeededRandom, Supervisor,
    start_event_processing,
};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Serves HTTP and runs event processing until a signal arrives.
async fn run<S>(
    store: S,
    config: Config,
    settings: EventProcessingSettings,
    metrics_handle: PrometheusHandle,
) -> Result<(), Box<dyn Error>>
where
    S: OrderStore + 'static,
{
    let bus = InMemoryEventBus::new();
    let service = Arc::new(OrderService::new(store, bus.clone()));

    let mut supervisor = Supervisor::new();
    start_event_processing(
        &mut supervisor,
        Arc::clone(&service),
        &bus,
        &settings,
        Arc::new(SeededRandom::new(settings.payment_rng_seed)),
        Arc::new(LoggingEmailSender::new(settings.email_delay)),
    );

    let app = api::create_app(Arc::new(AppState::new(service)), metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    let stop = supervisor.shutdown_signal();
    supervisor.spawn("http-server", async move {
        let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
            stop.wait().await;
        });
        if let Err(e) = serve.await {
            tracing::error!(error = %e, "server error");
        }
    });

    shutdown_signal().await;

    let result = supervisor.shutdown(config.shutdown_timeout).await;
    bus.close();
    result?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // 1. Load configuration and initialize tracing
    let config = Config::from_env()?;
    init_tracing(&config);
    let settings = EventProcessingSettings::from_env()?;
    tracing::info!(?settings, "event processing configured");

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the store and run
    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresStore::connect(&url, config.database_max_connections).await?;
            store.run_migrations().await?;
            tracing::info!("connected to PostgreSQL, migrations applied");
            run(store, config, settings, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store with sample data");
            run(InMemoryStore::with_sample_data(), config, settings, metrics_handle).await
        }
    }
}
