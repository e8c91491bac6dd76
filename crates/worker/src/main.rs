//! Worker entry point.

use std::future::IntoFuture;
use std::sync::Arc;

use domain::{InMemoryAccountRepository, InMemoryCustomerRepository};
use event_store::{EventRepository, InMemoryEventRepository, PostgresEventRepository};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{Config, Dispatcher, WorkerInfo};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install SIGINT handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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

/// Runs the dispatcher and the ops listener until a shutdown signal arrives.
async fn serve<R>(
    config: &Config,
    gateway: R,
    backend: &'static str,
    metrics_handle: PrometheusHandle,
) -> worker::Result<()>
where
    R: EventRepository + Clone + 'static,
{
    // Read-side stores live in process; the event store is the durable part.
    let registry = worker::build_registry(
        gateway,
        InMemoryAccountRepository::new(),
        InMemoryCustomerRepository::new(),
        config.decode_failure_policy,
    );
    let info = WorkerInfo {
        backend,
        origins: registry.origins().into_iter().map(String::from).collect(),
    };

    let dispatcher = Arc::new(Dispatcher::new(registry).with_config(config));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatch_task = tokio::spawn({
        let dispatcher = Arc::clone(&dispatcher);
        async move { dispatcher.run(shutdown_rx).await }
    });

    let app = worker::create_app(info, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, backend, "starting worker");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .into_future();
    worker::supervise(server, dispatch_task, shutdown_tx).await?;

    tracing::info!("worker shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> worker::Result<()> {
    let config = Config::from_env()?;

    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    // 3. Pick the event store backend
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections((config.concurrency as u32).saturating_add(2))
                .connect(url)
                .await?;
            let gateway = PostgresEventRepository::with_retry_policy(pool, config.retry_policy.clone());
            gateway.run_migrations().await?;
            serve(&config, gateway, "postgres", metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory event store");
            let gateway = InMemoryEventRepository::with_retry_policy(config.retry_policy.clone());
            serve(&config, gateway, "memory", metrics_handle).await
        }
    }
}
