//! Polling worker for the event orchestrator.
//!
//! Claims due events, routes them through the per-origin processors and
//! serves `/health` and `/metrics` for operators.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod routes;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use axum::routing::get;
use domain::{AccountRepository, CustomerRepository};
use event_store::EventRepository;
use metrics_exporter_prometheus::PrometheusHandle;
use processor::{AccountProcessor, CustomerProcessor, DecodeFailurePolicy, ProcessorRegistry};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use dispatcher::{BatchSummary, Dispatcher};
pub use error::{Result, WorkerError};
pub use routes::health::WorkerInfo;

/// Creates the Axum router serving the ops endpoints.
pub fn create_app(info: WorkerInfo, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .with_state(Arc::new(info))
        .merge(metrics_router)
        .layer(TraceLayer::new_for_http())
}

/// Builds a registry with the account and customer processors sharing `gateway`.
pub fn build_registry<R, A, C>(
    gateway: R,
    accounts: A,
    customers: C,
    decode_policy: DecodeFailurePolicy,
) -> ProcessorRegistry<R>
where
    R: EventRepository + Clone + 'static,
    A: AccountRepository + 'static,
    C: CustomerRepository + 'static,
{
    let account_processor =
        AccountProcessor::new(gateway.clone(), accounts).with_decode_policy(decode_policy);
    let customer_processor =
        CustomerProcessor::new(gateway.clone(), customers).with_decode_policy(decode_policy);

    ProcessorRegistry::new(gateway)
        .with_processor(Arc::new(account_processor))
        .with_processor(Arc::new(customer_processor))
}

/// Drives `server` alongside the spawned dispatch loop.
///
/// When the server returns, the dispatcher is told to stop and awaited so the
/// in-flight batch finishes. If the dispatcher ends first, panicking or not,
/// the worker stops with [`WorkerError::DispatcherStopped`].
pub async fn supervise<S>(
    server: S,
    mut dispatch_task: JoinHandle<()>,
    shutdown: watch::Sender<bool>,
) -> Result<()>
where
    S: Future<Output = std::io::Result<()>>,
{
    let served = tokio::select! {
        served = server => Ok(served),
        joined = &mut dispatch_task => Err(joined),
    };

    match served {
        Ok(served) => {
            let _ = shutdown.send(true);
            if let Err(err) = dispatch_task.await {
                tracing::error!(error = %err, "dispatcher task panicked");
            }
            served?;
            Ok(())
        }
        Err(joined) => {
            let reason = match joined {
                Ok(()) => "dispatch loop exited".to_string(),
                Err(err) => err.to_string(),
            };
            tracing::error!(%reason, "dispatcher stopped, shutting the worker down");
            Err(WorkerError::DispatcherStopped(reason))
        }
    }
}
