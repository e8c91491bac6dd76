//! Integration tests for the worker: ops endpoints and dispatch over the in-memory store.

use std::sync::OnceLock;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{
    AccountRepository, CustomerRepository, CustomerStatus, InMemoryAccountRepository,
    InMemoryCustomerRepository,
};
use event_store::{
    ContextId, Event, EventOrigin, EventRepository, EventRepositoryExt, EventState,
    InMemoryEventRepository, RetryPolicy,
};
use metrics_exporter_prometheus::PrometheusHandle;
use processor::DecodeFailurePolicy;
use serde_json::json;
use tower::ServiceExt;
use tokio::sync::watch;
use worker::{BatchSummary, Dispatcher, WorkerError, WorkerInfo};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn app() -> axum::Router {
    let info = WorkerInfo {
        backend: "memory",
        origins: vec!["account".to_string(), "customer".to_string()],
    };
    worker::create_app(info, get_metrics_handle())
}

fn setup() -> (
    InMemoryEventRepository,
    InMemoryAccountRepository,
    InMemoryCustomerRepository,
    Dispatcher<InMemoryEventRepository>,
) {
    let policy = RetryPolicy::builder()
        .initial_delay(Duration::from_millis(1))
        .max_delay(Duration::from_millis(2))
        .build();
    let gateway = InMemoryEventRepository::with_retry_policy(policy);
    let accounts = InMemoryAccountRepository::new();
    let customers = InMemoryCustomerRepository::new();
    let registry = worker::build_registry(
        gateway.clone(),
        accounts.clone(),
        customers.clone(),
        DecodeFailurePolicy::MarkFailed,
    );
    let dispatcher = Dispatcher::new(registry).batch_size(25).concurrency(4);
    (gateway, accounts, customers, dispatcher)
}

async fn append(
    gateway: &InMemoryEventRepository,
    context_id: ContextId,
    origin: &str,
    event_type: &str,
    payload: serde_json::Value,
) -> Event {
    let event = Event::builder()
        .context_id(context_id)
        .origin(origin)
        .event_type(event_type)
        .payload(&payload)
        .unwrap()
        .build();
    gateway.insert(event.clone()).await.unwrap();
    event
}

#[tokio::test]
async fn test_health_check() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], "memory");
    assert_eq!(json["origins"], json!(["account", "customer"]));
}

#[tokio::test]
async fn test_metrics_after_dispatch() {
    // Metrics emitted before the recorder exists are dropped.
    let app = app();
    let (gateway, _, _, dispatcher) = setup();
    append(
        &gateway,
        ContextId::new(),
        EventOrigin::ACCOUNT,
        "account.created",
        json!({"initialBalance": 1, "currency": "USD"}),
    )
    .await;
    dispatcher.run_once().await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("events_processed_total"));
    assert!(text.contains("events_claimed_total"));
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/orders")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_dispatch_mixed_batch() {
    let (gateway, accounts, customers, dispatcher) = setup();
    let customer_id = ContextId::new();
    let account_id = ContextId::new();

    append(
        &gateway,
        customer_id,
        EventOrigin::CUSTOMER,
        "customer.created",
        json!({"firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com"}),
    )
    .await;
    append(
        &gateway,
        account_id,
        EventOrigin::ACCOUNT,
        "account.created",
        json!({"initialBalance": 100, "currency": "USD"}),
    )
    .await;
    append(
        &gateway,
        ContextId::new(),
        EventOrigin::ACCOUNT,
        "account.funds.withdrawn",
        json!({"amount": 100}),
    )
    .await;
    append(&gateway, ContextId::new(), "billing", "invoice.issued", json!({})).await;

    let summary = dispatcher.run_once().await.unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            claimed: 4,
            completed: 2,
            failed: 1,
            retried: 0,
            unprocessable: 1,
            errors: 0,
        }
    );
    assert!(accounts.find_by_id(account_id).await.unwrap().is_some());
    let customer = customers.find_by_id(customer_id).await.unwrap().unwrap();
    assert_eq!(customer.status, CustomerStatus::Active);
}

#[tokio::test]
async fn test_retry_exhaustion_through_dispatcher() {
    let (gateway, accounts, _, dispatcher) = setup();
    let event = append(
        &gateway,
        ContextId::new(),
        EventOrigin::ACCOUNT,
        "account.created",
        json!({"initialBalance": 100, "currency": "USD"}),
    )
    .await;
    accounts.fail_next(10).await;

    let mut retried = 0;
    for _ in 0..20 {
        tokio::time::sleep(Duration::from_millis(5)).await;
        retried += dispatcher.run_once().await.unwrap().retried;
        if gateway.fetch_by_id(event.id).await.unwrap().state.is_terminal() {
            break;
        }
    }

    let stored = gateway.fetch_by_id(event.id).await.unwrap();
    assert_eq!(stored.state, EventState::Failed);
    assert_eq!(stored.retry, stored.max_retry);
    assert_eq!(retried, 3);

    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(dispatcher.run_once().await.unwrap().is_empty());
    assert_eq!(accounts.account_count().await, 0);
}

#[tokio::test]
async fn test_abandoned_claim_is_taken_over() {
    let (gateway, _, customers, dispatcher) = setup();
    let customer_id = ContextId::new();
    append(
        &gateway,
        customer_id,
        EventOrigin::CUSTOMER,
        "customer.created",
        json!({"firstName": "Grace", "lastName": "Hopper", "email": "grace@example.com"}),
    )
    .await;

    // A previous worker claimed the event and died.
    let claimed = gateway
        .claim_processable(10, Duration::from_secs(300))
        .await
        .unwrap();
    assert_eq!(claimed.len(), 1);
    assert!(dispatcher.run_once().await.unwrap().is_empty());

    let dispatcher = dispatcher.lease(Duration::ZERO);
    let summary = dispatcher.run_once().await.unwrap();
    assert_eq!(summary.completed, 1);
    assert!(customers.find_by_id(customer_id).await.unwrap().is_some());

    let processing = gateway
        .fetch_by_origin_and_state(&EventOrigin::customer(), EventState::Processing, 10)
        .await
        .unwrap();
    assert!(processing.is_empty());
}

async fn crashing_dispatcher() {
    panic!("dispatcher crashed")
}

#[tokio::test]
async fn test_supervise_stops_when_dispatcher_panics() {
    let (shutdown_tx, _shutdown_rx) = watch::channel(false);
    let dispatch_task = tokio::spawn(crashing_dispatcher());

    let result = worker::supervise(
        std::future::pending::<std::io::Result<()>>(),
        dispatch_task,
        shutdown_tx,
    )
    .await;

    assert!(matches!(result, Err(WorkerError::DispatcherStopped(_))));
}

#[tokio::test]
async fn test_supervise_stops_dispatcher_after_server() {
    let (gateway, _, _, dispatcher) = setup();
    let dispatcher = std::sync::Arc::new(dispatcher.poll_interval(Duration::from_millis(10)));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatch_task = tokio::spawn({
        let dispatcher = std::sync::Arc::clone(&dispatcher);
        async move { dispatcher.run(shutdown_rx).await }
    });
    let event = append(
        &gateway,
        ContextId::new(),
        EventOrigin::ACCOUNT,
        "account.created",
        json!({"initialBalance": 1, "currency": "USD"}),
    )
    .await;

    let server = async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok::<(), std::io::Error>(())
    };
    worker::supervise(server, dispatch_task, shutdown_tx)
        .await
        .unwrap();

    let stored = gateway.fetch_by_id(event.id).await.unwrap();
    assert_eq!(stored.state, EventState::Completed);
}
