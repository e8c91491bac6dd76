use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use event_store::{ContextId, Event, EventRepository, InMemoryEventRepository, RetryPolicy};

fn make_event() -> Event {
    Event::builder()
        .context_id(ContextId::new())
        .origin("account")
        .event_type("account.created")
        .payload(&serde_json::json!({"initialBalance": 1000, "currency": "USD"}))
        .unwrap()
        .build()
}

async fn seeded_repo(count: usize) -> InMemoryEventRepository {
    let repo = InMemoryEventRepository::new();
    for _ in 0..count {
        repo.insert(make_event()).await.unwrap();
    }
    repo
}

fn bench_fetch_processable(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let repo = rt.block_on(seeded_repo(1_000));

    c.bench_function("event_store/fetch_processable_50_of_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                repo.fetch_processable(50).await.unwrap();
            });
        });
    });
}

fn bench_claim_batch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("event_store/claim_50_of_1000", |b| {
        b.iter(|| {
            rt.block_on(async {
                let repo = seeded_repo(1_000).await;
                repo.claim_processable(50, Duration::from_secs(300))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_retry_delay(c: &mut Criterion) {
    let policy = RetryPolicy::default();

    c.bench_function("retry_policy/delay_for_retry", |b| {
        b.iter(|| {
            for retry in 1..=10 {
                std::hint::black_box(policy.delay_for_retry(retry));
            }
        });
    });
}

criterion_group!(
    benches,
    bench_fetch_processable,
    bench_claim_batch,
    bench_retry_delay,
);
criterion_main!(benches);
