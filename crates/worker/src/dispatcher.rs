//! Polling dispatch loop: claims due events and hands them to the processors.

use std::sync::Arc;
use std::time::{Duration, Instant};

use event_store::EventRepository;
use futures_util::{StreamExt, stream};
use processor::{ProcessOutcome, ProcessorError, ProcessorRegistry};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::config::Config;
use crate::error::Result;

/// Tally of one dispatch cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub claimed: usize,
    pub completed: usize,
    pub failed: usize,
    pub retried: usize,
    pub unprocessable: usize,
    /// Events whose processing returned an error or timed out.
    pub errors: usize,
}

impl BatchSummary {
    fn record(&mut self, result: &std::result::Result<ProcessOutcome, ProcessorError>) {
        match result {
            Ok(ProcessOutcome::Completed) => self.completed += 1,
            Ok(ProcessOutcome::Failed) => self.failed += 1,
            Ok(ProcessOutcome::Retried) => self.retried += 1,
            Ok(ProcessOutcome::Unprocessable) => self.unprocessable += 1,
            Err(_) => self.errors += 1,
        }
    }

    /// Returns true if nothing was claimed.
    pub fn is_empty(&self) -> bool {
        self.claimed == 0
    }
}

/// Claims batches of due events and processes them with bounded concurrency.
///
/// Claiming moves events to `processing` atomically, so several dispatchers
/// may share one PostgreSQL store. A claim older than the lease is taken
/// over by the next cycle. An event still running after the process timeout
/// is abandoned and left to that takeover.
pub struct Dispatcher<R> {
    registry: Arc<ProcessorRegistry<R>>,
    batch_size: usize,
    concurrency: usize,
    lease: Duration,
    process_timeout: Duration,
    poll_interval: Duration,
}

impl<R: EventRepository> Dispatcher<R> {
    /// Creates a dispatcher with the default batch settings.
    pub fn new(registry: ProcessorRegistry<R>) -> Self {
        let defaults = Config::default();
        Self {
            registry: Arc::new(registry),
            batch_size: defaults.batch_size,
            concurrency: defaults.concurrency,
            lease: defaults.lease,
            process_timeout: defaults.process_timeout,
            poll_interval: defaults.poll_interval,
        }
    }

    /// Applies the batch settings of `config`.
    pub fn with_config(self, config: &Config) -> Self {
        self.batch_size(config.batch_size)
            .concurrency(config.concurrency)
            .lease(config.lease)
            .process_timeout(config.process_timeout)
            .poll_interval(config.poll_interval)
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn process_timeout(mut self, process_timeout: Duration) -> Self {
        self.process_timeout = process_timeout;
        self
    }

    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Runs one dispatch cycle.
    ///
    /// Per-event failures are logged and counted; they never abort the batch.
    /// Only a failed claim is returned as an error.
    #[tracing::instrument(skip(self))]
    pub async fn run_once(&self) -> Result<BatchSummary> {
        let started = Instant::now();
        let events = self
            .registry
            .gateway()
            .claim_processable(self.batch_size, self.lease)
            .await?;

        let mut summary = BatchSummary {
            claimed: events.len(),
            ..BatchSummary::default()
        };

        let registry = &self.registry;
        let process_timeout = self.process_timeout;
        let mut results = stream::iter(events)
            .map(|event| async move {
                let result =
                    tokio::time::timeout(process_timeout, registry.process(&event)).await;
                (event, result)
            })
            .buffer_unordered(self.concurrency);

        while let Some((event, result)) = results.next().await {
            match result {
                Ok(result) => {
                    if let Err(err) = &result {
                        tracing::error!(
                            event_id = %event.id,
                            origin = %event.origin,
                            event_type = %event.event_type,
                            error = %err,
                            "event processing failed"
                        );
                    }
                    summary.record(&result);
                }
                Err(_) => {
                    tracing::error!(
                        event_id = %event.id,
                        origin = %event.origin,
                        event_type = %event.event_type,
                        timeout_ms = process_timeout.as_millis() as u64,
                        "event processing timed out"
                    );
                    metrics::counter!("events_timed_out_total").increment(1);
                    summary.errors += 1;
                }
            }
        }

        metrics::histogram!("dispatch_batch_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(summary)
    }

    /// Runs dispatch cycles every poll interval until `shutdown` turns true
    /// or its sender is dropped.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(
            batch_size = self.batch_size,
            concurrency = self.concurrency,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "dispatcher started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.run_once().await {
                        Ok(summary) if !summary.is_empty() => {
                            tracing::info!(?summary, "dispatch cycle complete");
                        }
                        Ok(_) => {}
                        Err(err) => tracing::error!(error = %err, "dispatch cycle failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!("dispatcher stopped");
    }
}
