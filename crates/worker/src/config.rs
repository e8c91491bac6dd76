//! Worker configuration loaded from environment variables.

use std::time::Duration;

use event_store::RetryPolicy;
use processor::DecodeFailurePolicy;

use crate::error::{Result, WorkerError};

/// Worker configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DATABASE_URL`: PostgreSQL connection string (default: unset, in-memory store)
/// - `POLL_INTERVAL_MS`: delay between dispatch cycles (default: `1000`)
/// - `BATCH_SIZE`: events claimed per cycle (default: `50`)
/// - `CONCURRENCY`: events processed in parallel within a cycle (default: `4`)
/// - `LEASE_SECS`: age after which a `processing` claim is taken over (default: `300`)
/// - `PROCESS_TIMEOUT_SECS`: time one event may take before the dispatcher gives
///   up on it (default: the lease)
/// - `RETRY_INITIAL_DELAY_MS`, `RETRY_MAX_DELAY_MS`, `RETRY_MULTIPLIER`: backoff
///   (defaults: `5000`, `300000`, `2.0`)
/// - `DECODE_FAILURE_POLICY`: `mark_failed` or `leave_unchanged` (default: `mark_failed`)
/// - `HOST`, `PORT`: ops listener (default: `0.0.0.0:3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub poll_interval: Duration,
    pub batch_size: usize,
    pub concurrency: usize,
    pub lease: Duration,
    pub process_timeout: Duration,
    pub retry_policy: RetryPolicy,
    pub decode_failure_policy: DecodeFailurePolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing keys. Present but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let retry_defaults = &defaults.retry_policy;

        let retry_policy = RetryPolicy::builder()
            .initial_delay(Duration::from_millis(parse_or(
                &lookup,
                "RETRY_INITIAL_DELAY_MS",
                retry_defaults.initial_delay.as_millis() as u64,
            )?))
            .max_delay(Duration::from_millis(parse_or(
                &lookup,
                "RETRY_MAX_DELAY_MS",
                retry_defaults.max_delay.as_millis() as u64,
            )?))
            .multiplier(parse_or(
                &lookup,
                "RETRY_MULTIPLIER",
                retry_defaults.multiplier,
            )?)
            .build();

        let decode_failure_policy = match lookup("DECODE_FAILURE_POLICY") {
            Some(value) => value.parse().map_err(|_| WorkerError::Config {
                key: "DECODE_FAILURE_POLICY",
                value,
            })?,
            None => defaults.decode_failure_policy,
        };

        let lease = Duration::from_secs(parse_or(&lookup, "LEASE_SECS", defaults.lease.as_secs())?);
        let process_timeout = Duration::from_secs(parse_or(
            &lookup,
            "PROCESS_TIMEOUT_SECS",
            lease.as_secs(),
        )?);

        Ok(Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            poll_interval: Duration::from_millis(parse_or(
                &lookup,
                "POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )?),
            batch_size: positive(parse_or(&lookup, "BATCH_SIZE", defaults.batch_size)?, "BATCH_SIZE")?,
            concurrency: positive(
                parse_or(&lookup, "CONCURRENCY", defaults.concurrency)?,
                "CONCURRENCY",
            )?,
            lease,
            process_timeout,
            retry_policy,
            decode_failure_policy,
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| WorkerError::Config { key, value }),
        None => Ok(default),
    }
}

fn positive(value: usize, key: &'static str) -> Result<usize> {
    if value == 0 {
        return Err(WorkerError::Config {
            key,
            value: value.to_string(),
        });
    }
    Ok(value)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            poll_interval: Duration::from_millis(1000),
            batch_size: 50,
            concurrency: 4,
            lease: Duration::from_secs(300),
            process_timeout: Duration::from_secs(300),
            retry_policy: RetryPolicy::default(),
            decode_failure_policy: DecodeFailurePolicy::MarkFailed,
        }
    }
}
