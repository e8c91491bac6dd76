//! Backoff policy for events that hit a retryable failure.

use std::time::Duration;

/// Exponential backoff applied to `scheduled_at` on each retry.
///
/// # Default Values
///
/// - `initial_delay`: 5 seconds
/// - `max_delay`: 5 minutes
/// - `multiplier`: 2.0 (delay doubles each retry)
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Delay applied after the first retryable failure.
    pub initial_delay: Duration,
    /// Cap for the exponential growth.
    pub max_delay: Duration,
    /// Growth factor between consecutive retries, never below 1.0.
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(300),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    /// Smallest delay ever returned, so a retry always moves `scheduled_at` forward.
    pub const MIN_DELAY: Duration = Duration::from_millis(1);

    /// Create a new policy builder.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder {
        RetryPolicyBuilder::default()
    }

    /// Delay to apply once the event's retry counter has reached `retry`.
    ///
    /// `initial_delay * multiplier^(retry - 1)`, capped at `max_delay`.
    /// Non-decreasing in `retry`.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let delay_ms = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);

        let delay = if !delay_ms.is_finite() || delay_ms >= self.max_delay.as_millis() as f64 {
            self.max_delay
        } else {
            Duration::from_millis(delay_ms as u64)
        };

        delay.max(Self::MIN_DELAY)
    }
}

/// Builder for [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct RetryPolicyBuilder {
    initial_delay: Option<Duration>,
    max_delay: Option<Duration>,
    multiplier: Option<f64>,
}

impl RetryPolicyBuilder {
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = Some(multiplier);
        self
    }

    /// Build the [`RetryPolicy`]. A multiplier below 1.0 (or NaN) is raised to 1.0
    /// and `max_delay` is raised to `initial_delay` if it is smaller.
    #[must_use]
    pub fn build(self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let initial_delay = self.initial_delay.unwrap_or(defaults.initial_delay);
        let max_delay = self.max_delay.unwrap_or(defaults.max_delay).max(initial_delay);
        let multiplier = self.multiplier.unwrap_or(defaults.multiplier);
        let multiplier = if multiplier >= 1.0 { multiplier } else { 1.0 };

        RetryPolicy {
            initial_delay,
            max_delay,
            multiplier,
        }
    }
}

pub(crate) fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX)
}
