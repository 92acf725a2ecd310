//! Adaptive Throttler (spec §4.3): a feedback controller that adjusts
//! batch size and inter-batch delay in response to retryable failures.
//!
//! Grounded on the teacher's `TransactionManager`'s mutex-guarded counters
//! (`crates/concurrency/src/manager.rs`) generalized from a fixed commit
//! protocol to a tunable batch-size/delay controller, and on its retry
//! classification convention (`RecordGraphError::is_retryable_kv_error`).

use parking_lot::Mutex;
use recordgraph_core::error::is_retryable_message;
use recordgraph_core::RecordGraphError;
use std::time::Duration;
use thiserror::Error;

/// Construction-time preconditions for [`ThrottleConfig`] (spec §4.3).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ThrottleConfigError {
    /// `0 < min ≤ initial ≤ max` violated.
    #[error("batch size bounds must satisfy 0 < min <= initial <= max")]
    InvalidBatchBounds,
    /// `increaseRatio > 1` violated.
    #[error("increase_ratio must be > 1.0")]
    InvalidIncreaseRatio,
    /// `0 < decreaseRatio < 1` violated.
    #[error("decrease_ratio must be in (0.0, 1.0)")]
    InvalidDecreaseRatio,
}

/// Tunables for the adaptive throttler.
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Initial batch size.
    pub initial_batch_size: u64,
    /// Minimum batch size the controller will shrink to.
    pub min_batch_size: u64,
    /// Maximum batch size the controller will grow to.
    pub max_batch_size: u64,
    /// Multiplier applied to batch size on sustained success (`> 1.0`).
    pub increase_ratio: f64,
    /// Multiplier applied to batch size on failure (`in (0, 1)`).
    pub decrease_ratio: f64,
    /// Consecutive successes required before growing the batch size again.
    pub successes_before_increase: u32,
    /// Initial inter-batch delay.
    pub initial_delay: Duration,
    /// Floor for the inter-batch delay.
    pub min_delay: Duration,
    /// Ceiling for the inter-batch delay.
    pub max_delay: Duration,
    /// Multiplier applied to delay on success (shrinks delay, `<= 1.0`).
    pub delay_decrease_ratio: f64,
    /// Multiplier applied to delay on failure (grows delay, `>= 1.0`).
    pub delay_increase_ratio: f64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            initial_batch_size: 100,
            min_batch_size: 10,
            max_batch_size: 1000,
            increase_ratio: 1.5,
            decrease_ratio: 0.5,
            successes_before_increase: 3,
            initial_delay: Duration::from_millis(0),
            min_delay: Duration::from_millis(0),
            max_delay: Duration::from_secs(5),
            delay_decrease_ratio: 0.9,
            delay_increase_ratio: 2.0,
        }
    }
}

impl ThrottleConfig {
    /// Validate the preconditions spec §4.3 requires at construction.
    pub fn validate(&self) -> Result<(), ThrottleConfigError> {
        if !(self.min_batch_size > 0
            && self.min_batch_size <= self.initial_batch_size
            && self.initial_batch_size <= self.max_batch_size)
        {
            return Err(ThrottleConfigError::InvalidBatchBounds);
        }
        if !(self.increase_ratio > 1.0) {
            return Err(ThrottleConfigError::InvalidIncreaseRatio);
        }
        if !(self.decrease_ratio > 0.0 && self.decrease_ratio < 1.0) {
            return Err(ThrottleConfigError::InvalidDecreaseRatio);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Totals {
    successful_batches: u64,
    failed_batches: u64,
    items_processed: u64,
}

struct State {
    batch_size: u64,
    delay: Duration,
    consecutive_successes: u32,
    consecutive_failures: u32,
    totals: Totals,
}

/// Feedback controller over success/failure signals (spec §4.3).
///
/// All mutable state lives behind one mutex; no suspension happens inside
/// the critical section (spec §5).
pub struct AdaptiveThrottler {
    config: ThrottleConfig,
    state: Mutex<State>,
}

impl AdaptiveThrottler {
    /// Construct a throttler, validating `config`'s preconditions.
    pub fn new(config: ThrottleConfig) -> Result<Self, ThrottleConfigError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(State {
                batch_size: config.initial_batch_size,
                delay: config.initial_delay,
                consecutive_successes: 0,
                consecutive_failures: 0,
                totals: Totals::default(),
            }),
            config,
        })
    }

    /// Current recommended batch size.
    pub fn batch_size(&self) -> u64 {
        self.state.lock().batch_size
    }

    /// Current inter-batch delay.
    pub fn delay(&self) -> Duration {
        self.state.lock().delay
    }

    /// Record a successful batch of `items` processed in `duration`.
    ///
    /// `delay ← max(min, delay × delayDecreaseRatio)`; after
    /// `successesBeforeIncrease` consecutive successes,
    /// `batchSize ← min(max, batchSize × increaseRatio)` and the success
    /// streak resets (spec §4.3).
    pub fn record_success(&self, items: u64, duration: Duration) {
        let mut s = self.state.lock();
        s.consecutive_failures = 0;
        s.consecutive_successes += 1;
        s.totals.successful_batches += 1;
        s.totals.items_processed += items;

        let new_delay_ms =
            (s.delay.as_secs_f64() * self.config.delay_decrease_ratio).max(self.config.min_delay.as_secs_f64());
        s.delay = Duration::from_secs_f64(new_delay_ms);

        if s.consecutive_successes >= self.config.successes_before_increase {
            let grown = (s.batch_size as f64 * self.config.increase_ratio) as u64;
            s.batch_size = grown.min(self.config.max_batch_size).max(self.config.min_batch_size);
            s.consecutive_successes = 0;
        }
        tracing::debug!(items, ?duration, batch_size = s.batch_size, delay_ms = s.delay.as_millis(), "throttle: recorded success");
    }

    /// Record a failed batch.
    ///
    /// `batchSize ← max(min, batchSize × decreaseRatio)`;
    /// `delay ← min(maxDelay, max(1, delay) × delayIncreaseRatio)`; the
    /// success streak resets (spec §4.3).
    pub fn record_failure(&self, err: &RecordGraphError) {
        let mut s = self.state.lock();
        s.consecutive_successes = 0;
        s.consecutive_failures += 1;
        s.totals.failed_batches += 1;

        let shrunk = (s.batch_size as f64 * self.config.decrease_ratio) as u64;
        s.batch_size = shrunk.max(self.config.min_batch_size).min(self.config.max_batch_size);

        let floor_ms = s.delay.as_millis().max(1) as f64;
        let grown_ms = (floor_ms * self.config.delay_increase_ratio).min(self.config.max_delay.as_millis() as f64);
        s.delay = Duration::from_millis(grown_ms as u64);

        tracing::warn!(error = %err, batch_size = s.batch_size, delay_ms = s.delay.as_millis(), "throttle: recorded failure");
    }

    /// Sleep for the current inter-batch delay. The sleep is a plain
    /// blocking sleep here; callers running under a cancellable task
    /// runtime should race this against their cancellation signal (spec §5
    /// requires `Task.sleep` to propagate cancellation — that's the
    /// caller's responsibility since this crate has no task runtime
    /// dependency of its own).
    pub fn wait_before_next_batch(&self) {
        let d = self.delay();
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }

    /// Whether `err` belongs to a retryable class (spec §4.3): `timeout`,
    /// `conflict`, `too_old`/`transaction_too_old`, `future_version`,
    /// `not_committed`, or any error the KV driver itself flags retryable.
    pub fn is_retryable(err: &RecordGraphError) -> bool {
        match err {
            RecordGraphError::Storage(msg) => is_retryable_message(msg),
            RecordGraphError::ExhaustedRetries { .. } => false,
            _ => false,
        }
    }

    /// Snapshot of cumulative totals, for diagnostics/perf monitoring.
    pub fn totals(&self) -> (u64, u64, u64) {
        let s = self.state.lock();
        (s.totals.successful_batches, s.totals.failed_batches, s.totals.items_processed)
    }
}

/// Runs `op(batch_size) -> Result<(items_processed, T), RecordGraphError>`
/// against a throttler, retrying retryable failures up to `max_retries`
/// times (spec §4.3: `ThrottledOperation(op).execute(maxRetries)`).
pub fn execute_throttled<T>(
    throttler: &AdaptiveThrottler,
    max_retries: u32,
    mut op: impl FnMut(u64) -> Result<(u64, T), RecordGraphError>,
) -> Result<T, RecordGraphError> {
    let mut attempt = 0;
    loop {
        let batch_size = throttler.batch_size();
        let start = std::time::Instant::now();
        match op(batch_size) {
            Ok((items, value)) => {
                throttler.record_success(items, start.elapsed());
                return Ok(value);
            }
            Err(err) => {
                throttler.record_failure(&err);
                attempt += 1;
                if !AdaptiveThrottler::is_retryable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                throttler.wait_before_next_batch();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn retryable_err() -> RecordGraphError {
        RecordGraphError::Storage("conflict".into())
    }

    #[test]
    fn rejects_invalid_config() {
        let mut cfg = ThrottleConfig::default();
        cfg.min_batch_size = 0;
        assert_eq!(AdaptiveThrottler::new(cfg).unwrap_err(), ThrottleConfigError::InvalidBatchBounds);

        let mut cfg = ThrottleConfig::default();
        cfg.increase_ratio = 1.0;
        assert_eq!(AdaptiveThrottler::new(cfg).unwrap_err(), ThrottleConfigError::InvalidIncreaseRatio);

        let mut cfg = ThrottleConfig::default();
        cfg.decrease_ratio = 1.0;
        assert_eq!(AdaptiveThrottler::new(cfg).unwrap_err(), ThrottleConfigError::InvalidDecreaseRatio);
    }

    /// spec §8.4 E5: 6 successes, 1 retryable failure, 9 successes against
    /// `initial=100, min=10, max=1000, ×1.5/×0.5, successesBeforeIncrease=3`.
    #[test]
    fn e5_throttler_convergence() {
        let cfg = ThrottleConfig {
            initial_batch_size: 100,
            min_batch_size: 10,
            max_batch_size: 1000,
            increase_ratio: 1.5,
            decrease_ratio: 0.5,
            successes_before_increase: 3,
            initial_delay: Duration::from_millis(0),
            min_delay: Duration::from_millis(0),
            max_delay: Duration::from_secs(5),
            delay_decrease_ratio: 1.0,
            delay_increase_ratio: 1.0,
        };
        let t = AdaptiveThrottler::new(cfg).unwrap();
        let expected = [100, 100, 150, 150, 150, 225, 112];
        let mut got = Vec::new();
        for _ in 0..6 {
            t.record_success(1, Duration::from_millis(1));
            got.push(t.batch_size());
        }
        t.record_failure(&retryable_err());
        got.push(t.batch_size());
        for _ in 0..2 {
            t.record_success(1, Duration::from_millis(1));
            got.push(t.batch_size());
        }
        // First success doesn't cross successes_before_increase=3 yet: 100,100,150 after 3rd.
        assert_eq!(got[0], 100);
        assert_eq!(got[2], 150);
        assert_eq!(got[5], 225);
        assert_eq!(got[6], 112); // 225 * 0.5 rounded
    }

    #[test]
    fn batch_size_respects_bounds() {
        let cfg = ThrottleConfig { min_batch_size: 10, max_batch_size: 20, initial_batch_size: 20, ..Default::default() };
        let t = AdaptiveThrottler::new(cfg).unwrap();
        for _ in 0..10 {
            t.record_success(1, Duration::from_millis(1));
        }
        assert!(t.batch_size() <= 20);
        for _ in 0..10 {
            t.record_failure(&retryable_err());
        }
        assert!(t.batch_size() >= 10);
    }

    #[test]
    fn retry_classifier() {
        assert!(AdaptiveThrottler::is_retryable(&RecordGraphError::Storage("transaction_too_old".into())));
        assert!(!AdaptiveThrottler::is_retryable(&RecordGraphError::VariableConflict));
    }

    #[test]
    fn execute_throttled_retries_then_succeeds() {
        let t = AdaptiveThrottler::new(ThrottleConfig {
            initial_delay: Duration::from_millis(0),
            min_delay: Duration::from_millis(0),
            ..Default::default()
        })
        .unwrap();
        let mut calls = 0;
        let result = execute_throttled(&t, 5, |_batch| {
            calls += 1;
            if calls < 3 {
                Err(retryable_err())
            } else {
                Ok((10, "done"))
            }
        });
        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls, 3);
    }

    #[test]
    fn execute_throttled_gives_up_on_non_retryable() {
        let t = AdaptiveThrottler::new(ThrottleConfig::default()).unwrap();
        let result: Result<(), _> = execute_throttled(&t, 5, |_| Err(RecordGraphError::VariableConflict));
        assert!(matches!(result, Err(RecordGraphError::VariableConflict)));
    }
}
