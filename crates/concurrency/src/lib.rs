//! Adaptive Throttler (spec §4.3) and shared backoff/jitter helpers used by
//! the write path's transaction runner (spec §4.9).

#![warn(missing_docs)]

pub mod backoff;
pub mod throttle;

pub use backoff::compute_delay;
pub use throttle::{execute_throttled, AdaptiveThrottler, ThrottleConfig, ThrottleConfigError};
