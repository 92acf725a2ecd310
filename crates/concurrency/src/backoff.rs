//! Capped exponential backoff with jitter, shared by the throttler's retry
//! path and the transaction runner (spec §4.9):
//!
//! ```text
//! sleep( min(maxDelay, 10·2^min(attempt,10)) + rand(0..baseDelay/4) ) ms
//! ```

use rand::Rng;
use std::time::Duration;

/// Compute the backoff delay for retry attempt `attempt` (0-indexed).
///
/// `base_ms` is the `10` in spec's formula (the per-attempt base delay);
/// `max_ms` caps the exponential term before jitter is added. Jitter is
/// uniform in `[0, base_ms / 4)`, matching spec's `±25%`-ish jitter
/// described informally in §4.9/§7.
pub fn compute_delay(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    let exp = attempt.min(10);
    let backoff = base_ms.saturating_mul(1u64 << exp);
    let capped = backoff.min(max_ms);
    let jitter_range = (base_ms / 4).max(1);
    let jitter = rand::thread_rng().gen_range(0..jitter_range);
    Duration::from_millis(capped + jitter)
}
