//! Container / Transaction Runner (spec §4.9): the retry loop every write
//! path runs through, with GRV-cache read-version reuse and capped
//! exponential backoff on retryable failures.
//!
//! Grounded on the teacher's transaction-pool retry convention
//! (`crates/engine/src/transaction/pool.rs`'s acquire/retry loop),
//! generalized from pooled in-process transactions to the KV collaborator
//! boundary (`recordgraph_core::traits::{Database, Transaction}`) and
//! spec's exact backoff formula (`recordgraph_concurrency::backoff`).

use recordgraph_concurrency::compute_delay;
use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::traits::{Database, Transaction};
use recordgraph_durability::GrvCache;
use std::time::Duration;
use tracing::warn;

/// Per-call configuration for [`with_transaction`].
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Maximum attempts before giving up with `ExhaustedRetries`.
    pub retry_limit: u32,
    /// Whether to pin the transaction's read version to a fresh GRV cache
    /// entry when one is available.
    pub use_grv_cache: bool,
    /// Maximum age of a cached read version still considered fresh.
    pub grv_staleness: Duration,
    /// Base delay for the backoff formula (spec's `10` in
    /// `10·2^min(attempt,10)`).
    pub base_delay_ms: u64,
    /// Cap on the backoff delay before jitter.
    pub max_delay_ms: u64,
    /// Transaction approximate-size threshold that logs a warning.
    pub warn_bytes: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            retry_limit: 10,
            use_grv_cache: true,
            grv_staleness: Duration::from_secs(5),
            base_delay_ms: 10,
            max_delay_ms: 1000,
            warn_bytes: 8_000_000,
        }
    }
}

/// Run `op` against fresh transactions drawn from `db`, retrying
/// retryable failures with capped exponential backoff, and feeding
/// successfully committed versions back into `cache`.
///
/// Mirrors spec §4.9's pseudocode exactly: on a retryable error, cancel
/// the transaction, sleep, and retry with a brand-new transaction (never
/// reusing a cancelled one); on a non-retryable error, or once
/// `retry_limit` is reached, surface the failure.
pub fn with_transaction<D, F, R>(db: &D, cache: &GrvCache, config: &RunnerConfig, mut op: F) -> Result<R>
where
    D: Database,
    F: FnMut(&mut D::Txn) -> Result<R>,
{
    let mut last_err: Option<RecordGraphError> = None;

    for attempt in 0..config.retry_limit {
        let mut txn = db.create_transaction();
        if config.use_grv_cache {
            if let Some(version) = cache.cached_version_within(config.grv_staleness) {
                txn.set_read_version(version);
            }
        }

        let outcome = op(&mut txn).and_then(|result| {
            let size = txn.approximate_size();
            if size > config.warn_bytes {
                warn!(size, warn_bytes = config.warn_bytes, "transaction approximate size exceeds warn threshold");
            }
            txn.commit().map(|committed| (committed, result))
        });

        match outcome {
            Ok((true, result)) => {
                if let Some(version) = txn.committed_version() {
                    cache.record_committed_version(version);
                }
                return Ok(result);
            }
            Ok((false, _)) => {
                txn.cancel();
                last_err = Some(RecordGraphError::Storage("commit returned false without conflict".into()));
            }
            Err(e) => {
                txn.cancel();
                if e.is_retryable_kv_error() {
                    cache.invalidate();
                    if attempt + 1 < config.retry_limit {
                        std::thread::sleep(compute_delay(attempt, config.base_delay_ms, config.max_delay_ms));
                        last_err = Some(e);
                        continue;
                    }
                } else {
                    return Err(e);
                }
                last_err = Some(e);
            }
        }
    }

    Err(RecordGraphError::ExhaustedRetries {
        attempts: config.retry_limit,
        source: Box::new(last_err.unwrap_or(RecordGraphError::Storage("transaction_too_old".into()))),
    })
}
