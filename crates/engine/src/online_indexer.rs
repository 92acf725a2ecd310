//! Online / Multi-Target / Mutual Indexer (spec §4.7): brings one or many
//! indexes from `write_only` to `readable` for every existing record
//! without long-running transactions.
//!
//! Grounded on the teacher's background compaction loop
//! (`crates/storage/src/compaction/wal_only.rs`'s batch-then-checkpoint
//! shape), generalized from WAL segment compaction to a resumable
//! `RangeSet`-driven record scan, throttled by
//! `recordgraph_concurrency::AdaptiveThrottler` per spec §4.3.

use crate::record_type::{self, RecordType};
use crate::runner::{with_transaction, RunnerConfig};
use recordgraph_concurrency::AdaptiveThrottler;
use recordgraph_core::error::Result;
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::limits::Limits;
use recordgraph_core::range_set::{KeyRange, RangeSet};
use recordgraph_core::traits::Database;
use recordgraph_core::value::FieldValue;
use recordgraph_core::RecordGraphError;
use recordgraph_durability::GrvCache;
use recordgraph_storage::{enable, make_readable, scan_item, IndexDefinition};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

fn progress_key(target_names: &[&str]) -> Vec<u8> {
    let mut sorted = target_names.to_vec();
    sorted.sort_unstable();
    Subspace::new(b"_progress_multi".to_vec()).pack(&[FieldValue::String(sorted.join(","))])
}

/// Sampling parameters for [`check_mutual_consistency`].
#[derive(Debug, Clone, Copy)]
pub struct MutualCheckConfig {
    /// Maximum number of forward entries to sample.
    pub sample_size: usize,
}

impl Default for MutualCheckConfig {
    fn default() -> Self {
        Self { sample_size: 1000 }
    }
}

/// Bring `targets` (one or many indexes over `record_type`) from
/// `write_only` to `readable`, processing every existing record in
/// batches sized by `throttler` (spec §4.7 steps 1-7).
///
/// Crash-safe: the `RangeSet` only advances once both the data batch and
/// its progress record have committed, so re-running this after a crash
/// mid-build resumes exactly where it left off (re-processing at most one
/// partially-committed batch, which is idempotent since every entry is
/// keyed by `(values, id)` with an empty value).
pub fn build_indexes<D>(
    db: &D,
    cache: &GrvCache,
    runner_config: &RunnerConfig,
    throttler: &AdaptiveThrottler,
    record_type: &RecordType,
    targets: &[Arc<dyn IndexDefinition<FieldValue> + Send + Sync>],
    limits: &Limits,
) -> Result<()>
where
    D: Database,
{
    let target_names: Vec<&str> = targets.iter().map(|t| t.name()).collect();
    let progress_key = progress_key(&target_names);

    with_transaction(db, cache, runner_config, |txn| {
        for name in &target_names {
            enable(txn, name)?;
        }
        Ok(())
    })?;

    let (type_begin, type_end) = record_type.subspace().range();
    let mut range_set = with_transaction(db, cache, runner_config, |txn| {
        match txn.get(&progress_key, false)? {
            Some(bytes) => RangeSet::from_bytes(&bytes)
                .map_err(|e| RecordGraphError::Storage(format!("corrupt range set: {e}"))),
            None => Ok(RangeSet::init(KeyRange::new(type_begin.clone(), type_end.clone()))),
        }
    })?;

    while let Some((range_index, begin, end)) = range_set.next_batch_bounds() {
        let batch_size = throttler.batch_size() as usize;
        let batch_start = Instant::now();

        let outcome = with_transaction(db, cache, runner_config, |txn| {
            let rows = txn.get_range(&begin, &end, false)?;
            let mut last_key = None;
            let mut processed = 0usize;
            for (key, value) in rows.into_iter().take(batch_size) {
                let Some(Ok(id)) = record_type.subspace().unpack(&key) else { continue };
                let record = record_type::decode(&value)?;
                for target in targets {
                    scan_item(txn, target.as_ref(), &record, &id, limits)?;
                }
                last_key = Some(key);
                processed += 1;
            }
            Ok((processed, last_key))
        });

        match outcome {
            Ok((processed, last_key)) => {
                throttler.record_success(processed as u64, batch_start.elapsed());
                match last_key {
                    Some(k) => range_set.record_progress(range_index, k, processed < batch_size),
                    None => range_set.mark_range_complete(range_index),
                }
                range_set.normalize();
                with_transaction(db, cache, runner_config, |txn| {
                    let bytes = range_set
                        .to_bytes()
                        .map_err(|e| RecordGraphError::Storage(format!("range set encode failed: {e}")))?;
                    txn.set(&progress_key, &bytes);
                    Ok(())
                })?;
            }
            Err(e) => {
                throttler.record_failure(&e);
                if !AdaptiveThrottler::is_retryable(&e) {
                    return Err(e);
                }
                throttler.wait_before_next_batch();
                continue;
            }
        }
        throttler.wait_before_next_batch();
    }

    with_transaction(db, cache, runner_config, |txn| {
        for name in &target_names {
            make_readable(txn, name)?;
        }
        txn.clear(&progress_key);
        Ok(())
    })?;

    info!(targets = ?target_names, "online index build complete");
    Ok(())
}

/// Sample up to `config.sample_size` forward entries of `forward` and
/// verify a reverse entry exists in `reverse` for each, reporting — never
/// failing — inconsistencies (spec §4.7 "Mutual consistency check").
/// `reverse_of` maps a forward entry's bound values to the values a
/// well-formed reverse entry should carry (e.g. swap `(a, b)` to `(b, a)`).
pub fn check_mutual_consistency<D>(
    db: &D,
    forward_index_name: &str,
    reverse_index_name: &str,
    reverse_of: impl Fn(&[FieldValue]) -> Vec<FieldValue>,
    config: MutualCheckConfig,
) -> Result<Vec<Vec<FieldValue>>>
where
    D: Database,
{
    let forward_subspace = Subspace::new(b"I".to_vec()).child(forward_index_name);
    let reverse_subspace = Subspace::new(b"I".to_vec()).child(reverse_index_name);
    let txn = db.create_transaction();
    let (begin, end) = forward_subspace.range();
    let rows = txn.get_range(&begin, &end, true)?;

    let mut inconsistencies = Vec::new();
    for (key, _) in rows.into_iter().take(config.sample_size) {
        let Some(Ok(values)) = forward_subspace.unpack(&key) else { continue };
        let expected = reverse_of(&values);
        let reverse_key = reverse_subspace.pack(&expected);
        if txn.get(&reverse_key, true)?.is_none() {
            inconsistencies.push(values);
        }
    }
    if !inconsistencies.is_empty() {
        tracing::warn!(
            forward = forward_index_name,
            reverse = reverse_index_name,
            count = inconsistencies.len(),
            "mutual index consistency check found mismatches"
        );
    }
    Ok(inconsistencies)
}
