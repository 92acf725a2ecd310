//! Range-Set / Continuation (spec §4.2): a durable progress record for
//! resumable batch work over one or more key ranges.
//!
//! Grounded on the teacher's WAL/segment continuation bookkeeping
//! (`crates/durability/src/wal/reader.rs`), generalized from "next WAL
//! offset to replay" to "next key to resume a range scan from".

use serde::{Deserialize, Serialize};

/// Half-open byte-key range `[begin, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    /// Inclusive lower bound.
    pub begin: Vec<u8>,
    /// Exclusive upper bound.
    pub end: Vec<u8>,
}

impl KeyRange {
    /// Construct a range.
    pub fn new(begin: Vec<u8>, end: Vec<u8>) -> Self {
        Self { begin, end }
    }
}

/// One remainder of work: a range plus how far a previous batch got.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeContinuation {
    /// The range this continuation tracks.
    pub range: KeyRange,
    /// The last key fully processed in this range, if any batch has run.
    pub last_processed_key: Option<Vec<u8>>,
    /// Whether this range has been fully processed.
    pub complete: bool,
}

impl RangeContinuation {
    fn new(range: KeyRange) -> Self {
        Self { range, last_processed_key: None, complete: false }
    }

    /// `nextBatchBegin = lastProcessedKey ++ 0x00` if present, else `begin`
    /// (spec §4.2 invariant).
    fn next_batch_begin(&self) -> Vec<u8> {
        match &self.last_processed_key {
            Some(k) => {
                let mut v = k.clone();
                v.push(0x00);
                v
            }
            None => self.range.begin.clone(),
        }
    }

    fn has_more(&self) -> bool {
        !self.complete && self.next_batch_begin() < self.range.end
    }
}

/// An ordered, versioned, self-describing progress record over one or more
/// key ranges (spec §3.1, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeSet {
    /// Format marker so future encodings can evolve; bumped only on a
    /// breaking change to the blob layout.
    version: u32,
    remainders: Vec<RangeContinuation>,
}

const RANGE_SET_VERSION: u32 = 1;

impl RangeSet {
    /// Initialize with a single range.
    pub fn init(range: KeyRange) -> Self {
        Self::init_many(vec![range])
    }

    /// Initialize with many ranges, normalized (sorted by `begin`).
    pub fn init_many(ranges: Vec<KeyRange>) -> Self {
        let mut remainders: Vec<RangeContinuation> =
            ranges.into_iter().map(RangeContinuation::new).collect();
        remainders.sort_by(|a, b| a.range.begin.cmp(&b.range.begin));
        let mut s = Self { version: RANGE_SET_VERSION, remainders };
        s.normalize();
        s
    }

    /// Next incomplete range to process, as `(rangeIndex, begin, end)`.
    ///
    /// Returns the first range (in stored order) with remaining work.
    pub fn next_batch_bounds(&self) -> Option<(usize, Vec<u8>, Vec<u8>)> {
        self.remainders.iter().enumerate().find_map(|(i, r)| {
            if r.has_more() {
                Some((i, r.next_batch_begin(), r.range.end.clone()))
            } else {
                None
            }
        })
    }

    /// Record progress within a range after a batch.
    ///
    /// `is_complete` should be `count_in_batch < batch_size` (spec §4.2's
    /// invariant: after recording with `complete = (count < batchSize)`,
    /// the next resumption begins strictly after `last_key`).
    pub fn record_progress(&mut self, range_index: usize, last_key: Vec<u8>, is_complete: bool) {
        if let Some(r) = self.remainders.get_mut(range_index) {
            r.last_processed_key = Some(last_key);
            r.complete = is_complete;
        }
    }

    /// Force a range to complete, e.g. when a batch yielded zero records
    /// over a live range (spec §4.7 step 4).
    pub fn mark_range_complete(&mut self, range_index: usize) {
        if let Some(r) = self.remainders.get_mut(range_index) {
            r.complete = true;
        }
    }

    /// Merge overlapping/adjacent incomplete remainders. Complete ranges
    /// are dropped (their work is done and never revisited).
    pub fn normalize(&mut self) {
        self.remainders.retain(|r| !r.complete);
        self.remainders.sort_by(|a, b| a.range.begin.cmp(&b.range.begin));
        let mut merged: Vec<RangeContinuation> = Vec::new();
        for r in self.remainders.drain(..) {
            if let Some(last) = merged.last_mut() {
                if r.range.begin <= last.range.end {
                    if r.range.end > last.range.end {
                        last.range.end = r.range.end;
                    }
                    continue;
                }
            }
            merged.push(r);
        }
        self.remainders = merged;
    }

    /// `true` while any range still has unfinished work.
    pub fn has_more_to_process(&self) -> bool {
        self.remainders.iter().any(|r| r.has_more())
    }

    /// Byte-proportional progress estimate in `[0.0, 1.0]`.
    ///
    /// Approximates "bytes done / bytes total" using key-byte-length as a
    /// proxy for data volume (the precise byte-size metric lives with the
    /// KV collaborator; this is the estimate the core can compute without
    /// it).
    pub fn progress_estimate(&self) -> f64 {
        if self.remainders.is_empty() {
            return 1.0;
        }
        let mut total = 0u64;
        let mut done = 0u64;
        for r in &self.remainders {
            let span = byte_span(&r.range.begin, &r.range.end);
            total += span;
            let done_span = match &r.last_processed_key {
                Some(k) => byte_span(&r.range.begin, k),
                None => 0,
            };
            done += done_span.min(span);
        }
        if total == 0 {
            1.0
        } else {
            done as f64 / total as f64
        }
    }

    /// Serialize to an opaque, versioned blob (MessagePack, matching the
    /// teacher's choice of `rmp-serde` for durable records).
    pub fn to_bytes(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec(self)
    }

    /// Deserialize from a blob produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    /// Number of distinct remainders currently tracked (for diagnostics).
    pub fn remainder_count(&self) -> usize {
        self.remainders.len()
    }
}

/// A crude order-preserving "byte distance" between two keys, used only for
/// `progress_estimate`'s proportional approximation.
fn byte_span(a: &[u8], b: &[u8]) -> u64 {
    let len = a.len().max(b.len()).min(8);
    let mut pa = [0u8; 8];
    let mut pb = [0u8; 8];
    pa[..a.len().min(8)].copy_from_slice(&a[..a.len().min(8)]);
    pb[..b.len().min(8)].copy_from_slice(&b[..b.len().min(8)]);
    let _ = len;
    u64::from_be_bytes(pb).saturating_sub(u64::from_be_bytes(pa))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn range(b: &str, e: &str) -> KeyRange {
        KeyRange::new(b.as_bytes().to_vec(), e.as_bytes().to_vec())
    }

    #[test]
    fn single_range_lifecycle() {
        let mut rs = RangeSet::init(range("a", "z"));
        let (idx, begin, end) = rs.next_batch_bounds().unwrap();
        assert_eq!(begin, b"a");
        assert_eq!(end, b"z");
        rs.record_progress(idx, b"m".to_vec(), false);
        let (_, begin2, _) = rs.next_batch_bounds().unwrap();
        assert!(begin2 > b"m".to_vec(), "next batch begin must strictly increase");
        rs.record_progress(idx, b"y".to_vec(), true);
        assert!(!rs.has_more_to_process());
    }

    #[test]
    fn zero_item_batch_marks_complete() {
        let mut rs = RangeSet::init(range("a", "z"));
        let (idx, _, _) = rs.next_batch_bounds().unwrap();
        rs.mark_range_complete(idx);
        assert!(!rs.has_more_to_process());
    }

    #[test]
    fn next_batch_begin_strictly_increases() {
        let mut rs = RangeSet::init(range("a", "z"));
        let mut prev: Option<Vec<u8>> = None;
        for i in 0..5 {
            let (idx, begin, _) = rs.next_batch_bounds().unwrap();
            if let Some(p) = &prev {
                assert!(begin > *p);
            }
            prev = Some(begin.clone());
            let last = [b'a' + i + 1];
            rs.record_progress(idx, last.to_vec(), false);
        }
    }

    #[test]
    fn normalize_merges_sorted_adjacent() {
        let rs = RangeSet::init_many(vec![range("m", "z"), range("a", "n")]);
        assert_eq!(rs.remainder_count(), 1);
    }

    #[test]
    fn roundtrip_bytes() {
        let rs = RangeSet::init(range("a", "z"));
        let bytes = rs.to_bytes().unwrap();
        let back = RangeSet::from_bytes(&bytes).unwrap();
        assert_eq!(back.remainder_count(), rs.remainder_count());
    }
}
