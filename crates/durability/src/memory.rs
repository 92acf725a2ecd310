//! In-memory reference implementation of the KV collaborator interface
//! (spec §6.1, SPEC_FULL.md §A2.4).
//!
//! Grounded on the teacher's optimistic-concurrency validation convention
//! (`crates/concurrency/src/validation.rs`): "first-committer-wins based on
//! READ-SET, not write-set" and "write skew is ALLOWED, do not try to
//! prevent it". Generalized from Strata's fixed `(Namespace, TypeTag, Key)`
//! storage to arbitrary ordered byte keys, and from a WAL-backed store to a
//! pure in-memory `BTreeMap` (the real KV store's durability is out of
//! scope per spec §1's Non-goals — this stands in for it in tests).

use parking_lot::{Condvar, Mutex};
use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::traits::{Database, KvPair, Transaction};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

type Entry = (u64, Option<Vec<u8>>); // (version written at, tombstone if None)

struct Inner {
    data: BTreeMap<Vec<u8>, Entry>,
    version: u64,
}

struct WatchRegistry {
    generation: Mutex<HashMap<Vec<u8>, u64>>,
    cvar: Condvar,
}

/// An in-memory, strictly-serializable (via OCC read-set validation)
/// ordered byte-key store.
#[derive(Clone)]
pub struct MemoryDatabase {
    inner: Arc<Mutex<Inner>>,
    watch: Arc<WatchRegistry>,
}

impl Default for MemoryDatabase {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDatabase {
    /// Construct an empty database.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner { data: BTreeMap::new(), version: 0 })),
            watch: Arc::new(WatchRegistry { generation: Mutex::new(HashMap::new()), cvar: Condvar::new() }),
        }
    }

    /// Current globally committed version.
    pub fn current_version(&self) -> u64 {
        self.inner.lock().version
    }
}

impl Database for MemoryDatabase {
    type Txn = MemoryTransaction;

    fn create_transaction(&self) -> MemoryTransaction {
        let read_version = self.inner.lock().version;
        MemoryTransaction {
            inner: self.inner.clone(),
            watch: self.watch.clone(),
            read_version,
            point_reads: RefCell::new(HashMap::new()),
            range_reads: RefCell::new(Vec::new()),
            writes: HashMap::new(),
            clear_ranges: Vec::new(),
            approximate_size: 0,
            committed_version: None,
            cancelled: false,
        }
    }

    fn watch(&self, key: &[u8]) -> Result<()> {
        let mut guard = self.watch.generation.lock();
        let baseline = *guard.get(key).unwrap_or(&0);
        while *guard.get(key).unwrap_or(&0) == baseline {
            self.watch.cvar.wait(&mut guard);
        }
        Ok(())
    }

    fn estimated_storage_size(&self) -> u64 {
        let inner = self.inner.lock();
        inner
            .data
            .iter()
            .map(|(k, (_, v))| k.len() as u64 + v.as_ref().map(|v| v.len()).unwrap_or(0) as u64)
            .sum()
    }
}

/// A single optimistic-concurrency transaction against a [`MemoryDatabase`].
pub struct MemoryTransaction {
    inner: Arc<Mutex<Inner>>,
    watch: Arc<WatchRegistry>,
    read_version: u64,
    point_reads: RefCell<HashMap<Vec<u8>, u64>>,
    range_reads: RefCell<Vec<(Vec<u8>, Vec<u8>, u64)>>,
    writes: HashMap<Vec<u8>, Option<Vec<u8>>>,
    clear_ranges: Vec<(Vec<u8>, Vec<u8>)>,
    approximate_size: usize,
    committed_version: Option<u64>,
    cancelled: bool,
}

impl Transaction for MemoryTransaction {
    fn get(&self, key: &[u8], snapshot: bool) -> Result<Option<Vec<u8>>> {
        if let Some(pending) = self.writes.get(key) {
            return Ok(pending.clone());
        }
        let inner = self.inner.lock();
        let value = inner.data.get(key).and_then(|(_, v)| v.clone());
        drop(inner);
        if !snapshot {
            self.note_read(key);
        }
        Ok(value)
    }

    fn get_range(&self, begin: &[u8], end: &[u8], snapshot: bool) -> Result<Vec<KvPair>> {
        let inner = self.inner.lock();
        let mut out: Vec<KvPair> = inner
            .data
            .range(begin.to_vec()..end.to_vec())
            .filter_map(|(k, (_, v))| v.clone().map(|v| (k.clone(), v)))
            .collect();
        drop(inner);
        for (k, pending) in &self.writes {
            if k.as_slice() >= begin && k.as_slice() < end {
                out.retain(|(ek, _)| ek != k);
                if let Some(v) = pending {
                    out.push((k.clone(), v.clone()));
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        if !snapshot {
            self.note_range_read(begin, end);
        }
        Ok(out)
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        self.approximate_size += key.len() + value.len();
        self.writes.insert(key.to_vec(), Some(value.to_vec()));
    }

    fn clear(&mut self, key: &[u8]) {
        self.approximate_size += key.len();
        self.writes.insert(key.to_vec(), None);
    }

    fn clear_range(&mut self, begin: &[u8], end: &[u8]) {
        self.approximate_size += begin.len() + end.len();
        self.clear_ranges.push((begin.to_vec(), end.to_vec()));
    }

    fn set_read_version(&mut self, version: u64) {
        self.read_version = version;
    }

    fn read_version(&self) -> u64 {
        self.read_version
    }

    fn approximate_size(&self) -> usize {
        self.approximate_size
    }

    fn commit(&mut self) -> Result<bool> {
        let mut inner = self.inner.lock();

        for (key, seen) in self.point_reads.borrow().iter() {
            let actual = inner.data.get(key).map(|(v, _)| *v).unwrap_or(0);
            if actual != *seen {
                return Err(RecordGraphError::Storage("conflict: read-write conflict".into()));
            }
        }
        for (begin, end, snapshot) in self.range_reads.borrow().iter() {
            for (_, (v, _)) in inner.data.range(begin.clone()..end.clone()) {
                if *v > *snapshot {
                    return Err(RecordGraphError::Storage("conflict: range read-write conflict".into()));
                }
            }
        }

        let new_version = inner.version + 1;
        let mut touched_keys: Vec<Vec<u8>> = Vec::new();

        for (begin, end) in &self.clear_ranges {
            let keys: Vec<Vec<u8>> = inner.data.range(begin.clone()..end.clone()).map(|(k, _)| k.clone()).collect();
            for k in keys {
                inner.data.insert(k.clone(), (new_version, None));
                touched_keys.push(k);
            }
        }
        for (key, value) in self.writes.drain() {
            inner.data.insert(key.clone(), (new_version, value));
            touched_keys.push(key);
        }
        inner.version = new_version;
        self.committed_version = Some(new_version);
        drop(inner);

        if !touched_keys.is_empty() {
            {
                let mut gen = self.watch.generation.lock();
                for k in &touched_keys {
                    *gen.entry(k.clone()).or_insert(0) += 1;
                }
            }
            self.watch.cvar.notify_all();
        }
        Ok(true)
    }

    fn committed_version(&self) -> Option<u64> {
        self.committed_version
    }

    fn cancel(&mut self) {
        self.cancelled = true;
        self.writes.clear();
        self.clear_ranges.clear();
    }
}

impl MemoryTransaction {
    /// Record a point read for optimistic-concurrency validation. Called
    /// from `get` itself for every non-snapshot read, so every real read
    /// path (write session, online indexer, graph evaluator) enters the
    /// read set automatically rather than needing to opt in.
    pub fn note_read(&self, key: &[u8]) {
        let inner = self.inner.lock();
        let version = inner.data.get(key).map(|(v, _)| *v).unwrap_or(0);
        drop(inner);
        self.point_reads.borrow_mut().insert(key.to_vec(), version);
    }

    /// Record a range read for conflict validation, snapshotting the
    /// current global version as the "nothing in this range may change
    /// after this" watermark. Called from `get_range` for every
    /// non-snapshot scan.
    pub fn note_range_read(&self, begin: &[u8], end: &[u8]) {
        let version = self.inner.lock().version;
        self.range_reads.borrow_mut().push((begin.to_vec(), end.to_vec(), version));
    }

    /// Whether this transaction was cancelled without committing.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}
