//! Interfaces consumed from the KV collaborator (spec §6.1).
//!
//! The engine treats the KV store as an external, ordered, transactional
//! byte-key/byte-value substrate. This module defines the trait boundary;
//! `recordgraph-durability::memory` is the in-process reference
//! implementation used by the rest of the workspace and its tests (spec's
//! Non-goal: "owning on-disk representation" — this crate only *consumes*
//! the interface below, it never assumes a specific backend).

use crate::error::Result;

/// One `(key, value)` pair returned by a range scan.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// A single KV transaction. Not `Send`/`Sync` by contract — spec §5
/// requires that "one KV transaction is used by at most one task at a
/// time"; callers enforce this structurally by owning the transaction for
/// the duration of one `with_transaction` closure.
pub trait Transaction {
    /// Point read. `snapshot = true` reads without adding the key to the
    /// transaction's conflict-detection read set.
    fn get(&self, key: &[u8], snapshot: bool) -> Result<Option<Vec<u8>>>;

    /// Range scan `[begin, end)`, fully materialized. Spec describes this
    /// as an async stream; synchronous materialization is the pragmatic
    /// choice for an in-process reference collaborator and is what every
    /// caller in this workspace immediately collects into a `Vec` anyway.
    fn get_range(&self, begin: &[u8], end: &[u8], snapshot: bool) -> Result<Vec<KvPair>>;

    /// Buffer a write. Visible to subsequent reads within the same
    /// transaction; durable only after `commit()` returns `Ok(true)`.
    fn set(&mut self, key: &[u8], value: &[u8]);

    /// Buffer a point deletion.
    fn clear(&mut self, key: &[u8]);

    /// Buffer a range deletion `[begin, end)`.
    fn clear_range(&mut self, begin: &[u8], end: &[u8]);

    /// Pin this transaction's read snapshot to a previously observed
    /// committed version (GRV cache reuse, spec §4.9).
    fn set_read_version(&mut self, version: u64);

    /// The read version this transaction is or will be pinned to.
    fn read_version(&self) -> u64;

    /// Approximate size in bytes of buffered writes, used for the
    /// warn/fail thresholds in spec §4.8 step 5.
    fn approximate_size(&self) -> usize;

    /// Commit buffered writes. `Ok(true)` on success; retryable failures
    /// are surfaced as `Err` with a message classified by
    /// `recordgraph_core::error::is_retryable_message`.
    fn commit(&mut self) -> Result<bool>;

    /// The version assigned to this transaction's writes, valid only after
    /// a successful `commit()`.
    fn committed_version(&self) -> Option<u64>;

    /// Abandon the transaction, releasing any resources. Safe to call
    /// after a successful commit (no-op) or on any error exit path (spec
    /// §4.9's scoped-resource discipline).
    fn cancel(&mut self);
}

/// The database handle applications open once; transactions are created
/// from it.
pub trait Database {
    /// Concrete transaction type this database produces.
    type Txn: Transaction;

    /// Begin a new transaction.
    fn create_transaction(&self) -> Self::Txn;

    /// Block until `key`'s value changes from its value at the time of the
    /// call, or return immediately if it has already changed.
    fn watch(&self, key: &[u8]) -> Result<()>;

    /// A coarse estimate of total stored bytes, exposed to
    /// `Container::estimated_storage_size` (spec §6.2).
    fn estimated_storage_size(&self) -> u64;
}
