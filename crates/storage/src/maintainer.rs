//! Index Maintainer (spec §4.5): derives index entries from a record and
//! keeps them in sync with the record's lifecycle, one index at a time.

use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::limits::Limits;
use recordgraph_core::traits::Transaction;
use recordgraph_core::value::FieldValue;

/// One named index over record type `R`: an ordered list of key
/// expressions evaluated against a record. A record may produce more than
/// one entry (e.g. a multi-valued field indexed element-wise), hence the
/// outer `Vec` — each inner `Vec<FieldValue>` is one entry's key columns,
/// in declared order.
pub trait IndexDefinition<R> {
    /// The index's name, used as its subspace segment (`I/<name>/...`).
    fn name(&self) -> &str;

    /// Derive this record's index entries. Empty if the record doesn't
    /// participate in this index (e.g. an optional field is absent).
    fn key_expressions(&self, record: &R) -> Vec<Vec<FieldValue>>;
}

fn index_subspace(index_name: &str) -> Subspace {
    Subspace::new(b"I".to_vec()).child(index_name)
}

fn entry_key(index_name: &str, values: &[FieldValue], id: &[FieldValue]) -> Vec<u8> {
    let mut tuple = Vec::with_capacity(values.len() + id.len());
    tuple.extend_from_slice(values);
    tuple.extend_from_slice(id);
    index_subspace(index_name).pack(&tuple)
}

/// Write every entry `I.keyExpressions(record)` derives for `record`,
/// rejecting (without partially applying) any entry whose packed key
/// exceeds `limits.max_key_bytes`.
pub fn insert_entries<T, R>(
    txn: &mut T,
    def: &dyn IndexDefinition<R>,
    record: &R,
    id: &[FieldValue],
    limits: &Limits,
) -> Result<()>
where
    T: Transaction,
{
    let entries = def.key_expressions(record);
    let mut keys = Vec::with_capacity(entries.len());
    for values in &entries {
        let key = entry_key(def.name(), values, id);
        if key.len() > limits.max_key_bytes {
            return Err(RecordGraphError::KeyTooLarge { actual: key.len(), limit: limits.max_key_bytes });
        }
        keys.push(key);
    }
    for key in keys {
        txn.set(&key, &[]);
    }
    Ok(())
}

/// Clear every entry `I.keyExpressions(oldRecord)` derives, symmetric with
/// [`insert_entries`].
pub fn delete_entries<T, R>(txn: &mut T, def: &dyn IndexDefinition<R>, old_record: &R, id: &[FieldValue])
where
    T: Transaction,
{
    for values in def.key_expressions(old_record) {
        let key = entry_key(def.name(), &values, id);
        txn.clear(&key);
    }
}

/// The background-build variant used by the online indexer (spec §4.7
/// step 4): behaviorally identical to [`insert_entries`] — writing an
/// already-present entry is idempotent since the value is always empty —
/// kept as a distinct name so call sites read as what they are.
pub fn scan_item<T, R>(
    txn: &mut T,
    def: &dyn IndexDefinition<R>,
    record: &R,
    id: &[FieldValue],
    limits: &Limits,
) -> Result<()>
where
    T: Transaction,
{
    insert_entries(txn, def, record, id, limits)
}
