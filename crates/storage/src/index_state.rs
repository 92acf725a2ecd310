//! Index State Machine (spec §4.6): the per-index lifecycle persisted
//! under `T/<indexName>` (spec §6.3).
//!
//! ```text
//! disabled --enable--> write_only --makeReadable--> readable
//!                                   \--remove-----> removed
//! disabled --remove--> removed
//! ```

use recordgraph_core::error::Result;
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::traits::Transaction;
use recordgraph_core::value::FieldValue;
use tracing::warn;

/// One index's current lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    /// Not yet built; readers ignore it, writers don't maintain it.
    Disabled,
    /// Writers maintain it for new/changed records; readers must not use
    /// it (historical entries may still be missing).
    WriteOnly,
    /// Fully built; writers maintain it, readers may use it.
    Readable,
    /// Logically gone; no reader or writer touches it. Leftover bytes may
    /// be garbage-collected lazily.
    Removed,
}

impl IndexState {
    fn to_byte(self) -> u8 {
        match self {
            IndexState::Disabled => 0,
            IndexState::WriteOnly => 1,
            IndexState::Readable => 2,
            IndexState::Removed => 3,
        }
    }

    fn from_byte(b: u8) -> Option<IndexState> {
        match b {
            0 => Some(IndexState::Disabled),
            1 => Some(IndexState::WriteOnly),
            2 => Some(IndexState::Readable),
            3 => Some(IndexState::Removed),
            _ => None,
        }
    }
}

fn state_key(index_name: &str) -> Vec<u8> {
    Subspace::new(b"T".to_vec()).pack(&[FieldValue::String(index_name.to_string())])
}

/// Read an index's persisted state, defaulting to [`IndexState::Disabled`]
/// when no state has ever been written.
pub fn current_state<T: Transaction>(txn: &T, index_name: &str) -> Result<IndexState> {
    match txn.get(&state_key(index_name), false)? {
        None => Ok(IndexState::Disabled),
        Some(bytes) => Ok(bytes.first().copied().and_then(IndexState::from_byte).unwrap_or(IndexState::Disabled)),
    }
}

fn set_state<T: Transaction>(txn: &mut T, index_name: &str, state: IndexState) {
    txn.set(&state_key(index_name), &[state.to_byte()]);
}

/// `disabled --enable--> write_only`. Concurrent writers observe the new
/// state on their next read and begin maintaining the index.
pub fn enable<T: Transaction>(txn: &mut T, index_name: &str) -> Result<()> {
    let current = current_state(txn, index_name)?;
    if current != IndexState::Disabled {
        warn!(index = index_name, ?current, "enable() called on a non-disabled index");
    }
    set_state(txn, index_name, IndexState::WriteOnly);
    Ok(())
}

/// `write_only --makeReadable--> readable`, the transition the online
/// indexer performs once a build completes.
pub fn make_readable<T: Transaction>(txn: &mut T, index_name: &str) -> Result<()> {
    let current = current_state(txn, index_name)?;
    if current != IndexState::WriteOnly {
        warn!(index = index_name, ?current, "makeReadable() called outside write_only");
    }
    set_state(txn, index_name, IndexState::Readable);
    Ok(())
}

/// `{disabled, write_only, readable} --remove--> removed`.
pub fn remove<T: Transaction>(txn: &mut T, index_name: &str) -> Result<()> {
    set_state(txn, index_name, IndexState::Removed);
    Ok(())
}

/// Whether a write path must maintain this index (spec §4.6:
/// `write_only ∪ readable`).
pub fn is_maintained(state: IndexState) -> bool {
    matches!(state, IndexState::WriteOnly | IndexState::Readable)
}

/// Whether a read path may use this index.
pub fn is_readable(state: IndexState) -> bool {
    state == IndexState::Readable
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordgraph_durability::MemoryDatabase;
    use recordgraph_core::traits::Database;

    #[test]
    fn lifecycle_transitions() {
        let db = MemoryDatabase::new();
        let mut txn = db.create_transaction();
        assert_eq!(current_state(&txn, "by_email").unwrap(), IndexState::Disabled);

        enable(&mut txn, "by_email").unwrap();
        assert_eq!(current_state(&txn, "by_email").unwrap(), IndexState::WriteOnly);

        make_readable(&mut txn, "by_email").unwrap();
        assert_eq!(current_state(&txn, "by_email").unwrap(), IndexState::Readable);

        remove(&mut txn, "by_email").unwrap();
        assert_eq!(current_state(&txn, "by_email").unwrap(), IndexState::Removed);
    }

    #[test]
    fn maintained_and_readable_predicates() {
        assert!(is_maintained(IndexState::WriteOnly));
        assert!(is_maintained(IndexState::Readable));
        assert!(!is_maintained(IndexState::Disabled));
        assert!(!is_maintained(IndexState::Removed));

        assert!(is_readable(IndexState::Readable));
        assert!(!is_readable(IndexState::WriteOnly));
    }

    #[test]
    fn disabled_can_be_removed_directly() {
        let db = MemoryDatabase::new();
        let mut txn = db.create_transaction();
        remove(&mut txn, "unused").unwrap();
        assert_eq!(current_state(&txn, "unused").unwrap(), IndexState::Removed);
    }
}
