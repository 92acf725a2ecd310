//! Format Version Manager (spec §4.4): the compatibility gate run once at
//! store open, against the persisted `_format/version` key (spec §6.3).

use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::format_version::{check_compatibility, FormatVersionError};
use recordgraph_core::traits::{Database, Transaction};
use recordgraph_core::FormatVersion;

const FORMAT_VERSION_KEY: &[u8] = b"_format/version";

fn map_err(e: FormatVersionError) -> RecordGraphError {
    match e {
        FormatVersionError::TooOld { .. } => RecordGraphError::FormatVersionTooOld(e),
        FormatVersionError::TooNew { .. } => RecordGraphError::FormatVersionTooNew(e),
        FormatVersionError::MajorVersionMismatch { .. } => RecordGraphError::FormatMajorMismatch(e),
    }
}

/// Run the format version gate against `db`. If no version is stored,
/// writes `current`. If the stored version is older than `current` but
/// shares its major, performs the (trivial, in this reference store)
/// online upgrade by rewriting the key to `current`. Fails per the
/// decision table in spec §4.4 otherwise.
pub fn open_format_version<D: Database>(
    db: &D,
    current: FormatVersion,
    minimum_supported: FormatVersion,
) -> Result<()> {
    let mut txn = db.create_transaction();
    let existing = txn.get(FORMAT_VERSION_KEY, false)?;
    match existing {
        None => {
            txn.set(FORMAT_VERSION_KEY, &current.to_bytes());
            txn.commit()?;
            Ok(())
        }
        Some(bytes) => {
            let stored = FormatVersion::from_bytes(&bytes).ok_or_else(|| {
                RecordGraphError::FormatUpgradeFailed("corrupt _format/version value".into())
            })?;
            match check_compatibility(stored, minimum_supported, current) {
                Ok(Some(_older)) => {
                    txn.set(FORMAT_VERSION_KEY, &current.to_bytes());
                    txn.commit()?;
                    Ok(())
                }
                Ok(None) => Ok(()),
                Err(e) => Err(map_err(e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDatabase;

    #[test]
    fn first_open_writes_current() {
        let db = MemoryDatabase::new();
        let current = FormatVersion::new(1, 0, 0);
        open_format_version(&db, current, FormatVersion::new(1, 0, 0)).unwrap();
        let txn = db.create_transaction();
        let stored = FormatVersion::from_bytes(&txn.get(FORMAT_VERSION_KEY, false).unwrap().unwrap()).unwrap();
        assert_eq!(stored, current);
    }

    #[test]
    fn online_upgrade_within_major() {
        let db = MemoryDatabase::new();
        open_format_version(&db, FormatVersion::new(1, 0, 0), FormatVersion::new(1, 0, 0)).unwrap();
        open_format_version(&db, FormatVersion::new(1, 3, 0), FormatVersion::new(1, 0, 0)).unwrap();
        let txn = db.create_transaction();
        let stored = FormatVersion::from_bytes(&txn.get(FORMAT_VERSION_KEY, false).unwrap().unwrap()).unwrap();
        assert_eq!(stored, FormatVersion::new(1, 3, 0));
    }

    #[test]
    fn major_mismatch_fails() {
        let db = MemoryDatabase::new();
        open_format_version(&db, FormatVersion::new(2, 0, 0), FormatVersion::new(2, 0, 0)).unwrap();
        let err = open_format_version(&db, FormatVersion::new(1, 0, 0), FormatVersion::new(1, 0, 0)).unwrap_err();
        assert!(matches!(err, RecordGraphError::FormatVersionTooNew(_)));
    }
}
