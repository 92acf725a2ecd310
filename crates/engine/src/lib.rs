//! Write path orchestration: the transaction runner (spec §4.9), the write
//! session (spec §4.8), record type registration (spec §3.1), and the
//! online indexer (spec §4.7) that builds indexes in the background.

#![warn(missing_docs)]

pub mod online_indexer;
pub mod record_type;
pub mod runner;
pub mod write_session;

pub use online_indexer::{build_indexes, check_mutual_consistency, MutualCheckConfig};
pub use record_type::{FieldPathIndex, RecordType};
pub use runner::{with_transaction, RunnerConfig};
pub use write_session::{AutosaveHandle, WriteSession};
