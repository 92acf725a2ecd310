//! Index lifecycle and maintenance (spec §4.5, §4.6): the pieces the
//! online indexer (`recordgraph-engine`) and write session drive in
//! lockstep to keep index entries consistent with record state.

#![warn(missing_docs)]

pub mod index_state;
pub mod maintainer;

pub use index_state::{current_state, enable, is_maintained, is_readable, make_readable, remove, IndexState};
pub use maintainer::{delete_entries, insert_entries, scan_item, IndexDefinition};
