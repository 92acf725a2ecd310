//! Durability-adjacent collaborators (spec §4.4, §4.9, §6.1): the KV
//! collaborator contract's in-memory reference implementation, the GRV
//! cache, and the open-time format version gate.

#![warn(missing_docs)]

pub mod format_open;
pub mod grv_cache;
pub mod memory;

pub use format_open::open_format_version;
pub use grv_cache::GrvCache;
pub use memory::{MemoryDatabase, MemoryTransaction};
