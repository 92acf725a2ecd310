//! Core types shared across the record/graph storage and query engine:
//!
//! - [`keyspace`]: order-preserving tuple packing and subspace helpers
//!   (spec §4.1, Keyspace Layout).
//! - [`value`]: [`value::FieldValue`], the dynamically-typed value used by
//!   records, triples, and query solutions (spec §4.11.2).
//! - [`range_set`]: [`range_set::RangeSet`], the durable continuation for
//!   resumable batch work (spec §4.2).
//! - [`format_version`]: store format compatibility gating (spec §4.4).
//! - [`limits`]: size ceilings enforced on the write path (spec §4.5, §4.8).
//! - [`error`]: the workspace's shared error taxonomy (spec §6.4).
//! - [`traits`]: the KV collaborator interface the rest of the workspace
//!   consumes (spec §6.1).

#![warn(missing_docs)]

pub mod error;
pub mod format_version;
pub mod keyspace;
pub mod limits;
pub mod range_set;
pub mod traits;
pub mod value;

pub use error::{RecordGraphError, Result};
pub use format_version::FormatVersion;
pub use keyspace::{strinc, Subspace};
pub use limits::Limits;
pub use range_set::{KeyRange, RangeSet};
pub use value::FieldValue;
