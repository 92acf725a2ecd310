//! Public API layer: [`Container`] and [`Context`] bind the storage,
//! concurrency, engine, and graph crates into the surface applications
//! actually call (spec §6.2).
//!
//! ## Quick start
//!
//! ```ignore
//! use recordgraph_api::{Container, ContainerConfig, Schema};
//! use recordgraph_durability::MemoryDatabase;
//!
//! let container = Container::open(MemoryDatabase::new(), Schema::default(), ContainerConfig::default());
//! let ctx = container.new_context(None);
//! ctx.insert("user", record)?;
//! ctx.save()?;
//! let results = ctx.query("user").fetch()?;
//! ```

#![warn(missing_docs)]

pub mod admin;
pub mod container;
pub mod context;
pub mod perf;
pub mod query;
pub mod sparql;

pub use admin::{CollectionStatistics, ExplainPlan, IndexStatistics, StatisticsSnapshot};
pub use container::{Container, ContainerConfig, Schema};
pub use context::Context;
pub use perf::{PerfMonitor, PerfMonitorConfig, PerfSnapshot, SlowQueryEntry};
pub use query::Query;
pub use sparql::{SparqlEntryPoint, SparqlQuery};
