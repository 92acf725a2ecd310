//! # RecordGraph
//!
//! A transactional record and graph store layered on an ordered,
//! strictly-serializable KV collaborator (spec §1).
//!
//! RecordGraph adds, on top of that collaborator: deterministic keyspace
//! layout and tuple packing, optimistic-concurrency transaction retry with
//! adaptive throttling, online/resumable index building, a write session
//! with size policing and autosave, and a hexastore-backed SPARQL algebra
//! evaluator for graph data stored alongside ordinary records.
//!
//! # Quick start
//!
//! ```no_run
//! use recordgraph::{Container, ContainerConfig, MemoryDatabase, RecordType, Schema};
//!
//! let schema = Schema { types: vec![RecordType::new("user", vec![0])], graphs: vec![] };
//! let container = Container::open(MemoryDatabase::new(), schema, ContainerConfig::default());
//! let ctx = container.new_context(None);
//!
//! ctx.insert("user", recordgraph::FieldValue::Array(vec![
//!     recordgraph::FieldValue::String("alice".into()),
//! ]))?;
//! ctx.save()?;
//!
//! let users = ctx.query("user").fetch()?;
//! assert_eq!(users.len(), 1);
//! # Ok::<(), recordgraph::RecordGraphError>(())
//! ```
//!
//! # Architecture
//!
//! [`Container`] is the application-facing entry point: it owns the
//! declared [`Schema`] and the collaborators every [`Context`] shares (the
//! GRV cache, named hexastores, the performance monitor). [`Context`] is a
//! use-session over one container, exposing inserts/deletes/fetches, the
//! fluent [`Query`] builder, and a [`SparqlEntryPoint`] for graph patterns.
//!
//! Internal crates (`recordgraph-core`, `recordgraph-concurrency`,
//! `recordgraph-durability`, `recordgraph-storage`, `recordgraph-engine`,
//! `recordgraph-graph`) implement the keyspace layout, throttling,
//! transaction retry, index lifecycle, and hexastore/SPARQL evaluation this
//! crate binds together; only the surface re-exported here is stable.

#![warn(missing_docs)]

pub use recordgraph_api::{
    CollectionStatistics, Container, ContainerConfig, Context, ExplainPlan, IndexStatistics,
    PerfMonitor, PerfMonitorConfig, PerfSnapshot, Query, Schema, SlowQueryEntry,
    SparqlEntryPoint, SparqlQuery, StatisticsSnapshot,
};
pub use recordgraph_core::{strinc, FieldValue, Limits, RecordGraphError, Result, Subspace};
pub use recordgraph_durability::{GrvCache, MemoryDatabase};
pub use recordgraph_engine::{FieldPathIndex, RecordType, RunnerConfig};
pub use recordgraph_graph::{
    apply_modifiers, evaluate_path, evaluate_pattern, normalize_path, reachable, Aggregate,
    AggregateBinding, ArithOp, CmpOp, EvalStats, Expr, Hexastore, Modifiers, Ordering, Pattern,
    PathLimits, PropertyPath, Solution, Term, Triple, TriplePattern,
};
pub use recordgraph_concurrency::{AdaptiveThrottler, ThrottleConfig};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quick_start_round_trips_a_record() {
        let schema = Schema { types: vec![RecordType::new("user", vec![0])], graphs: vec![] };
        let container = Container::open(MemoryDatabase::new(), schema, ContainerConfig::default());
        let ctx = container.new_context(None);

        ctx.insert("user", FieldValue::Array(vec![FieldValue::String("alice".into())])).unwrap();
        ctx.save().unwrap();

        let users = ctx.query("user").fetch().unwrap();
        assert_eq!(users.len(), 1);
    }
}
