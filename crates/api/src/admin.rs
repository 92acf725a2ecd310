//! Administrative surface (spec §6.2): query plan inspection and index
//! lifecycle management layered on top of [`Container`].
//!
//! Grounded on the teacher's substrate `retention.rs`/`trace.rs`
//! convention of exposing diagnostic read-only views as plain methods on
//! the same implementation struct the rest of the API is built from.

use crate::container::Container;
use recordgraph_core::error::Result;
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::traits::{Database, Transaction};
use recordgraph_engine::runner::with_transaction;
use recordgraph_graph::{evaluate_pattern, EvalStats, Hexastore, Pattern};
use recordgraph_storage::IndexState;
use std::collections::HashMap;

/// One node of a query plan (spec §6.2 `explain`/`explainAnalyze`).
#[derive(Debug, Clone)]
pub struct ExplainPlan {
    /// Human-readable operator label, e.g. `"Basic(2 triples)"`.
    pub operator: String,
    /// Child plans, in evaluation order.
    pub children: Vec<ExplainPlan>,
    /// Solutions actually produced at this node, present only after
    /// `explainAnalyze` ran the query.
    pub actual_cardinality: Option<usize>,
}

impl ExplainPlan {
    fn leaf(operator: impl Into<String>) -> Self {
        Self { operator: operator.into(), children: Vec::new(), actual_cardinality: None }
    }
}

fn plan_for(pattern: &Pattern) -> ExplainPlan {
    match pattern {
        Pattern::Basic(triples) => ExplainPlan::leaf(format!("Basic({} triples)", triples.len())),
        Pattern::Join(l, r) => ExplainPlan { operator: "Join".into(), children: vec![plan_for(l), plan_for(r)], actual_cardinality: None },
        Pattern::Optional(l, r) => {
            ExplainPlan { operator: "Optional".into(), children: vec![plan_for(l), plan_for(r)], actual_cardinality: None }
        }
        Pattern::Union(l, r) => ExplainPlan { operator: "Union".into(), children: vec![plan_for(l), plan_for(r)], actual_cardinality: None },
        Pattern::Minus(l, r) => ExplainPlan { operator: "Minus".into(), children: vec![plan_for(l), plan_for(r)], actual_cardinality: None },
        Pattern::Filter(inner, _) => ExplainPlan { operator: "Filter".into(), children: vec![plan_for(inner)], actual_cardinality: None },
        Pattern::GroupBy { inner, vars, aggregates, .. } => ExplainPlan {
            operator: format!("GroupBy({} vars, {} aggregates)", vars.len(), aggregates.len()),
            children: vec![plan_for(inner)],
            actual_cardinality: None,
        },
        Pattern::PropertyPath { .. } => ExplainPlan::leaf("PropertyPath"),
    }
}

/// Describe how `pattern` would be evaluated, without running it (spec
/// §6.2 `explain`).
pub fn explain(pattern: &Pattern) -> ExplainPlan {
    plan_for(pattern)
}

/// Evaluate `pattern` and annotate its plan with the cardinalities
/// actually observed (spec §6.2 `explainAnalyze`). Only the top-level
/// node's actual cardinality is filled in precisely; per-operator
/// cardinalities for `Basic` patterns come from
/// `EvalStats::intermediate_cardinalities`' final entry.
pub fn explain_analyze<D: Database>(db: &D, hexastore: &Hexastore, pattern: &Pattern) -> Result<ExplainPlan> {
    let txn = db.create_transaction();
    let mut stats = EvalStats::default();
    let solutions = evaluate_pattern(&txn, hexastore, pattern, &mut stats)?;
    let mut plan = plan_for(pattern);
    plan.actual_cardinality = Some(solutions.len());
    if let Pattern::Basic(_) = pattern {
        plan.actual_cardinality = stats.intermediate_cardinalities.last().copied().or(plan.actual_cardinality);
    }
    Ok(plan)
}

/// Record count and approximate stored bytes for one record type (spec
/// §6.2 `collectionStatistics`).
#[derive(Debug, Clone, Copy, Default)]
pub struct CollectionStatistics {
    /// Number of records currently stored.
    pub record_count: u64,
    /// Sum of stored key+value bytes for this type's records.
    pub approximate_bytes: u64,
}

/// Entry count and lifecycle state for one index (spec §6.2
/// `indexStatistics`).
#[derive(Debug, Clone, Copy)]
pub struct IndexStatistics {
    /// Number of entries currently stored under this index's subspace.
    pub entry_count: u64,
    /// The index's current lifecycle state (spec §4.6).
    pub state: IndexState,
}

/// A combined snapshot across every declared collection and index (spec
/// §6.2 `updateStatistics`). There is no persisted statistics cache to
/// invalidate — every figure here is recomputed from a fresh range scan,
/// so "updating" statistics and reading them are the same operation.
#[derive(Debug, Clone, Default)]
pub struct StatisticsSnapshot {
    /// Per-record-type statistics, keyed by type name.
    pub collections: HashMap<String, CollectionStatistics>,
    /// Per-index statistics, keyed by index name.
    pub indexes: HashMap<String, IndexStatistics>,
}

impl<D: Database + Send + Sync + 'static> Container<D> {
    /// Describe how `pattern` would be evaluated against this container's
    /// `graph_name` without running it (spec §6.2 `explain`).
    pub fn explain(&self, pattern: &Pattern) -> ExplainPlan {
        explain(pattern)
    }

    /// Run `pattern` against `graph_name` and annotate the plan with
    /// observed cardinalities (spec §6.2 `explainAnalyze`).
    pub fn explain_analyze(&self, graph_name: &str, pattern: &Pattern) -> Result<ExplainPlan> {
        let hexastore = self
            .graphs
            .get(graph_name)
            .ok_or_else(|| recordgraph_core::RecordGraphError::IndexNotFound(graph_name.to_string()))?;
        explain_analyze(self.db.as_ref(), hexastore, pattern)
    }

    /// Record count and approximate stored bytes for `type_name` (spec
    /// §6.2 `collectionStatistics`).
    pub fn collection_statistics(&self, type_name: &str) -> Result<CollectionStatistics> {
        let rt = self
            .types
            .get(type_name)
            .ok_or_else(|| recordgraph_core::RecordGraphError::ModelNotFound(type_name.to_string()))?;
        let txn = self.db.create_transaction();
        let (begin, end) = rt.subspace().range();
        let rows = txn.get_range(&begin, &end, true)?;
        let approximate_bytes = rows.iter().map(|(k, v)| (k.len() + v.len()) as u64).sum();
        Ok(CollectionStatistics { record_count: rows.len() as u64, approximate_bytes })
    }

    /// Entry count and lifecycle state for `index_name` (spec §6.2
    /// `indexStatistics`).
    pub fn index_statistics(&self, index_name: &str) -> Result<IndexStatistics> {
        let txn = self.db.create_transaction();
        let state = recordgraph_storage::current_state(&txn, index_name)?;
        let sub = Subspace::new(b"I".to_vec()).child(index_name);
        let (begin, end) = sub.range();
        let entry_count = txn.get_range(&begin, &end, true)?.len() as u64;
        Ok(IndexStatistics { entry_count, state })
    }

    /// Recompute statistics across every declared record type and every
    /// index any of them declares (spec §6.2 `updateStatistics`).
    pub fn update_statistics(&self) -> Result<StatisticsSnapshot> {
        let mut collections = HashMap::new();
        for name in self.types.keys() {
            collections.insert(name.clone(), self.collection_statistics(name)?);
        }
        let mut indexes = HashMap::new();
        for rt in self.types.values() {
            for idx in rt.indexes() {
                if !indexes.contains_key(idx.name()) {
                    indexes.insert(idx.name().to_string(), self.index_statistics(idx.name())?);
                }
            }
        }
        Ok(StatisticsSnapshot { collections, indexes })
    }

    /// Remove `index_name`'s persisted state and rebuild it from scratch
    /// via the online indexer (spec §4.7, §6.2 `rebuildIndex`).
    pub fn rebuild_index(&self, index_name: &str, throttler: &recordgraph_concurrency::AdaptiveThrottler) -> Result<()> {
        let (record_type, target) = self
            .types
            .values()
            .find_map(|rt| rt.indexes().iter().find(|i| i.name() == index_name).map(|i| (rt.clone(), i.clone())))
            .ok_or_else(|| recordgraph_core::RecordGraphError::IndexNotFound(index_name.to_string()))?;

        with_transaction(self.db.as_ref(), self.cache.as_ref(), &self.runner_config, |txn| {
            recordgraph_storage::remove(txn, index_name)
        })?;

        recordgraph_engine::build_indexes(
            self.db.as_ref(),
            self.cache.as_ref(),
            &self.runner_config,
            throttler,
            record_type.as_ref(),
            std::slice::from_ref(&target),
            &self.limits,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{ContainerConfig, Schema};
    use recordgraph_concurrency::{AdaptiveThrottler, ThrottleConfig};
    use recordgraph_core::value::FieldValue;
    use recordgraph_durability::MemoryDatabase;
    use recordgraph_engine::record_type::{FieldPathIndex, RecordType};
    use recordgraph_graph::{Term, TriplePattern};
    use std::sync::Arc;
    use std::time::Duration;

    fn user(name: &str, email: &str) -> FieldValue {
        FieldValue::Array(vec![FieldValue::String(name.into()), FieldValue::String(email.into())])
    }

    #[test]
    fn explain_describes_basic_pattern_without_executing() {
        let pattern = Pattern::Basic(vec![TriplePattern::new(
            Term::var("s"),
            Term::Value(FieldValue::String("knows".into())),
            Term::var("o"),
        )]);
        let plan = explain(&pattern);
        assert_eq!(plan.operator, "Basic(1 triples)");
        assert!(plan.actual_cardinality.is_none());
    }

    #[test]
    fn collection_statistics_counts_records_and_bytes() {
        let rt = RecordType::new("user", vec![0]);
        let container = Container::open(MemoryDatabase::new(), Schema { types: vec![rt], graphs: vec![] }, ContainerConfig::default());
        let ctx = container.new_context(None);
        ctx.insert("user", user("alice", "alice@example.com")).unwrap();
        ctx.save().unwrap();

        let stats = container.collection_statistics("user").unwrap();
        assert_eq!(stats.record_count, 1);
        assert!(stats.approximate_bytes > 0);
    }

    #[test]
    fn rebuild_index_makes_index_readable_and_populated() {
        let rt = RecordType::new("user", vec![0]).with_index(Arc::new(FieldPathIndex::new("by_email", vec![1])));
        let container = Container::open(MemoryDatabase::new(), Schema { types: vec![rt], graphs: vec![] }, ContainerConfig::default());
        let ctx = container.new_context(None);
        ctx.insert("user", user("alice", "alice@example.com")).unwrap();
        ctx.insert("user", user("bob", "bob@example.com")).unwrap();
        ctx.save().unwrap();

        let throttler = AdaptiveThrottler::new(ThrottleConfig {
            initial_delay: Duration::from_millis(0),
            min_delay: Duration::from_millis(0),
            max_delay: Duration::from_millis(0),
            ..ThrottleConfig::default()
        })
        .unwrap();
        container.rebuild_index("by_email", &throttler).unwrap();

        let stats = container.index_statistics("by_email").unwrap();
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.state, IndexState::Readable);
    }
}
