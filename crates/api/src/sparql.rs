//! SPARQL entry point (spec §6.2): runs an algebra [`Pattern`] against a
//! named hexastore graph and applies the solution-modifier pipeline,
//! optionally decoding each solution into a caller-chosen `T`.

use recordgraph_core::error::Result;
use recordgraph_core::traits::Database;
use recordgraph_graph::{apply_modifiers, evaluate_pattern, EvalStats, Hexastore, Modifiers, Pattern, Solution};

/// A query against one named graph: a pattern plus the modifier pipeline
/// to apply to its solutions (spec §4.11.6).
#[derive(Debug, Clone, Default)]
pub struct SparqlQuery {
    /// The algebra pattern to evaluate. `None` patterns are rejected by
    /// [`SparqlEntryPoint::run`].
    pub pattern: Option<Pattern>,
    /// `ORDER BY` / `SELECT` / `DISTINCT` / `OFFSET` / `LIMIT`.
    pub modifiers: Modifiers,
}

impl SparqlQuery {
    /// Start building a query over `pattern`.
    pub fn new(pattern: Pattern) -> Self {
        Self { pattern: Some(pattern), modifiers: Modifiers::default() }
    }

    /// Attach a modifier pipeline.
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }
}

/// Entry point for running [`SparqlQuery`]s against one named graph (spec
/// §6.2's SPARQL entry point → `SPARQLEntryPoint<T>`). Generic over the
/// decode target `T` only at the call site (`run_as`) — solutions are
/// uniformly [`Solution`] maps, the same dynamically-typed representation
/// records and algebra evaluation already use, so there is no per-query
/// generated Rust type to parameterize the entry point itself over.
pub struct SparqlEntryPoint<'a, D: Database> {
    db: &'a D,
    hexastore: &'a Hexastore,
}

impl<'a, D: Database> SparqlEntryPoint<'a, D> {
    pub(crate) fn new(db: &'a D, hexastore: &'a Hexastore) -> Self {
        Self { db, hexastore }
    }

    /// Evaluate `query`'s pattern and apply its modifier pipeline,
    /// returning raw solutions and the evaluation statistics collected
    /// along the way.
    pub fn run(&self, query: &SparqlQuery) -> Result<(Vec<Solution>, EvalStats)> {
        let pattern = query
            .pattern
            .as_ref()
            .ok_or_else(|| recordgraph_core::RecordGraphError::NoPatterns)?;
        let txn = self.db.create_transaction();
        let mut stats = EvalStats::default();
        let solutions = evaluate_pattern(&txn, self.hexastore, pattern, &mut stats)?;
        Ok((apply_modifiers(solutions, &query.modifiers), stats))
    }

    /// Like [`run`](Self::run), decoding each solution with `decode`.
    pub fn run_as<T>(&self, query: &SparqlQuery, decode: impl Fn(&Solution) -> T) -> Result<Vec<T>> {
        let (solutions, _) = self.run(query)?;
        Ok(solutions.iter().map(decode).collect())
    }
}
