//! Pattern evaluation (spec §4.11.3): the operators a SPARQL query plan
//! compiles to, each returning a lazy-in-spirit (here, eagerly
//! materialized — the in-process store has no streaming boundary to
//! preserve) sequence of solutions.

use crate::binding::{compatible, group_key, merge, shares_variable, substitute_pattern, Solution};
use crate::executor::execute_pattern;
use crate::expr::{ebv_or_false, evaluate, Expr};
use crate::hexastore::Hexastore;
use crate::path::{evaluate_path, PathLimits, PropertyPath};
use crate::term::{Term, TriplePattern};
use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::traits::Transaction;
use recordgraph_core::value::FieldValue;
use std::collections::HashMap;

/// An aggregate function applied within one GROUP BY group.
#[derive(Debug, Clone)]
pub enum Aggregate {
    /// `COUNT(*)` or `COUNT(expr)`, optionally `DISTINCT`.
    Count { expr: Option<Expr>, distinct: bool },
    /// `SUM(expr)`, skipping non-numeric values.
    Sum(Expr),
    /// `AVG(expr)`, skipping non-numeric values.
    Avg(Expr),
    /// `MIN(expr)`.
    Min(Expr),
    /// `MAX(expr)`.
    Max(Expr),
    /// `SAMPLE(expr)`: an arbitrary (here: first) binding from the group.
    Sample(Expr),
    /// `GROUP_CONCAT(expr; separator)`, optionally `DISTINCT`.
    GroupConcat { expr: Expr, separator: String, distinct: bool },
}

/// One named aggregate to compute per group.
#[derive(Debug, Clone)]
pub struct AggregateBinding {
    /// Output variable name the aggregate's result is bound to.
    pub alias: String,
    /// The aggregate to compute.
    pub aggregate: Aggregate,
}

/// An algebra pattern (spec §4.11.3's operator set).
#[derive(Debug, Clone)]
pub enum Pattern {
    /// A basic graph pattern: a conjunction of triple patterns, ordered by
    /// selectivity before execution.
    Basic(Vec<TriplePattern>),
    /// `L JOIN R`.
    Join(Box<Pattern>, Box<Pattern>),
    /// `L OPTIONAL R` (SPARQL LEFT JOIN).
    Optional(Box<Pattern>, Box<Pattern>),
    /// `L UNION R`.
    Union(Box<Pattern>, Box<Pattern>),
    /// `L MINUS R`.
    Minus(Box<Pattern>, Box<Pattern>),
    /// `FILTER(P, expr)`.
    Filter(Box<Pattern>, Expr),
    /// `GROUP BY vars (aggs) HAVING having`.
    GroupBy { inner: Box<Pattern>, vars: Vec<String>, aggregates: Vec<AggregateBinding>, having: Option<Expr> },
    /// A property path triple `(s, path, o)`.
    PropertyPath { subject: Term, path: PropertyPath, object: Term },
}

/// Statistics recorded while evaluating a pattern (spec §4.11.3's "records
/// intermediate cardinalities" / `optionalMiss` counting).
#[derive(Debug, Clone, Default)]
pub struct EvalStats {
    /// Number of solutions produced after each basic-pattern triple, in
    /// evaluation order.
    pub intermediate_cardinalities: Vec<usize>,
    /// Number of OPTIONAL left solutions that had no compatible right
    /// match and were emitted unmodified.
    pub optional_misses: usize,
}

/// Evaluate `pattern` against `hexastore` over `txn`, returning its
/// solutions and evaluation statistics.
pub fn evaluate_pattern<T: Transaction>(
    txn: &T,
    hexastore: &Hexastore,
    pattern: &Pattern,
    stats: &mut EvalStats,
) -> Result<Vec<Solution>> {
    match pattern {
        Pattern::Basic(triples) => evaluate_basic(txn, hexastore, triples, stats),
        Pattern::Join(l, r) => {
            let left = evaluate_pattern(txn, hexastore, l, stats)?;
            let mut out = Vec::new();
            for ls in &left {
                let substituted_r = substitute_pattern_tree(r, ls);
                let right = evaluate_pattern(txn, hexastore, &substituted_r, stats)?;
                for rs in right {
                    if compatible(ls, &rs) {
                        out.push(merge(ls, &rs));
                    }
                }
            }
            Ok(out)
        }
        Pattern::Optional(l, r) => {
            let left = evaluate_pattern(txn, hexastore, l, stats)?;
            let mut out = Vec::new();
            for ls in &left {
                let substituted_r = substitute_pattern_tree(r, ls);
                let right = evaluate_pattern(txn, hexastore, &substituted_r, stats)?;
                let compatible_right: Vec<Solution> = right.into_iter().filter(|rs| compatible(ls, rs)).collect();
                if compatible_right.is_empty() {
                    stats.optional_misses += 1;
                    out.push(ls.clone());
                } else {
                    for rs in compatible_right {
                        out.push(merge(ls, &rs));
                    }
                }
            }
            Ok(out)
        }
        Pattern::Union(l, r) => {
            let mut left = evaluate_pattern(txn, hexastore, l, stats)?;
            let right = evaluate_pattern(txn, hexastore, r, stats)?;
            left.extend(right);
            Ok(left)
        }
        Pattern::Minus(l, r) => {
            let left = evaluate_pattern(txn, hexastore, l, stats)?;
            let right = evaluate_pattern(txn, hexastore, r, stats)?;
            Ok(left
                .into_iter()
                .filter(|ls| !right.iter().any(|rs| shares_variable(ls, rs) && compatible(ls, rs)))
                .collect())
        }
        Pattern::Filter(inner, expr) => {
            let solutions = evaluate_pattern(txn, hexastore, inner, stats)?;
            Ok(solutions.into_iter().filter(|s| ebv_or_false(expr, s)).collect())
        }
        Pattern::GroupBy { inner, vars, aggregates, having } => {
            let solutions = evaluate_pattern(txn, hexastore, inner, stats)?;
            evaluate_group_by(solutions, vars, aggregates, having.as_ref())
        }
        Pattern::PropertyPath { subject, path, object } => {
            let bindings = evaluate_path(txn, hexastore, subject, path, object, PathLimits::default())?;
            Ok(bindings.into_iter().map(|b| b.into_iter().collect()).collect())
        }
    }
}

/// Substitute every bound variable of `solution` into `pattern`'s triple
/// patterns (or path endpoints), recursively. Used to implement
/// `join`/`optional`'s "for each left solution, substitute into R".
fn substitute_pattern_tree(pattern: &Pattern, solution: &Solution) -> Pattern {
    match pattern {
        Pattern::Basic(triples) => Pattern::Basic(triples.iter().map(|t| substitute_pattern(t, solution)).collect()),
        Pattern::Join(l, r) => Pattern::Join(Box::new(substitute_pattern_tree(l, solution)), Box::new(substitute_pattern_tree(r, solution))),
        Pattern::Optional(l, r) => Pattern::Optional(Box::new(substitute_pattern_tree(l, solution)), Box::new(substitute_pattern_tree(r, solution))),
        Pattern::Union(l, r) => Pattern::Union(Box::new(substitute_pattern_tree(l, solution)), Box::new(substitute_pattern_tree(r, solution))),
        Pattern::Minus(l, r) => Pattern::Minus(Box::new(substitute_pattern_tree(l, solution)), Box::new(substitute_pattern_tree(r, solution))),
        Pattern::Filter(inner, expr) => Pattern::Filter(Box::new(substitute_pattern_tree(inner, solution)), expr.clone()),
        Pattern::GroupBy { inner, vars, aggregates, having } => Pattern::GroupBy {
            inner: Box::new(substitute_pattern_tree(inner, solution)),
            vars: vars.clone(),
            aggregates: aggregates.clone(),
            having: having.clone(),
        },
        Pattern::PropertyPath { subject, path, object } => Pattern::PropertyPath {
            subject: crate::binding::substitute_term(subject, solution),
            path: path.clone(),
            object: crate::binding::substitute_term(object, solution),
        },
    }
}

fn selectivity_score(t: &TriplePattern, seen_vars: &std::collections::HashSet<String>) -> i32 {
    let mut score = 0;
    if t.s.is_bound() {
        score += 10;
    }
    if t.p.is_bound() {
        score += 12;
    }
    if t.o.is_bound() {
        score += 10;
    }
    let shared = [&t.s, &t.p, &t.o].iter().filter_map(|term| term.variable_name()).filter(|n| seen_vars.contains(*n)).count();
    score += 10 * shared as i32;
    score
}

fn evaluate_basic<T: Transaction>(
    txn: &T,
    hexastore: &Hexastore,
    triples: &[TriplePattern],
    stats: &mut EvalStats,
) -> Result<Vec<Solution>> {
    if triples.is_empty() {
        return Err(RecordGraphError::NoPatterns);
    }

    // Greedy selectivity ordering: repeatedly pick the remaining triple
    // with the highest score given variables bound by triples already
    // chosen (spec §4.11.3's `+10·|sharedVars|` term depends on what's
    // already in scope, so this can't be a one-shot sort).
    let mut remaining: Vec<TriplePattern> = triples.to_vec();
    let mut ordered = Vec::with_capacity(triples.len());
    let mut seen_vars: std::collections::HashSet<String> = std::collections::HashSet::new();
    while !remaining.is_empty() {
        let (idx, _) = remaining
            .iter()
            .enumerate()
            .max_by_key(|(_, t)| selectivity_score(t, &seen_vars))
            .expect("remaining is non-empty");
        let chosen = remaining.remove(idx);
        for term in [&chosen.s, &chosen.p, &chosen.o] {
            if let Some(name) = term.variable_name() {
                seen_vars.insert(name.to_string());
            }
        }
        ordered.push(chosen);
    }

    let mut solutions = vec![Solution::new()];
    for pattern in &ordered {
        if solutions.is_empty() {
            break;
        }
        let mut next = Vec::new();
        for s in &solutions {
            let substituted = substitute_pattern(pattern, s);
            let matches = execute_pattern(txn, hexastore, &substituted)?;
            for m in matches {
                if compatible(s, &m) {
                    next.push(merge(s, &m));
                }
            }
        }
        solutions = next;
        stats.intermediate_cardinalities.push(solutions.len());
    }
    Ok(solutions)
}

fn numeric_of(v: &FieldValue) -> Option<f64> {
    match v {
        FieldValue::Int64(n) => Some(*n as f64),
        FieldValue::Double(d) => Some(*d),
        _ => None,
    }
}

fn evaluate_group_by(
    solutions: Vec<Solution>,
    vars: &[String],
    aggregates: &[AggregateBinding],
    having: Option<&Expr>,
) -> Result<Vec<Solution>> {
    let mut groups: HashMap<Vec<crate::binding::GroupValue>, Vec<Solution>> = HashMap::new();
    let mut key_order = Vec::new();
    for s in solutions {
        let key = group_key(vars, &s);
        if !groups.contains_key(&key) {
            key_order.push(key.clone());
        }
        groups.entry(key).or_default().push(s);
    }
    key_order.sort();

    let mut out = Vec::new();
    for key in key_order {
        let members = &groups[&key];
        let mut result = Solution::new();
        for (var, value) in vars.iter().zip(&key) {
            if let crate::binding::GroupValue::Bound(v) = value {
                result.insert(var.clone(), v.0.clone());
            }
        }
        for agg in aggregates {
            result.insert(agg.alias.clone(), compute_aggregate(&agg.aggregate, members)?);
        }
        if having.map(|h| ebv_or_false(h, &result)).unwrap_or(true) {
            out.push(result);
        }
    }
    Ok(out)
}

fn compute_aggregate(agg: &Aggregate, members: &[Solution]) -> Result<FieldValue> {
    match agg {
        Aggregate::Count { expr, distinct } => {
            let mut values: Vec<FieldValue> = match expr {
                Some(e) => members.iter().filter_map(|m| evaluate(e, m).ok()).collect(),
                None => members.iter().map(|_| FieldValue::Null).collect(),
            };
            if *distinct {
                let mut seen = Vec::new();
                values.retain(|v| {
                    if seen.contains(v) {
                        false
                    } else {
                        seen.push(v.clone());
                        true
                    }
                });
            }
            Ok(FieldValue::Int64(values.len() as i64))
        }
        Aggregate::Sum(expr) => {
            let mut sum = 0.0;
            let mut all_int = true;
            let mut int_sum: i64 = 0;
            for m in members {
                if let Ok(v) = evaluate(expr, m) {
                    if let Some(n) = numeric_of(&v) {
                        sum += n;
                        match v {
                            FieldValue::Int64(i) => int_sum = int_sum.wrapping_add(i),
                            _ => all_int = false,
                        }
                    }
                }
            }
            if all_int {
                Ok(FieldValue::Int64(int_sum))
            } else {
                Ok(FieldValue::Double(sum))
            }
        }
        Aggregate::Avg(expr) => {
            let mut sum = 0.0;
            let mut count = 0usize;
            for m in members {
                if let Ok(v) = evaluate(expr, m) {
                    if let Some(n) = numeric_of(&v) {
                        sum += n;
                        count += 1;
                    }
                }
            }
            if count == 0 {
                Ok(FieldValue::Null)
            } else {
                Ok(FieldValue::Double(sum / count as f64))
            }
        }
        Aggregate::Min(expr) => reduce_numeric_or_sortable(expr, members, std::cmp::Ordering::Less),
        Aggregate::Max(expr) => reduce_numeric_or_sortable(expr, members, std::cmp::Ordering::Greater),
        Aggregate::Sample(expr) => {
            for m in members {
                if let Ok(v) = evaluate(expr, m) {
                    return Ok(v);
                }
            }
            Ok(FieldValue::Null)
        }
        Aggregate::GroupConcat { expr, separator, distinct } => {
            let mut parts = Vec::new();
            for m in members {
                if let Ok(v) = evaluate(expr, m) {
                    let text = match v {
                        FieldValue::String(s) => s,
                        other => format!("{other:?}"),
                    };
                    if !*distinct || !parts.contains(&text) {
                        parts.push(text);
                    }
                }
            }
            Ok(FieldValue::String(parts.join(separator)))
        }
    }
}

fn reduce_numeric_or_sortable(expr: &Expr, members: &[Solution], keep_if: std::cmp::Ordering) -> Result<FieldValue> {
    let mut best: Option<FieldValue> = None;
    for m in members {
        let Ok(v) = evaluate(expr, m) else { continue };
        best = Some(match best {
            None => v,
            Some(current) => match v.sort_key_compare(&current) {
                o if o == keep_if => v,
                _ => current,
            },
        });
    }
    Ok(best.unwrap_or(FieldValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Triple;
    use recordgraph_core::limits::Limits;
    use recordgraph_durability::MemoryDatabase;

    fn n(s: &str) -> FieldValue {
        FieldValue::String(s.into())
    }

    fn seed_social_graph(hs: &Hexastore, db: &MemoryDatabase) {
        let mut txn = db.create_transaction();
        let edges = [("alice", "knows", "bob"), ("alice", "knows", "carol"), ("bob", "likes", "pizza")];
        for (s, p, o) in edges {
            hs.insert(&mut txn, &Triple::new(n(s), n(p), n(o)), &Limits::default()).unwrap();
        }
        use recordgraph_core::traits::Transaction as _;
        txn.commit().unwrap();
    }

    #[test]
    fn basic_pattern_joins_two_triples() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        seed_social_graph(&hs, &db);
        let txn = db.create_transaction();

        let pattern = Pattern::Basic(vec![
            TriplePattern::new(Term::var("who"), Term::Value(n("knows")), Term::var("friend")),
            TriplePattern::new(Term::var("friend"), Term::Value(n("likes")), Term::var("thing")),
        ]);
        let mut stats = EvalStats::default();
        let solutions = evaluate_pattern(&txn, &hs, &pattern, &mut stats).unwrap();
        assert_eq!(solutions.len(), 1);
        assert_eq!(solutions[0].get("thing"), Some(&n("pizza")));
    }

    #[test]
    fn optional_emits_left_unmatched_and_counts_miss() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        seed_social_graph(&hs, &db);
        let txn = db.create_transaction();

        let left = Pattern::Basic(vec![TriplePattern::new(Term::var("who"), Term::Value(n("knows")), Term::var("friend"))]);
        let right = Pattern::Basic(vec![TriplePattern::new(Term::var("friend"), Term::Value(n("likes")), Term::var("thing"))]);
        let pattern = Pattern::Optional(Box::new(left), Box::new(right));
        let mut stats = EvalStats::default();
        let solutions = evaluate_pattern(&txn, &hs, &pattern, &mut stats).unwrap();
        assert_eq!(solutions.len(), 2);
        assert_eq!(stats.optional_misses, 1);
    }

    #[test]
    fn minus_removes_solutions_sharing_and_compatible() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        seed_social_graph(&hs, &db);
        let txn = db.create_transaction();

        let left = Pattern::Basic(vec![TriplePattern::new(Term::var("who"), Term::Value(n("knows")), Term::var("friend"))]);
        let right = Pattern::Basic(vec![TriplePattern::new(Term::Value(n("alice")), Term::Value(n("knows")), Term::var("friend"))]);
        let pattern = Pattern::Minus(Box::new(left), Box::new(right));
        let mut stats = EvalStats::default();
        let solutions = evaluate_pattern(&txn, &hs, &pattern, &mut stats).unwrap();
        assert_eq!(solutions.len(), 0);
    }

    #[test]
    fn filter_keeps_only_true_ebv() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        seed_social_graph(&hs, &db);
        let txn = db.create_transaction();

        let inner = Pattern::Basic(vec![TriplePattern::new(Term::Value(n("alice")), Term::Value(n("knows")), Term::var("friend"))]);
        let filter_expr = Expr::Comparison(crate::expr::CmpOp::Eq, Box::new(Expr::Var("friend".into())), Box::new(Expr::Literal(n("bob"))));
        let pattern = Pattern::Filter(Box::new(inner), filter_expr);
        let mut stats = EvalStats::default();
        let solutions = evaluate_pattern(&txn, &hs, &pattern, &mut stats).unwrap();
        assert_eq!(solutions.len(), 1);
    }

    #[test]
    fn group_by_counts_per_group() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        seed_social_graph(&hs, &db);
        let txn = db.create_transaction();

        let inner = Pattern::Basic(vec![TriplePattern::new(Term::var("who"), Term::var("rel"), Term::var("target"))]);
        let pattern = Pattern::GroupBy {
            inner: Box::new(inner),
            vars: vec!["who".to_string()],
            aggregates: vec![AggregateBinding { alias: "count".to_string(), aggregate: Aggregate::Count { expr: None, distinct: false } }],
            having: None,
        };
        let mut stats = EvalStats::default();
        let solutions = evaluate_pattern(&txn, &hs, &pattern, &mut stats).unwrap();
        let alice_group = solutions.iter().find(|s| s.get("who") == Some(&n("alice"))).unwrap();
        assert_eq!(alice_group.get("count"), Some(&FieldValue::Int64(2)));
    }

    #[test]
    fn empty_basic_pattern_errors() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        let txn = db.create_transaction();
        let mut stats = EvalStats::default();
        let err = evaluate_pattern(&txn, &hs, &Pattern::Basic(vec![]), &mut stats).unwrap_err();
        assert!(matches!(err, RecordGraphError::NoPatterns));
    }
}
