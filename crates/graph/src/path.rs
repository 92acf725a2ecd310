//! Property paths (spec §4.11.5): the SPARQL 1.1 path grammar, normalized
//! before evaluation, then evaluated either as one hexastore scan (`iri`)
//! or a cycle-safe BFS (`zeroOrMore`/`oneOrMore`).

use crate::executor::execute_pattern;
use crate::hexastore::Hexastore;
use crate::term::{Term, TriplePattern};
use recordgraph_core::error::Result;
use recordgraph_core::traits::Transaction;
use recordgraph_core::value::FieldValue;
use std::collections::{HashMap, HashSet, VecDeque};

/// The property path grammar (spec §4.11.5).
#[derive(Debug, Clone)]
pub enum PropertyPath {
    /// A single predicate IRI.
    Iri(FieldValue),
    /// `!(...)`: traverse an outgoing edge whose predicate is not in `ps`.
    NegatedPropertySet(Vec<FieldValue>),
    /// `^P`: traverse `P` backwards.
    Inverse(Box<PropertyPath>),
    /// `P1/P2`.
    Sequence(Box<PropertyPath>, Box<PropertyPath>),
    /// `P1|P2`.
    Alternative(Box<PropertyPath>, Box<PropertyPath>),
    /// `P*`.
    ZeroOrMore(Box<PropertyPath>),
    /// `P+`.
    OneOrMore(Box<PropertyPath>),
    /// `P?`.
    ZeroOrOne(Box<PropertyPath>),
}

/// Push `^` (inverse) down to the leaves per spec §4.11.5's rewrite rules,
/// and flatten right-associative `alternative` chains.
pub fn normalize(path: &PropertyPath) -> PropertyPath {
    use PropertyPath::*;
    match path {
        Inverse(inner) => match inner.as_ref() {
            Inverse(p) => normalize(p), // ^^P ≡ P
            Sequence(p1, p2) => Sequence(
                Box::new(normalize(&Inverse(p2.clone()))),
                Box::new(normalize(&Inverse(p1.clone()))),
            ), // ^(P1/P2) ≡ ^P2/^P1
            Alternative(p1, p2) => Alternative(
                Box::new(normalize(&Inverse(p1.clone()))),
                Box::new(normalize(&Inverse(p2.clone()))),
            ), // ^(P1|P2) ≡ ^P1|^P2
            OneOrMore(p) => OneOrMore(Box::new(normalize(&Inverse(p.clone())))),
            ZeroOrMore(p) => ZeroOrMore(Box::new(normalize(&Inverse(p.clone())))),
            ZeroOrOne(p) => ZeroOrOne(Box::new(normalize(&Inverse(p.clone())))),
            Iri(_) | NegatedPropertySet(_) => Inverse(Box::new(normalize(inner))),
        },
        Sequence(a, b) => Sequence(Box::new(normalize(a)), Box::new(normalize(b))),
        Alternative(a, b) => Alternative(Box::new(normalize(a)), Box::new(normalize(b))),
        ZeroOrMore(p) => ZeroOrMore(Box::new(normalize(p))),
        OneOrMore(p) => OneOrMore(Box::new(normalize(p))),
        ZeroOrOne(p) => ZeroOrOne(Box::new(normalize(p))),
        Iri(_) | NegatedPropertySet(_) => path.clone(),
    }
}

/// Bounds on path traversal (spec §4.11.5).
#[derive(Debug, Clone, Copy)]
pub struct PathLimits {
    /// Maximum BFS depth. Default 100.
    pub max_depth: usize,
    /// Maximum number of result bindings. Default 10 000.
    pub max_results: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self { max_depth: 100, max_results: 10_000 }
    }
}

/// One-hop outgoing edges from `node` via `path`, as a BTreeSet for
/// determinism (cycle-detection visited sets reuse this).
fn one_hop<T: Transaction>(
    txn: &T,
    hexastore: &Hexastore,
    path: &PropertyPath,
    node: &FieldValue,
) -> Result<Vec<FieldValue>> {
    use PropertyPath::*;
    match path {
        Iri(p) => {
            let pattern = TriplePattern::new(Term::Value(node.clone()), Term::Value(p.clone()), Term::var("o"));
            let solutions = execute_pattern(txn, hexastore, &pattern)?;
            Ok(solutions.into_iter().filter_map(|s| s.get("o").cloned()).collect())
        }
        Inverse(inner) => match inner.as_ref() {
            Iri(p) => {
                let pattern = TriplePattern::new(Term::var("s"), Term::Value(p.clone()), Term::Value(node.clone()));
                let solutions = execute_pattern(txn, hexastore, &pattern)?;
                Ok(solutions.into_iter().filter_map(|s| s.get("s").cloned()).collect())
            }
            _ => one_hop(txn, hexastore, &normalize(path), node),
        },
        NegatedPropertySet(excluded) => {
            let pattern = TriplePattern::new(Term::Value(node.clone()), Term::var("p"), Term::var("o"));
            let solutions = execute_pattern(txn, hexastore, &pattern)?;
            Ok(solutions
                .into_iter()
                .filter(|s| !excluded.contains(s.get("p").unwrap()))
                .filter_map(|s| s.get("o").cloned())
                .collect())
        }
        Sequence(p1, p2) => {
            let mut out = Vec::new();
            for mid in one_hop(txn, hexastore, p1, node)? {
                out.extend(one_hop(txn, hexastore, p2, &mid)?);
            }
            Ok(out)
        }
        Alternative(p1, p2) => {
            let mut out: HashSet<FieldValue> = one_hop(txn, hexastore, p1, node)?.into_iter().collect();
            out.extend(one_hop(txn, hexastore, p2, node)?);
            Ok(out.into_iter().collect())
        }
        ZeroOrOne(p) => {
            let mut out: HashSet<FieldValue> = [node.clone()].into_iter().collect();
            out.extend(one_hop(txn, hexastore, p, node)?);
            Ok(out.into_iter().collect())
        }
        ZeroOrMore(_) | OneOrMore(_) => reachable(txn, hexastore, path, node, PathLimits::default()),
    }
}

/// BFS reachability from a single bound `origin`, honoring `zeroOrMore`'s
/// identity seed and `max_depth`/`max_results` caps. A single `visited`
/// set suffices here since the origin is fixed (spec §4.11.5).
pub fn reachable<T: Transaction>(
    txn: &T,
    hexastore: &Hexastore,
    path: &PropertyPath,
    origin: &FieldValue,
    limits: PathLimits,
) -> Result<Vec<FieldValue>> {
    use PropertyPath::*;
    let (inner, include_zero) = match path {
        ZeroOrMore(p) => (p.as_ref(), true),
        OneOrMore(p) => (p.as_ref(), false),
        other => (other, false),
    };

    let mut visited: HashSet<FieldValue> = HashSet::new();
    let mut results = Vec::new();
    if include_zero {
        visited.insert(origin.clone());
        results.push(origin.clone());
    }

    let mut frontier = VecDeque::new();
    frontier.push_back((origin.clone(), 0usize));
    while let Some((node, depth)) = frontier.pop_front() {
        if depth >= limits.max_depth || results.len() >= limits.max_results {
            continue;
        }
        for next in one_hop_non_recursive(txn, hexastore, inner, &node)? {
            if visited.insert(next.clone()) {
                results.push(next.clone());
                if results.len() >= limits.max_results {
                    break;
                }
                frontier.push_back((next, depth + 1));
            }
        }
    }
    Ok(results)
}

/// `one_hop` restricted to non-repeating path kinds, used inside BFS so a
/// nested `zeroOrMore`/`oneOrMore` doesn't recurse into its own unbounded
/// traversal per step (normalization ensures repetition is never nested
/// directly, but this guards the BFS driver itself against it).
fn one_hop_non_recursive<T: Transaction>(
    txn: &T,
    hexastore: &Hexastore,
    path: &PropertyPath,
    node: &FieldValue,
) -> Result<Vec<FieldValue>> {
    match path {
        PropertyPath::ZeroOrMore(p) | PropertyPath::OneOrMore(p) => one_hop_non_recursive(txn, hexastore, p, node),
        other => one_hop(txn, hexastore, other, node),
    }
}

/// Enumerate every node ever seen as a subject or object in `hexastore`,
/// used by `zeroOrMore` when both endpoints are unbound (spec §4.11.5).
pub fn all_nodes<T: Transaction>(txn: &T, hexastore: &Hexastore) -> Result<Vec<FieldValue>> {
    let pattern = TriplePattern::new(Term::var("s"), Term::var("p"), Term::var("o"));
    let solutions = execute_pattern(txn, hexastore, &pattern)?;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for s in solutions {
        for key in ["s", "o"] {
            if let Some(v) = s.get(key) {
                if seen.insert(v.clone()) {
                    out.push(v.clone());
                }
            }
        }
    }
    Ok(out)
}

/// Evaluate a property path `(subject, path, object)` where at least one
/// endpoint is bound (the unbound/unbound case enumerates `all_nodes` and
/// treats every node as `origin`, per spec §4.11.5's `zeroOrMore` seeding
/// rule; non-`zeroOrMore` paths with both endpoints unbound instead scan
/// every origin that has at least one outgoing edge).
pub fn evaluate_path<T: Transaction>(
    txn: &T,
    hexastore: &Hexastore,
    subject: &Term,
    path: &PropertyPath,
    object: &Term,
    limits: PathLimits,
) -> Result<Vec<HashMap<String, FieldValue>>> {
    let path = normalize(path);
    let mut out = Vec::new();

    let origins: Vec<FieldValue> = match subject {
        Term::Value(v) => vec![v.clone()],
        _ => all_nodes(txn, hexastore)?,
    };

    for origin in origins {
        let destinations = match &path {
            PropertyPath::ZeroOrMore(_) | PropertyPath::OneOrMore(_) => reachable(txn, hexastore, &path, &origin, limits)?,
            other => one_hop(txn, hexastore, other, &origin)?,
        };
        for dest in destinations {
            if let Term::Value(expected) = object {
                if *expected != dest {
                    continue;
                }
            }
            let mut solution = HashMap::new();
            if let Term::Variable(name) = subject {
                solution.insert(name.clone(), origin.clone());
            }
            if let Term::Variable(name) = object {
                solution.insert(name.clone(), dest);
            }
            out.push(solution);
            if out.len() >= limits.max_results {
                return Ok(out);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::term::Triple;
    use recordgraph_core::limits::Limits;
    use recordgraph_durability::MemoryDatabase;

    fn node(s: &str) -> FieldValue {
        FieldValue::String(s.into())
    }

    fn chain(hs: &Hexastore, db: &MemoryDatabase) {
        let mut txn = db.create_transaction();
        for (a, b) in [("a", "b"), ("b", "c"), ("c", "a")] {
            hs.insert(&mut txn, &Triple::new(node(a), node("next"), node(b)), &Limits::default()).unwrap();
        }
        use recordgraph_core::traits::Transaction as _;
        txn.commit().unwrap();
    }

    #[test]
    fn one_or_more_detects_cycle_without_infinite_loop() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        chain(&hs, &db);
        let txn = db.create_transaction();
        let results = reachable(&txn, &hs, &PropertyPath::OneOrMore(Box::new(PropertyPath::Iri(node("next")))), &node("a"), PathLimits::default()).unwrap();
        let set: HashSet<_> = results.into_iter().collect();
        assert_eq!(set, [node("a"), node("b"), node("c")].into_iter().collect());
    }

    #[test]
    fn zero_or_more_includes_origin() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        chain(&hs, &db);
        let txn = db.create_transaction();
        let results = reachable(&txn, &hs, &PropertyPath::ZeroOrMore(Box::new(PropertyPath::Iri(node("next")))), &node("a"), PathLimits::default()).unwrap();
        assert!(results.contains(&node("a")));
    }

    #[test]
    fn normalize_pushes_inverse_to_leaves() {
        let path = PropertyPath::Inverse(Box::new(PropertyPath::Sequence(
            Box::new(PropertyPath::Iri(node("p1"))),
            Box::new(PropertyPath::Iri(node("p2"))),
        )));
        let normalized = normalize(&path);
        match normalized {
            PropertyPath::Sequence(a, b) => {
                assert!(matches!(*a, PropertyPath::Inverse(_)));
                assert!(matches!(*b, PropertyPath::Inverse(_)));
            }
            _ => panic!("expected sequence at top level"),
        }
    }

    #[test]
    fn evaluate_path_binds_both_endpoints() {
        let db = MemoryDatabase::new();
        let hs = Hexastore::new("g");
        chain(&hs, &db);
        let txn = db.create_transaction();
        let results = evaluate_path(&txn, &hs, &Term::var("s"), &PropertyPath::Iri(node("next")), &Term::var("o"), PathLimits::default()).unwrap();
        assert_eq!(results.len(), 3);
    }
}
