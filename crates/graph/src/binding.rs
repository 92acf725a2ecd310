//! Solutions and their merge/compatibility rules (spec §4.11.1, §4.11.3).

use recordgraph_core::value::FieldValue;
use std::collections::BTreeMap;

/// A variable binding set. `BTreeMap` rather than `HashMap` so group keys
/// and solution output are naturally deterministic to iterate.
pub type Solution = BTreeMap<String, FieldValue>;

/// Two solutions are compatible iff they agree on every shared variable.
pub fn compatible(a: &Solution, b: &Solution) -> bool {
    for (k, v) in a {
        if let Some(other) = b.get(k) {
            if other != v {
                return false;
            }
        }
    }
    true
}

/// Merge two compatible solutions into one carrying the union of bindings.
/// Callers must check [`compatible`] first; this does not re-check.
pub fn merge(a: &Solution, b: &Solution) -> Solution {
    let mut out = a.clone();
    for (k, v) in b {
        out.insert(k.clone(), v.clone());
    }
    out
}

/// `true` iff `a` and `b` share at least one variable name, regardless of
/// whether their values agree — used by `MINUS`'s compatibility-with-shared-
/// variables rule (SPARQL §18.5, spec §4.11.3).
pub fn shares_variable(a: &Solution, b: &Solution) -> bool {
    a.keys().any(|k| b.contains_key(k))
}

/// Substitute every bound variable in `pattern` with its value in
/// `solution`, leaving unbound variables and wildcards untouched.
pub fn substitute_term(term: &crate::term::Term, solution: &Solution) -> crate::term::Term {
    use crate::term::Term;
    match term {
        Term::Variable(name) => match solution.get(name) {
            Some(v) => Term::Value(v.clone()),
            None => term.clone(),
        },
        _ => term.clone(),
    }
}

/// Substitute every component of a triple pattern using `solution`.
pub fn substitute_pattern(pattern: &crate::term::TriplePattern, solution: &Solution) -> crate::term::TriplePattern {
    crate::term::TriplePattern {
        s: substitute_term(&pattern.s, solution),
        p: substitute_term(&pattern.p, solution),
        o: substitute_term(&pattern.o, solution),
        graph: pattern.graph.as_ref().map(|g| substitute_term(g, solution)),
    }
}

/// A GROUP BY key component: either a bound value or explicitly `unbound`.
/// `unbound` is distinct from every `FieldValue`, including `String("")`
/// (spec §4.11.3's groupBy case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupValue {
    /// The grouping variable was unbound in this solution.
    Unbound,
    /// The grouping variable was bound to this value.
    Bound(OrdFieldValue),
}

/// `FieldValue` wrapped with a total order so it can be used as a
/// `BTreeMap`/`HashMap` key in GROUP BY — `FieldValue` itself only exposes
/// a partial `compare`, so ties are broken by `sort_key_compare`'s
/// deterministic type fallback.
#[derive(Debug, Clone)]
pub struct OrdFieldValue(pub FieldValue);

impl PartialEq for OrdFieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for OrdFieldValue {}
impl PartialOrd for OrdFieldValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for OrdFieldValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.sort_key_compare(&other.0)
    }
}
impl std::hash::Hash for OrdFieldValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

/// Compute the GROUP BY key for a solution given the grouping variable
/// names, in declared order.
pub fn group_key(vars: &[String], solution: &Solution) -> Vec<GroupValue> {
    vars.iter()
        .map(|v| match solution.get(v) {
            Some(value) => GroupValue::Bound(OrdFieldValue(value.clone())),
            None => GroupValue::Unbound,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sol(pairs: &[(&str, FieldValue)]) -> Solution {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn compatible_requires_agreement_on_shared_vars() {
        let a = sol(&[("x", FieldValue::Int64(1))]);
        let b = sol(&[("x", FieldValue::Int64(1)), ("y", FieldValue::Int64(2))]);
        let c = sol(&[("x", FieldValue::Int64(9))]);
        assert!(compatible(&a, &b));
        assert!(!compatible(&a, &c));
    }

    #[test]
    fn merge_unions_bindings() {
        let a = sol(&[("x", FieldValue::Int64(1))]);
        let b = sol(&[("y", FieldValue::Int64(2))]);
        let merged = merge(&a, &b);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn group_value_unbound_distinct_from_empty_string() {
        let bound_empty = GroupValue::Bound(OrdFieldValue(FieldValue::String(String::new())));
        assert_ne!(GroupValue::Unbound, bound_empty);
    }

    #[test]
    fn shares_variable_ignores_value_agreement() {
        let a = sol(&[("x", FieldValue::Int64(1))]);
        let b = sol(&[("x", FieldValue::Int64(2))]);
        assert!(shares_variable(&a, &b));
        let c = sol(&[("y", FieldValue::Int64(2))]);
        assert!(!shares_variable(&a, &c));
    }
}
