//! Single-triple-pattern execution (spec §4.11.4): choose the hexastore
//! ordering for a pattern's bound subset, scan, and bind the remaining
//! variables from the decoded `FieldValue`s — never from re-parsed strings.

use crate::binding::Solution;
use crate::hexastore::Hexastore;
use crate::term::{Term, TriplePattern};
use recordgraph_core::error::Result;
use recordgraph_core::traits::Transaction;
use recordgraph_core::value::FieldValue;

/// Execute one (already variable-substituted) triple pattern against
/// `hexastore` over `txn`, returning one solution per matching triple.
/// A `Term::Wildcard` component matches anything and binds nothing.
pub fn execute_pattern<T: Transaction>(txn: &T, hexastore: &Hexastore, pattern: &TriplePattern) -> Result<Vec<Solution>> {
    let s_bound = term_value(&pattern.s);
    let p_bound = term_value(&pattern.p);
    let o_bound = term_value(&pattern.o);

    let ordering = Hexastore::choose_ordering(s_bound.is_some(), p_bound.is_some(), o_bound.is_some());
    let (begin, end) = hexastore.scan_range(ordering, s_bound.as_ref(), p_bound.as_ref(), o_bound.as_ref());
    let rows = txn.get_range(&begin, &end, true)?;

    let mut out = Vec::with_capacity(rows.len());
    for (key, _) in rows {
        let Some(triple) = hexastore.unpack(ordering, &key) else { continue };
        let triple = triple?;

        if let Some(v) = &s_bound {
            if *v != triple.s {
                continue;
            }
        }
        if let Some(v) = &p_bound {
            if *v != triple.p {
                continue;
            }
        }
        if let Some(v) = &o_bound {
            if *v != triple.o {
                continue;
            }
        }

        let mut solution = Solution::new();
        bind(&mut solution, &pattern.s, triple.s);
        bind(&mut solution, &pattern.p, triple.p);
        bind(&mut solution, &pattern.o, triple.o);
        out.push(solution);
    }
    Ok(out)
}

fn term_value(term: &Term) -> Option<FieldValue> {
    match term {
        Term::Value(v) => Some(v.clone()),
        _ => None,
    }
}

fn bind(solution: &mut Solution, term: &Term, value: FieldValue) {
    if let Term::Variable(name) = term {
        solution.insert(name.clone(), value);
    }
}
