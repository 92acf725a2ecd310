//! Solution modifiers (spec §4.11.6): the fixed W3C §15 pipeline —
//! evaluate pattern → ORDER BY → projection (SELECT) → DISTINCT/REDUCED →
//! OFFSET/LIMIT.

use crate::binding::Solution;
use recordgraph_core::value::FieldValue;
use std::cmp::Ordering;
use std::collections::HashSet;

/// One `ORDER BY` key: a variable name and direction.
#[derive(Debug, Clone)]
pub struct OrderKey {
    /// Variable to sort on.
    pub var: String,
    /// `true` for descending.
    pub descending: bool,
}

/// The full modifier pipeline applied to a pattern's raw solutions.
#[derive(Debug, Clone, Default)]
pub struct Modifiers {
    /// Multi-key `ORDER BY`, applied before projection.
    pub order_by: Vec<OrderKey>,
    /// `SELECT` projection list. `None` means project every bound variable.
    pub project: Option<Vec<String>>,
    /// Deduplicate solutions after projection.
    pub distinct: bool,
    /// Number of leading solutions to skip, applied after DISTINCT.
    pub offset: usize,
    /// Maximum number of solutions to return, applied last.
    pub limit: Option<usize>,
}

/// Apply `modifiers` to `solutions` in the fixed order spec §4.11.6
/// mandates. Missing sort-key variables and incomparable types tie-break
/// via `FieldValue::sort_key_compare`'s deterministic type fallback.
pub fn apply(solutions: Vec<Solution>, modifiers: &Modifiers) -> Vec<Solution> {
    let mut solutions = solutions;

    if !modifiers.order_by.is_empty() {
        solutions.sort_by(|a, b| compare_by_keys(a, b, &modifiers.order_by));
    }

    let mut projected: Vec<Solution> = match &modifiers.project {
        Some(vars) => solutions
            .into_iter()
            .map(|s| vars.iter().filter_map(|v| s.get(v).map(|val| (v.clone(), val.clone()))).collect())
            .collect(),
        None => solutions,
    };

    if modifiers.distinct {
        let mut seen: HashSet<Vec<(String, FieldValue)>> = HashSet::new();
        projected.retain(|s| seen.insert(s.iter().map(|(k, v)| (k.clone(), v.clone())).collect()));
    }

    let after_offset: Vec<Solution> = projected.into_iter().skip(modifiers.offset).collect();
    match modifiers.limit {
        Some(limit) => after_offset.into_iter().take(limit).collect(),
        None => after_offset,
    }
}

fn compare_by_keys(a: &Solution, b: &Solution, keys: &[OrderKey]) -> Ordering {
    for key in keys {
        let ordering = match (a.get(&key.var), b.get(&key.var)) {
            (Some(x), Some(y)) => x.sort_key_compare(y),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = if key.descending { ordering.reverse() } else { ordering };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sol(pairs: &[(&str, FieldValue)]) -> Solution {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn order_by_sorts_ascending_then_descending() {
        let solutions = vec![
            sol(&[("x", FieldValue::Int64(3))]),
            sol(&[("x", FieldValue::Int64(1))]),
            sol(&[("x", FieldValue::Int64(2))]),
        ];
        let modifiers = Modifiers { order_by: vec![OrderKey { var: "x".into(), descending: false }], ..Default::default() };
        let sorted = apply(solutions.clone(), &modifiers);
        assert_eq!(sorted.iter().map(|s| s["x"].clone()).collect::<Vec<_>>(), vec![FieldValue::Int64(1), FieldValue::Int64(2), FieldValue::Int64(3)]);

        let modifiers_desc = Modifiers { order_by: vec![OrderKey { var: "x".into(), descending: true }], ..Default::default() };
        let sorted_desc = apply(solutions, &modifiers_desc);
        assert_eq!(sorted_desc.iter().map(|s| s["x"].clone()).collect::<Vec<_>>(), vec![FieldValue::Int64(3), FieldValue::Int64(2), FieldValue::Int64(1)]);
    }

    #[test]
    fn distinct_dedups_after_projection() {
        let solutions = vec![
            sol(&[("x", FieldValue::Int64(1)), ("y", FieldValue::Int64(9))]),
            sol(&[("x", FieldValue::Int64(1)), ("y", FieldValue::Int64(8))]),
        ];
        let modifiers = Modifiers { project: Some(vec!["x".into()]), distinct: true, ..Default::default() };
        let out = apply(solutions, &modifiers);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn offset_and_limit_apply_after_distinct() {
        let solutions: Vec<Solution> = (0..10).map(|i| sol(&[("x", FieldValue::Int64(i))])).collect();
        let modifiers = Modifiers { offset: 2, limit: Some(3), ..Default::default() };
        let out = apply(solutions, &modifiers);
        assert_eq!(out.iter().map(|s| s["x"].clone()).collect::<Vec<_>>(), vec![FieldValue::Int64(2), FieldValue::Int64(3), FieldValue::Int64(4)]);
    }
}
