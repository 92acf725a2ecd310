//! `FieldValue`: the unified, dynamically-typed value carried by records,
//! triples, and query solutions.
//!
//! This plays the role the teacher's `strata_core::value::Value` plays for
//! its primitives, generalized to the cross-type numeric and ordering rules
//! SPARQL evaluation needs (spec §4.11.2).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A dynamically typed scalar or array value.
///
/// Variants mirror spec §4.11.2 exactly: `null, bool, int64, double, string,
/// data, array`. `data` is raw bytes (named to avoid clashing with Rust's
/// `bytes` crate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FieldValue {
    /// Absence of a value. Distinct from an unbound variable (see
    /// `crate::binding::GroupValue`).
    Null,
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit IEEE-754 float.
    Double(f64),
    /// UTF-8 string.
    String(String),
    /// Raw byte string.
    Data(Vec<u8>),
    /// Ordered array of values.
    Array(Vec<FieldValue>),
}

impl FieldValue {
    /// Effective boolean value per SPARQL §17.2.
    ///
    /// `bool → self`, `numeric → ≠0 ∧ ¬NaN`, `string → ¬empty`,
    /// `null/array/data → false`.
    pub fn effective_boolean_value(&self) -> bool {
        match self {
            FieldValue::Bool(b) => *b,
            FieldValue::Int64(n) => *n != 0,
            FieldValue::Double(d) => *d != 0.0 && !d.is_nan(),
            FieldValue::String(s) => !s.is_empty(),
            FieldValue::Null | FieldValue::Data(_) | FieldValue::Array(_) => false,
        }
    }

    /// A stable discriminant used for the deterministic type fallback in
    /// sort/compare when two values are otherwise incomparable.
    fn type_rank(&self) -> u8 {
        match self {
            FieldValue::Null => 0,
            FieldValue::Bool(_) => 1,
            FieldValue::Int64(_) => 2,
            FieldValue::Double(_) => 2, // numeric types share a rank
            FieldValue::String(_) => 3,
            FieldValue::Data(_) => 4,
            FieldValue::Array(_) => 5,
        }
    }

    /// Partial comparison per spec §4.11.2: returns `None` for incomparable
    /// types (e.g. string vs bool). Cross-type numeric comparison promotes
    /// `int64` to `double`.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        use FieldValue::*;
        match (self, other) {
            (Null, Null) => Some(Ordering::Equal),
            (Bool(a), Bool(b)) => a.partial_cmp(b),
            (Int64(a), Int64(b)) => a.partial_cmp(b),
            (Double(a), Double(b)) => a.partial_cmp(b),
            (Int64(a), Double(b)) => (*a as f64).partial_cmp(b),
            (Double(a), Int64(b)) => a.partial_cmp(&(*b as f64)),
            (String(a), String(b)) => a.partial_cmp(b),
            (Data(a), Data(b)) => a.partial_cmp(b),
            (Array(a), Array(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y) {
                        Some(Ordering::Equal) => continue,
                        other => return other,
                    }
                }
                a.len().partial_cmp(&b.len())
            }
            _ => None,
        }
    }

    /// Deterministic total order used by ORDER BY: falls back to
    /// `type_rank` when `compare` returns `None`.
    pub fn sort_key_compare(&self, other: &FieldValue) -> Ordering {
        self.compare(other)
            .unwrap_or_else(|| self.type_rank().cmp(&other.type_rank()))
    }

    /// SPARQL-style equality: cross-type numeric equality holds when
    /// `int64(n) == double(x) ⇔ x is finite ∧ (double)n == x`. `null`
    /// compares equal only to `null`.
    pub fn sparql_eq(&self, other: &FieldValue) -> bool {
        use FieldValue::*;
        match (self, other) {
            (Int64(n), Double(x)) | (Double(x), Int64(n)) => x.is_finite() && (*n as f64) == *x,
            _ => self.compare(other) == Some(Ordering::Equal),
        }
    }

    /// `true` for `Int64`/`Double`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Int64(_) | FieldValue::Double(_))
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.sparql_eq(other)
    }
}

// `Eq` + `Hash` are required so `FieldValue` can key index entries / hash
// sets in GROUP BY. NaN hashing is collapsed to a single bit pattern so the
// invariant `a == b ⇒ hash(a) == hash(b)` holds even though `f64` has no
// natural `Eq`.
impl Eq for FieldValue {}

impl std::hash::Hash for FieldValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        match self {
            FieldValue::Null => 0u8.hash(state),
            FieldValue::Bool(b) => {
                1u8.hash(state);
                b.hash(state);
            }
            FieldValue::Int64(n) => {
                2u8.hash(state);
                n.hash(state);
            }
            FieldValue::Double(d) => {
                2u8.hash(state); // share discriminant with Int64 for cross-type equal hashing
                if d.is_nan() {
                    u64::MAX.hash(state);
                } else if *d == d.trunc() && d.is_finite() {
                    (*d as i64).hash(state);
                } else {
                    d.to_bits().hash(state);
                }
            }
            FieldValue::String(s) => {
                3u8.hash(state);
                s.hash(state);
            }
            FieldValue::Data(d) => {
                4u8.hash(state);
                d.hash(state);
            }
            FieldValue::Array(a) => {
                5u8.hash(state);
                a.hash(state);
            }
        }
    }
}
