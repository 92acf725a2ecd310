//! Terms and triple patterns (spec §4.11.1).
//!
//! Grounded on the teacher's record-id tuple shape
//! (`recordgraph_core::value::FieldValue`), generalized with a `Term`
//! wrapper so a triple component can additionally be an unbound variable
//! or a wildcard. Quoted-triple values (RDF-star) are handled at the
//! value level instead, via `TRIPLE()`/`isTRIPLE()` (spec §4.11 built-ins).

use recordgraph_core::value::FieldValue;

/// One component of a triple pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum Term {
    /// An unbound variable, named without its leading `?`.
    Variable(String),
    /// A bound value.
    Value(FieldValue),
    /// Matches anything, binds nothing (used where a caller doesn't care
    /// about a component and doesn't want to name a throwaway variable).
    Wildcard,
}

impl Term {
    /// A variable term, normalizing away a leading `?` if present.
    pub fn var(name: impl AsRef<str>) -> Self {
        let name = name.as_ref();
        Term::Variable(name.strip_prefix('?').unwrap_or(name).to_string())
    }

    /// `isBound`: `true` for `Value`, `false` for `Variable` and `Wildcard`.
    pub fn is_bound(&self) -> bool {
        matches!(self, Term::Value(_))
    }

    /// The variable name this term binds, if it's a plain variable.
    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Term::Variable(name) => Some(name),
            _ => None,
        }
    }
}

/// A triple pattern `(s, p, o)` plus an optional named graph component.
#[derive(Debug, Clone, PartialEq)]
pub struct TriplePattern {
    /// Subject term.
    pub s: Term,
    /// Predicate term.
    pub p: Term,
    /// Object term.
    pub o: Term,
    /// Named graph term, if this store partitions triples by graph.
    pub graph: Option<Term>,
}

impl TriplePattern {
    /// Construct a pattern with no graph component.
    pub fn new(s: Term, p: Term, o: Term) -> Self {
        Self { s, p, o, graph: None }
    }

    /// Construct a pattern scoped to a named graph.
    pub fn in_graph(s: Term, p: Term, o: Term, graph: Term) -> Self {
        Self { s, p, o, graph: Some(graph) }
    }

    /// How many of `s`, `p`, `o` are bound — used for selectivity ordering
    /// in basic graph pattern evaluation (spec §4.11.3).
    pub fn bound_count(&self) -> u32 {
        [&self.s, &self.p, &self.o].iter().filter(|t| t.is_bound()).count() as u32
    }
}

/// A fully resolved triple: three concrete `FieldValue`s, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    /// Subject.
    pub s: FieldValue,
    /// Predicate.
    pub p: FieldValue,
    /// Object.
    pub o: FieldValue,
}

impl Triple {
    /// Construct a triple.
    pub fn new(s: FieldValue, p: FieldValue, o: FieldValue) -> Self {
        Self { s, p, o }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_strips_leading_question_mark() {
        assert_eq!(Term::var("?x"), Term::Variable("x".to_string()));
        assert_eq!(Term::var("x"), Term::Variable("x".to_string()));
    }

    #[test]
    fn bound_count_counts_values_only() {
        let p = TriplePattern::new(
            Term::Value(FieldValue::String("s".into())),
            Term::var("p"),
            Term::Value(FieldValue::String("o".into())),
        );
        assert_eq!(p.bound_count(), 2);
    }
}
