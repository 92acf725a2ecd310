//! Hexastore Graph Index (spec §4.10): six permutations of every stored
//! triple, each in its own numeric sub-subspace, so any bound-pattern
//! combination can be answered with a prefix scan.
//!
//! Grounded on the teacher's multi-ordering secondary index convention
//! (`crates/storage/src/index.rs`'s parallel `RunIndex`/`TypeIndex`
//! sub-subspaces), generalized from two fixed orderings to the six (plus
//! two adjacency) orderings a triple store needs.

use recordgraph_core::error::Result;
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::limits::Limits;
use recordgraph_core::traits::Transaction;
use recordgraph_core::value::FieldValue;
use recordgraph_core::RecordGraphError;

use crate::term::Triple;

/// The six triple-store orderings, each keyed by one digit 0-5 under the
/// index's root subspace. Adjacency views (`SP`, `PO`) reuse `Spo`/`Pos`
/// prefixes one component shorter and so need no separate sub-subspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering {
    /// Subject, predicate, object.
    Spo,
    /// Predicate, object, subject.
    Pos,
    /// Object, subject, predicate.
    Osp,
    /// Predicate, subject, object.
    Pso,
    /// Subject, object, predicate.
    Sop,
    /// Object, predicate, subject.
    Ops,
}

impl Ordering {
    const ALL: [Ordering; 6] = [
        Ordering::Spo,
        Ordering::Pos,
        Ordering::Osp,
        Ordering::Pso,
        Ordering::Sop,
        Ordering::Ops,
    ];

    fn digit(self) -> &'static str {
        match self {
            Ordering::Spo => "0",
            Ordering::Pos => "1",
            Ordering::Osp => "2",
            Ordering::Pso => "3",
            Ordering::Sop => "4",
            Ordering::Ops => "5",
        }
    }

    /// Reorder `(s, p, o)` into this ordering's on-disk component order.
    fn permute(self, s: &FieldValue, p: &FieldValue, o: &FieldValue) -> [FieldValue; 3] {
        match self {
            Ordering::Spo => [s.clone(), p.clone(), o.clone()],
            Ordering::Pos => [p.clone(), o.clone(), s.clone()],
            Ordering::Osp => [o.clone(), s.clone(), p.clone()],
            Ordering::Pso => [p.clone(), s.clone(), o.clone()],
            Ordering::Sop => [s.clone(), o.clone(), p.clone()],
            Ordering::Ops => [o.clone(), p.clone(), s.clone()],
        }
    }

    /// Map three components stored in this ordering back to `(s, p, o)`.
    fn unpermute(self, a: FieldValue, b: FieldValue, c: FieldValue) -> (FieldValue, FieldValue, FieldValue) {
        match self {
            Ordering::Spo => (a, b, c),
            Ordering::Pos => (c, a, b),
            Ordering::Osp => (b, c, a),
            Ordering::Pso => (b, a, c),
            Ordering::Sop => (a, c, b),
            Ordering::Ops => (c, b, a),
        }
    }
}

/// Root subspace for a named hexastore index.
pub struct Hexastore {
    root: Subspace,
}

impl Hexastore {
    /// Open the hexastore rooted at `G/<name>`.
    pub fn new(name: &str) -> Self {
        Self { root: Subspace::new(b"G".to_vec()).child(name) }
    }

    fn ordering_subspace(&self, ordering: Ordering) -> Subspace {
        self.root.child(ordering.digit())
    }

    /// Write `triple` under all six permutations.
    pub fn insert<T: Transaction>(&self, txn: &mut T, triple: &Triple, limits: &Limits) -> Result<()> {
        for ordering in Ordering::ALL {
            let [a, b, c] = ordering.permute(&triple.s, &triple.p, &triple.o);
            let key = self.ordering_subspace(ordering).pack(&[a, b, c]);
            if key.len() > limits.max_key_bytes {
                return Err(RecordGraphError::KeyTooLarge { actual: key.len(), limit: limits.max_key_bytes });
            }
            txn.set(&key, &[]);
        }
        Ok(())
    }

    /// Clear `triple` from all six permutations.
    pub fn delete<T: Transaction>(&self, txn: &mut T, triple: &Triple) {
        for ordering in Ordering::ALL {
            let [a, b, c] = ordering.permute(&triple.s, &triple.p, &triple.o);
            let key = self.ordering_subspace(ordering).pack(&[a, b, c]);
            txn.clear(&key);
        }
    }

    /// Choose the optimal ordering for a bound subset of `(s, p, o)`, per
    /// spec §4.11.4's table. Prefers the hexastore ordering named there
    /// over the adjacency alternative (`Sop` over `Osp` for `(s,_,o)`,
    /// `Pso` over `Pos` for `(_,p,_)`).
    pub fn choose_ordering(s_bound: bool, p_bound: bool, o_bound: bool) -> Ordering {
        match (s_bound, p_bound, o_bound) {
            (true, true, true) => Ordering::Spo,
            (true, true, false) => Ordering::Spo,
            (true, false, true) => Ordering::Sop,
            (false, true, true) => Ordering::Pos,
            (true, false, false) => Ordering::Spo,
            (false, true, false) => Ordering::Pso,
            (false, false, true) => Ordering::Osp,
            (false, false, false) => Ordering::Spo,
        }
    }

    /// Build the scan range for `ordering` given the bound components (in
    /// `(s, p, o)` terms; pass `None` for unbound). Fully-bound patterns
    /// get an exact-key range so the single matching key is included;
    /// partially-bound patterns get the natural subspace prefix range.
    pub fn scan_range(
        &self,
        ordering: Ordering,
        s: Option<&FieldValue>,
        p: Option<&FieldValue>,
        o: Option<&FieldValue>,
    ) -> (Vec<u8>, Vec<u8>) {
        let sub = self.ordering_subspace(ordering);
        let bound: Vec<FieldValue> = match ordering {
            Ordering::Spo => [s, p, o],
            Ordering::Pos => [p, o, s],
            Ordering::Osp => [o, s, p],
            Ordering::Pso => [p, s, o],
            Ordering::Sop => [s, o, p],
            Ordering::Ops => [o, p, s],
        }
        .into_iter()
        .take_while(|c| c.is_some())
        .map(|c| c.unwrap().clone())
        .collect();

        if bound.is_empty() {
            return sub.range();
        }
        let key = sub.pack(&bound);
        let all_bound = s.is_some() && p.is_some() && o.is_some();
        if all_bound {
            Subspace::exact_range(&key)
        } else {
            // Prefix range: every key starting with `key`'s bytes (without the
            // tuple terminator semantics `exact_range` assumes for a full key).
            let begin = key.clone();
            let end = recordgraph_core::strinc(&key).unwrap_or_else(|| {
                let mut v = key.clone();
                v.push(0xff);
                v
            });
            (begin, end)
        }
    }

    /// Unpack a key returned from [`scan_range`] under `ordering` back into
    /// `(s, p, o)` order.
    pub fn unpack(&self, ordering: Ordering, key: &[u8]) -> Option<Result<Triple>> {
        let elems = self.ordering_subspace(ordering).unpack(key)?;
        let elems = match elems {
            Ok(e) => e,
            Err(e) => return Some(Err(e.into())),
        };
        if elems.len() != 3 {
            return Some(Err(RecordGraphError::Storage("malformed hexastore entry".into())));
        }
        let mut it = elems.into_iter();
        let (a, b, c) = (it.next().unwrap(), it.next().unwrap(), it.next().unwrap());
        let (s, p, o) = ordering.unpermute(a, b, c);
        Some(Ok(Triple::new(s, p, o)))
    }
}
