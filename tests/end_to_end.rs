//! End-to-end scenarios (spec §8.4) exercised against the public
//! `recordgraph` facade plus the lower-level collaborators a couple of
//! scenarios need direct access to (the index state machine for E1's
//! `enable()` step, the GRV cache + transaction runner for E6).

use recordgraph::{
    evaluate_path, CmpOp, Container, ContainerConfig, Expr, FieldPathIndex, FieldValue, Hexastore,
    Limits, MemoryDatabase, Pattern, PathLimits, PropertyPath, RecordType, Schema, Term, Triple,
    TriplePattern,
};
use recordgraph_core::traits::{Database, Transaction};
use std::sync::Arc;
use std::time::Duration;

fn user(id: i64, email: &str) -> FieldValue {
    FieldValue::Array(vec![FieldValue::Int64(id), FieldValue::String(email.into())])
}

/// E1: insert/update/delete of one record with one maintained index;
/// each step's storage snapshot matches spec §8.4's literal expectations.
#[test]
fn e1_insert_update_delete_with_one_index() {
    let db = MemoryDatabase::new();
    {
        let mut txn = db.create_transaction();
        recordgraph_storage::enable(&mut txn, "by_email").unwrap();
        txn.commit().unwrap();
    }

    let rt = RecordType::new("User", vec![0]).with_index(Arc::new(FieldPathIndex::new("by_email", vec![1])));
    let container = Container::open(db, Schema { types: vec![rt], graphs: vec![] }, ContainerConfig::default());
    let ctx = container.new_context(None);

    // (1) insert User{id:1, email:"a@x"}
    ctx.insert("User", user(1, "a@x")).unwrap();
    ctx.save().unwrap();
    let by_a = ctx.query("User").using_index("by_email", vec![FieldValue::String("a@x".into())]).fetch().unwrap();
    assert_eq!(by_a, vec![user(1, "a@x")]);

    // (2) update: same id, new email
    ctx.insert("User", user(1, "b@x")).unwrap();
    ctx.save().unwrap();
    let by_a = ctx.query("User").using_index("by_email", vec![FieldValue::String("a@x".into())]).fetch().unwrap();
    assert!(by_a.is_empty(), "stale index entry must be gone after update");
    let by_b = ctx.query("User").using_index("by_email", vec![FieldValue::String("b@x".into())]).fetch().unwrap();
    assert_eq!(by_b, vec![user(1, "b@x")]);

    // (3) delete
    ctx.delete("User", vec![FieldValue::Int64(1)]).unwrap();
    ctx.save().unwrap();
    assert!(ctx.fetch("User").unwrap().is_empty());
    let by_b = ctx.query("User").using_index("by_email", vec![FieldValue::String("b@x".into())]).fetch().unwrap();
    assert!(by_b.is_empty());
}

/// E3: basic graph pattern + OPTIONAL + FILTER over a small hexastore,
/// matching spec §8.4's literal expected solutions.
#[test]
fn e3_bgp_optional_filter() {
    let db = MemoryDatabase::new();
    let hexastore = Hexastore::new("social");
    {
        let mut txn = db.create_transaction();
        let limits = Limits::default();
        for (s, p, o) in [
            ("Alice", "knows", "Bob"),
            ("Alice", "knows", "Carol"),
            ("Bob", "name", "Bob Smith"),
            ("Carol", "age", "30"),
        ] {
            hexastore
                .insert(&mut txn, &Triple::new(FieldValue::String(s.into()), FieldValue::String(p.into()), FieldValue::String(o.into())), &limits)
                .unwrap();
        }
        txn.commit().unwrap();
    }

    let txn = db.create_transaction();
    let mut stats = recordgraph::EvalStats::default();
    let knows = TriplePattern::new(Term::var("x"), Term::Value(FieldValue::String("knows".into())), Term::var("y"));
    let name = TriplePattern::new(Term::var("y"), Term::Value(FieldValue::String("name".into())), Term::var("n"));
    let pattern = Pattern::Filter(
        Box::new(Pattern::Optional(Box::new(Pattern::Basic(vec![knows])), Box::new(Pattern::Basic(vec![name])))),
        Expr::Comparison(
            CmpOp::Eq,
            Box::new(Expr::Var("x".into())),
            Box::new(Expr::Literal(FieldValue::String("Alice".into()))),
        ),
    );
    let solutions = recordgraph::evaluate_pattern(&txn, &hexastore, &pattern, &mut stats).unwrap();

    assert_eq!(solutions.len(), 2);
    let bob = solutions.iter().find(|s| s.get("y") == Some(&FieldValue::String("Bob".into()))).unwrap();
    assert_eq!(bob.get("n"), Some(&FieldValue::String("Bob Smith".into())));
    let carol = solutions.iter().find(|s| s.get("y") == Some(&FieldValue::String("Carol".into()))).unwrap();
    assert_eq!(carol.get("n"), None);
}

/// E4: `knows+` over a cyclic graph must attribute every reachable pair
/// back to its true origin, per spec §8.4's literal pair set.
#[test]
fn e4_property_path_with_cycle() {
    let db = MemoryDatabase::new();
    let hexastore = Hexastore::new("social");
    {
        let mut txn = db.create_transaction();
        let limits = Limits::default();
        for (s, o) in [("A", "B"), ("B", "C"), ("C", "A"), ("A", "D")] {
            hexastore
                .insert(&mut txn, &Triple::new(FieldValue::String(s.into()), FieldValue::String("knows".into()), FieldValue::String(o.into())), &limits)
                .unwrap();
        }
        txn.commit().unwrap();
    }

    let txn = db.create_transaction();
    let path = PropertyPath::OneOrMore(Box::new(PropertyPath::Iri(FieldValue::String("knows".into()))));
    let solutions = evaluate_path(&txn, &hexastore, &Term::var("x"), &path, &Term::var("y"), PathLimits::default()).unwrap();

    let mut pairs: Vec<(String, String)> = solutions
        .into_iter()
        .map(|s| {
            let FieldValue::String(x) = s["x"].clone() else { unreachable!() };
            let FieldValue::String(y) = s["y"].clone() else { unreachable!() };
            (x, y)
        })
        .collect();
    pairs.sort();
    pairs.dedup();

    let mut expected: Vec<(String, String)> = [
        ("A", "B"), ("A", "C"), ("A", "A"), ("A", "D"),
        ("B", "C"), ("B", "A"), ("B", "B"), ("B", "D"),
        ("C", "A"), ("C", "B"), ("C", "C"), ("C", "D"),
    ]
    .iter()
    .map(|(a, b)| (a.to_string(), b.to_string()))
    .collect();
    expected.sort();
    assert_eq!(pairs, expected);
}

/// E6: a second read-only transaction issued within the staleness bound
/// reuses the first's committed read version instead of drawing a fresh
/// one from the collaborator.
#[test]
fn e6_grv_cache_reuse_within_staleness_bound() {
    let db = MemoryDatabase::new();
    let cache = recordgraph::GrvCache::new();
    let config = recordgraph::RunnerConfig { grv_staleness: Duration::from_secs(5), ..Default::default() };

    let first_version = recordgraph_engine::with_transaction(&db, &cache, &config, |txn: &mut recordgraph_durability::MemoryTransaction| {
        txn.set(b"k", b"v");
        Ok(())
    })
    .map(|_| cache.cached_version_within(Duration::from_secs(5)).unwrap())
    .unwrap();

    std::thread::sleep(Duration::from_millis(1));

    let reused = recordgraph_engine::with_transaction(&db, &cache, &config, |txn: &mut recordgraph_durability::MemoryTransaction| Ok(txn.read_version()))
        .unwrap();

    assert_eq!(reused, first_version, "second transaction must reuse the first's committed read version");
}
