//! Fluent query builder (spec §6.2): index-assisted lookup against one
//! record type's stored and pending data, narrowed by an optional
//! predicate before decoding into a caller-chosen `T`.
//!
//! Grounded on the hexastore executor's partial-tuple prefix-scan
//! convention (`crates/graph/src/executor.rs`'s `scan_range`), reused here
//! for ordinary `I/<indexName>/...` record indexes instead of triple
//! orderings.

use crate::context::Context;
use recordgraph_core::error::Result;
use recordgraph_core::keyspace::Subspace;
use recordgraph_core::traits::{Database, Transaction};
use recordgraph_core::value::FieldValue;
use recordgraph_engine::record_type;

/// A fluent query against one record type, narrowed by an optional
/// `using_index` prefix lookup and an optional in-memory `filter`, before
/// materializing with `fetch`/`fetch_as` (spec §6.2's fluent query
/// builder → typed `Query<T>`).
pub struct Query<'a, D: Database> {
    context: &'a Context<D>,
    type_name: String,
    index: Option<(String, Vec<FieldValue>)>,
    predicate: Option<Box<dyn Fn(&FieldValue) -> bool + 'a>>,
}

impl<'a, D: Database + Send + Sync + 'static> Query<'a, D> {
    pub(crate) fn new(context: &'a Context<D>, type_name: impl Into<String>) -> Self {
        Self { context, type_name: type_name.into(), index: None, predicate: None }
    }

    /// Narrow to records whose `index_name` entry starts with `values`
    /// (an exact match if `values` covers every key expression).
    pub fn using_index(mut self, index_name: impl Into<String>, values: Vec<FieldValue>) -> Self {
        self.index = Some((index_name.into(), values));
        self
    }

    /// Keep only records for which `predicate` returns `true`, applied
    /// after the index narrowing (or over every stored record, if none
    /// was given).
    pub fn filter(mut self, predicate: impl Fn(&FieldValue) -> bool + 'a) -> Self {
        self.predicate = Some(Box::new(predicate));
        self
    }

    /// Materialize the query's matching records.
    pub fn fetch(&self) -> Result<Vec<FieldValue>> {
        let candidates = match &self.index {
            Some((index_name, values)) => self.fetch_via_index(index_name, values)?,
            None => self.context.fetch(&self.type_name)?,
        };
        Ok(match &self.predicate {
            Some(p) => candidates.into_iter().filter(|r| p(r)).collect(),
            None => candidates,
        })
    }

    /// Materialize and decode every matching record with `decode` (spec
    /// §6.2's typed `Query<T>`).
    pub fn fetch_as<T>(&self, decode: impl Fn(&FieldValue) -> T) -> Result<Vec<T>> {
        Ok(self.fetch()?.into_iter().map(|r| decode(&r)).collect())
    }

    fn fetch_via_index(&self, index_name: &str, values: &[FieldValue]) -> Result<Vec<FieldValue>> {
        let db = self.context.database();
        let txn = db.create_transaction();
        let subspace = Subspace::new(b"I".to_vec()).child(index_name);
        let prefix = subspace.pack(values);
        let (begin, end) = Subspace::exact_range(&prefix);
        let rows = txn.get_range(&begin, &end, true)?;

        let mut ids = Vec::with_capacity(rows.len());
        for (key, _) in rows {
            let Some(Ok(tuple)) = subspace.unpack(&key) else { continue };
            if tuple.len() > values.len() {
                ids.push(tuple[values.len()..].to_vec());
            }
        }

        let rt = self.context.record_type(&self.type_name)?;
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            let key = rt.subspace().pack(&id);
            if let Some(bytes) = txn.get(&key, true)? {
                out.push(record_type::decode(&bytes)?);
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, ContainerConfig, Schema};
    use recordgraph_durability::MemoryDatabase;
    use recordgraph_engine::record_type::{FieldPathIndex, RecordType};
    use std::sync::Arc;

    fn container() -> Container<MemoryDatabase> {
        let rt = RecordType::new("user", vec![0]).with_index(Arc::new(FieldPathIndex::new("by_email", vec![1])));
        let c = Container::open(MemoryDatabase::new(), Schema { types: vec![rt], graphs: vec![] }, ContainerConfig::default());

        // Indexes start disabled (spec §4.6); a real deployment brings one
        // to write_only via the online indexer before relying on it, which
        // this test setup does by hand since no records exist yet to build.
        use recordgraph_core::traits::Transaction as _;
        let mut txn = c.db.create_transaction();
        recordgraph_storage::enable(&mut txn, "by_email").unwrap();
        txn.commit().unwrap();
        c
    }

    fn user(name: &str, email: &str) -> FieldValue {
        FieldValue::Array(vec![FieldValue::String(name.into()), FieldValue::String(email.into())])
    }

    #[test]
    fn fetch_without_index_returns_every_record() {
        let c = container();
        let ctx = c.new_context(None);
        ctx.insert("user", user("alice", "alice@example.com")).unwrap();
        ctx.insert("user", user("bob", "bob@example.com")).unwrap();
        ctx.save().unwrap();

        let results = ctx.query("user").fetch().unwrap();
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn using_index_narrows_to_matching_entries() {
        let c = container();
        let ctx = c.new_context(None);
        ctx.insert("user", user("alice", "alice@example.com")).unwrap();
        ctx.insert("user", user("bob", "bob@example.com")).unwrap();
        ctx.save().unwrap();

        let results = ctx
            .query("user")
            .using_index("by_email", vec![FieldValue::String("bob@example.com".into())])
            .fetch()
            .unwrap();
        assert_eq!(results, vec![user("bob", "bob@example.com")]);
    }

    #[test]
    fn filter_applies_after_index_narrowing() {
        let c = container();
        let ctx = c.new_context(None);
        ctx.insert("user", user("alice", "alice@example.com")).unwrap();
        ctx.save().unwrap();

        let results = ctx.query("user").filter(|_| false).fetch().unwrap();
        assert!(results.is_empty());
    }
}
