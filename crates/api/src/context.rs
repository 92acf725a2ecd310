//! `Context` (spec §6.2): a [`Container`](crate::container::Container)
//! use-session wrapping a [`WriteSession`], the declarative query surface
//! (fluent [`Query`](crate::query::Query) builder,
//! [`SparqlEntryPoint`](crate::sparql::SparqlEntryPoint)), and the
//! performance monitor event hooks every `save()` reports through.

use crate::perf::PerfMonitor;
use crate::query::Query;
use crate::sparql::SparqlEntryPoint;
use parking_lot::Mutex as PlMutex;
use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::limits::Limits;
use recordgraph_core::traits::Database;
use recordgraph_core::value::FieldValue;
use recordgraph_durability::GrvCache;
use recordgraph_engine::record_type::RecordType;
use recordgraph_engine::write_session::{AutosaveHandle, WriteSession};
use recordgraph_graph::Hexastore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A use-session over a container: buffers reads/writes through a
/// [`WriteSession`] and exposes the query surface spec §6.2 names.
pub struct Context<D: Database> {
    session: Arc<WriteSession<D>>,
    db: Arc<D>,
    types: Arc<HashMap<String, Arc<RecordType>>>,
    graphs: Arc<HashMap<String, Hexastore>>,
    perf: Arc<PerfMonitor>,
    _autosave: PlMutex<Option<AutosaveHandle>>,
}

impl<D: Database + Send + Sync + 'static> Context<D> {
    pub(crate) fn open(
        db: Arc<D>,
        cache: Arc<GrvCache>,
        types: Arc<HashMap<String, Arc<RecordType>>>,
        graphs: Arc<HashMap<String, Hexastore>>,
        limits: Limits,
        perf: Arc<PerfMonitor>,
        autosave: Option<Duration>,
    ) -> Arc<Self> {
        let session = Arc::new(WriteSession::new(db.clone(), cache, types.clone(), limits));
        let context = Arc::new(Self {
            session: session.clone(),
            db,
            types,
            graphs,
            perf,
            _autosave: PlMutex::new(None),
        });
        if let Some(debounce) = autosave {
            let handle = session.spawn_autosave(debounce, |err| {
                tracing::error!(error = ?err, "autosave failed, autosave disabled");
            });
            *context._autosave.lock() = Some(handle);
        }
        context
    }

    /// Stage an insert (or update) of `record` under `type_name` (spec
    /// §6.2 `insert`).
    pub fn insert(&self, type_name: &str, record: FieldValue) -> Result<()> {
        self.session.insert(type_name, record)
    }

    /// Stage a deletion by id (spec §6.2 `delete`).
    pub fn delete(&self, type_name: &str, id: Vec<FieldValue>) -> Result<()> {
        self.session.delete(type_name, id)
    }

    /// Fetch every stored record of `type_name`, pending writes overlaid
    /// (spec §6.2 `fetch`).
    pub fn fetch(&self, type_name: &str) -> Result<Vec<FieldValue>> {
        self.session.fetch(type_name)
    }

    /// Fetch and decode every record of `type_name` with `decode` (spec
    /// §6.2 `model(for:as:)`). Records are uniformly
    /// [`FieldValue::Array`]s; `decode` is the caller's typed projection,
    /// since this system has no per-type generated Rust struct to decode
    /// into.
    pub fn model<T>(&self, type_name: &str, decode: impl Fn(&FieldValue) -> Result<T>) -> Result<Vec<T>> {
        self.fetch(type_name)?.iter().map(decode).collect()
    }

    /// Lazily enumerate every stored+pending record of `type_name` (spec
    /// §6.2 `enumerate`) rather than collecting a `Vec` up front.
    pub fn enumerate(&self, type_name: &str) -> Result<std::vec::IntoIter<FieldValue>> {
        Ok(self.fetch(type_name)?.into_iter())
    }

    /// Commit every pending insert/delete as one atomic transaction,
    /// reporting the attempt to the container's performance monitor (spec
    /// §4.12's `created`/`committed`/`failed` events; spec §6.2 `save`).
    pub fn save(&self) -> Result<()> {
        self.perf.on_created();
        let started = Instant::now();
        match self.session.save() {
            Ok(()) => {
                self.perf.on_committed("save", started.elapsed());
                Ok(())
            }
            Err(e) => {
                self.perf.on_failed("save", started.elapsed());
                Err(e)
            }
        }
    }

    /// Discard pending writes without touching storage (spec §6.2
    /// `rollback`).
    pub fn rollback(&self) {
        self.session.rollback();
    }

    /// Run `body`, then `save()` if it returned `Ok` (spec §6.2
    /// `performAndSave`). On error from either step, pending writes are
    /// left staged for the caller to inspect or retry.
    pub fn perform_and_save<T>(&self, body: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let value = body(self)?;
        self.save()?;
        Ok(value)
    }

    /// Disable autosave on this context.
    pub fn disable_autosave(&self) {
        self.session.disable_autosave();
    }

    /// Start a fluent query against `type_name` (spec §6.2's fluent query
    /// builder → typed `Query<T>`).
    pub fn query(&self, type_name: impl Into<String>) -> Query<'_, D> {
        Query::new(self, type_name)
    }

    /// Open a SPARQL entry point over the named graph (spec §6.2's SPARQL
    /// entry point → `SPARQLEntryPoint<T>`).
    pub fn sparql(&self, graph_name: &str) -> Result<SparqlEntryPoint<'_, D>> {
        let hexastore = self.graphs.get(graph_name).ok_or_else(|| RecordGraphError::IndexNotFound(graph_name.to_string()))?;
        Ok(SparqlEntryPoint::new(self.db.as_ref(), hexastore))
    }

    pub(crate) fn database(&self) -> &D {
        self.db.as_ref()
    }

    pub(crate) fn record_type(&self, type_name: &str) -> Result<Arc<RecordType>> {
        self.types.get(type_name).cloned().ok_or_else(|| RecordGraphError::ModelNotFound(type_name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordgraph_durability::MemoryDatabase;

    fn types() -> Arc<HashMap<String, Arc<RecordType>>> {
        let mut m = HashMap::new();
        m.insert("user".to_string(), Arc::new(RecordType::new("user", vec![0])));
        Arc::new(m)
    }

    fn context() -> Arc<Context<MemoryDatabase>> {
        Context::open(
            Arc::new(MemoryDatabase::new()),
            Arc::new(GrvCache::new()),
            types(),
            Arc::new(HashMap::new()),
            Limits::default(),
            Arc::new(PerfMonitor::new(crate::perf::PerfMonitorConfig::default())),
            None,
        )
    }

    #[test]
    fn model_decodes_fetched_records() {
        let ctx = context();
        ctx.insert("user", FieldValue::Array(vec![FieldValue::String("alice".into())])).unwrap();
        ctx.save().unwrap();
        let names = ctx
            .model("user", |r| match r {
                FieldValue::Array(fields) => match &fields[0] {
                    FieldValue::String(s) => Ok(s.clone()),
                    _ => unreachable!(),
                },
                _ => unreachable!(),
            })
            .unwrap();
        assert_eq!(names, vec!["alice".to_string()]);
    }

    #[test]
    fn perform_and_save_saves_only_on_success() {
        let ctx = context();
        let result: Result<()> = ctx.perform_and_save(|c| {
            c.insert("user", FieldValue::Array(vec![FieldValue::String("bob".into())]))
        });
        assert!(result.is_ok());
        assert_eq!(ctx.fetch("user").unwrap().len(), 1);
    }

    #[test]
    fn sparql_over_unknown_graph_fails() {
        let ctx = context();
        assert!(matches!(ctx.sparql("ghost"), Err(RecordGraphError::IndexNotFound(_))));
    }
}
