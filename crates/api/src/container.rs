//! `Container` (spec §6.2): the top-level handle opened once per
//! application, holding the declared schema and the collaborators every
//! [`Context`](crate::context::Context) shares — the GRV cache, the named
//! hexastores, and the performance monitor.

use crate::context::Context;
use crate::perf::{PerfMonitor, PerfMonitorConfig};
use recordgraph_core::limits::Limits;
use recordgraph_core::traits::Database;
use recordgraph_durability::GrvCache;
use recordgraph_engine::record_type::RecordType;
use recordgraph_engine::runner::RunnerConfig;
use recordgraph_graph::Hexastore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// The declared shape of a container's data (spec §6.2
/// `Container(for: schema, config?)`): record types plus named graphs for
/// SPARQL evaluation.
#[derive(Default)]
pub struct Schema {
    /// Record types this container maintains.
    pub types: Vec<RecordType>,
    /// Names of the hexastore graphs this container maintains.
    pub graphs: Vec<String>,
}

/// Tunables handed to [`Container::open`].
#[derive(Clone)]
pub struct ContainerConfig {
    /// Size ceilings enforced on the write path.
    pub limits: Limits,
    /// Transaction runner retry/backoff tunables.
    pub runner: RunnerConfig,
    /// Performance monitor tunables.
    pub perf: PerfMonitorConfig,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self { limits: Limits::default(), runner: RunnerConfig::default(), perf: PerfMonitorConfig::default() }
    }
}

/// The application-facing entry point: owns the schema and the
/// collaborators shared by every [`Context`] it mints (spec §6.2).
pub struct Container<D: Database> {
    pub(crate) db: Arc<D>,
    pub(crate) cache: Arc<GrvCache>,
    pub(crate) types: Arc<HashMap<String, Arc<RecordType>>>,
    pub(crate) graphs: Arc<HashMap<String, Hexastore>>,
    pub(crate) limits: Limits,
    pub(crate) runner_config: RunnerConfig,
    pub(crate) perf: Arc<PerfMonitor>,
}

impl<D: Database + Send + Sync + 'static> Container<D> {
    /// Open a container over `db` with the given schema and
    /// configuration.
    pub fn open(db: D, schema: Schema, config: ContainerConfig) -> Self {
        let types = schema.types.into_iter().map(|t| (t.name().to_string(), Arc::new(t))).collect();
        let graphs = schema.graphs.into_iter().map(|name| (name.clone(), Hexastore::new(&name))).collect();
        Self {
            db: Arc::new(db),
            cache: Arc::new(GrvCache::new()),
            types: Arc::new(types),
            graphs: Arc::new(graphs),
            limits: config.limits,
            runner_config: config.runner,
            perf: Arc::new(PerfMonitor::new(config.perf)),
        }
    }

    /// Mint a new use-session. When `autosave` is `Some(debounce)`, every
    /// `insert`/`delete` on the returned context schedules a debounced
    /// `save()` (spec §4.8, §6.2 `newContext(autosave?)`).
    pub fn new_context(&self, autosave: Option<Duration>) -> Arc<Context<D>> {
        Context::open(
            self.db.clone(),
            self.cache.clone(),
            self.types.clone(),
            self.graphs.clone(),
            self.limits,
            self.perf.clone(),
            autosave,
        )
    }

    /// Block until `key`'s stored value changes (spec §6.2 `watch`).
    pub fn watch(&self, key: &[u8]) -> recordgraph_core::error::Result<()> {
        self.db.watch(key)
    }

    /// The read version a freshly-created transaction would observe right
    /// now (spec §6.2 `currentReadVersion`).
    pub fn current_read_version(&self) -> u64 {
        self.db.create_transaction().read_version()
    }

    /// A coarse estimate of total stored bytes (spec §6.2
    /// `estimatedStorageSize`).
    pub fn estimated_storage_size(&self) -> u64 {
        self.db.estimated_storage_size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recordgraph_core::value::FieldValue;
    use recordgraph_durability::MemoryDatabase;

    fn schema() -> Schema {
        Schema { types: vec![RecordType::new("user", vec![0])], graphs: vec!["social".to_string()] }
    }

    #[test]
    fn new_context_shares_schema_and_storage() {
        let container = Container::open(MemoryDatabase::new(), schema(), ContainerConfig::default());
        let ctx = container.new_context(None);
        ctx.insert("user", FieldValue::Array(vec![FieldValue::String("alice".into())])).unwrap();
        ctx.save().unwrap();

        let ctx2 = container.new_context(None);
        assert_eq!(ctx2.fetch("user").unwrap().len(), 1);
    }

    #[test]
    fn current_read_version_advances_after_commit() {
        let container = Container::open(MemoryDatabase::new(), schema(), ContainerConfig::default());
        let before = container.current_read_version();
        let ctx = container.new_context(None);
        ctx.insert("user", FieldValue::Array(vec![FieldValue::String("bob".into())])).unwrap();
        ctx.save().unwrap();
        assert!(container.current_read_version() > before);
    }

    #[test]
    fn estimated_storage_size_grows_after_insert() {
        let container = Container::open(MemoryDatabase::new(), schema(), ContainerConfig::default());
        let before = container.estimated_storage_size();
        let ctx = container.new_context(None);
        ctx.insert("user", FieldValue::Array(vec![FieldValue::String("carol".into())])).unwrap();
        ctx.save().unwrap();
        assert!(container.estimated_storage_size() > before);
    }
}
