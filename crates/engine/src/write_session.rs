//! Write Session / Context (spec §4.8): buffers `insert`/`delete` calls
//! grouped by record type and commits them atomically, maintaining every
//! non-`disabled` index alongside the record.
//!
//! Grounded on the teacher's transaction context buffering convention
//! (`crates/engine/src/transaction/context.rs`'s pending-events buffer),
//! generalized from one append-only event buffer to the two
//! insert/delete maps with mutual cancellation spec §3.1 requires.

use crate::record_type::{self, RecordType};
use crate::runner::{with_transaction, RunnerConfig};
use recordgraph_core::error::{RecordGraphError, Result};
use recordgraph_core::keyspace::pack;
use recordgraph_core::limits::Limits;
use recordgraph_core::traits::{Database, Transaction};
use recordgraph_core::value::FieldValue;
use recordgraph_durability::GrvCache;
use recordgraph_storage::{current_state, is_maintained};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

type PendingKey = (String, Vec<u8>);

#[derive(Clone)]
struct PendingInsert {
    id: Vec<FieldValue>,
    record: FieldValue,
}

#[derive(Default)]
struct Pending {
    inserted: HashMap<PendingKey, PendingInsert>,
    deleted: HashMap<PendingKey, Vec<FieldValue>>,
}

/// Accumulates `insert`/`delete` calls in memory and commits them as one
/// atomic transaction via [`save`](WriteSession::save).
pub struct WriteSession<D: Database> {
    db: Arc<D>,
    cache: Arc<GrvCache>,
    runner_config: RunnerConfig,
    limits: Limits,
    types: Arc<HashMap<String, Arc<RecordType>>>,
    pending: Mutex<Pending>,
    is_saving: AtomicBool,
    autosave_tx: Mutex<Option<Sender<()>>>,
}

/// Handle to a running autosave debounce thread, kept alive by the
/// caller for as long as autosave should stay active.
pub struct AutosaveHandle {
    _thread: thread::JoinHandle<()>,
}

impl<D: Database> WriteSession<D> {
    /// Construct a session over the given schema (`typeName → RecordType`).
    pub fn new(
        db: Arc<D>,
        cache: Arc<GrvCache>,
        types: Arc<HashMap<String, Arc<RecordType>>>,
        limits: Limits,
    ) -> Self {
        Self {
            db,
            cache,
            runner_config: RunnerConfig::default(),
            limits,
            types,
            pending: Mutex::new(Pending::default()),
            is_saving: AtomicBool::new(false),
            autosave_tx: Mutex::new(None),
        }
    }

    fn record_type(&self, type_name: &str) -> Result<Arc<RecordType>> {
        self.types.get(type_name).cloned().ok_or_else(|| RecordGraphError::ModelNotFound(type_name.to_string()))
    }

    /// Stage an insert (or update, if the id already exists) of `record`
    /// under `type_name`. Overrides and removes any pending delete of the
    /// same id (spec §3.1, §4.8).
    pub fn insert(&self, type_name: &str, record: FieldValue) -> Result<()> {
        let rt = self.record_type(type_name)?;
        let id = rt.id_of(&record)?;
        let key = (type_name.to_string(), pack(&id));
        let mut pending = self.pending.lock().unwrap();
        pending.deleted.remove(&key);
        pending.inserted.insert(key, PendingInsert { id, record });
        drop(pending);
        self.notify_autosave();
        Ok(())
    }

    /// Stage a deletion of the record with `id` under `type_name`.
    /// Overrides and removes any pending insert of the same id.
    pub fn delete(&self, type_name: &str, id: Vec<FieldValue>) -> Result<()> {
        let _ = self.record_type(type_name)?;
        let key = (type_name.to_string(), pack(&id));
        let mut pending = self.pending.lock().unwrap();
        pending.inserted.remove(&key);
        pending.deleted.insert(key, id);
        drop(pending);
        self.notify_autosave();
        Ok(())
    }

    /// Clear every pending insert/delete without touching storage.
    pub fn rollback(&self) {
        let mut pending = self.pending.lock().unwrap();
        pending.inserted.clear();
        pending.deleted.clear();
    }

    /// Fetch every stored record of `type_name`, with pending operations
    /// overlaid: pending deletes are filtered out, pending inserts are
    /// unioned in, deduplicated by id (spec §4.8).
    pub fn fetch(&self, type_name: &str) -> Result<Vec<FieldValue>> {
        let rt = self.record_type(type_name)?;
        let txn = self.db.create_transaction();
        let (begin, end) = rt.subspace().range();
        let stored = txn.get_range(&begin, &end, true)?;

        let pending = self.pending.lock().unwrap();
        let mut seen: std::collections::HashSet<PendingKey> = std::collections::HashSet::new();
        let mut out = Vec::new();
        for (key, bytes) in stored {
            let Some(Ok(id)) = rt.subspace().unpack(&key) else { continue };
            let pkey = (type_name.to_string(), pack(&id));
            seen.insert(pkey.clone());
            if pending.deleted.contains_key(&pkey) {
                continue;
            }
            if let Some(insert) = pending.inserted.get(&pkey) {
                out.push(insert.record.clone());
            } else {
                out.push(record_type::decode(&bytes)?);
            }
        }
        for (pkey, insert) in &pending.inserted {
            if pkey.0 == type_name && !seen.contains(pkey) {
                out.push(insert.record.clone());
            }
        }
        Ok(out)
    }

    /// Commit every pending insert/delete as one atomic transaction,
    /// maintaining every non-`disabled` index for each affected type
    /// (spec §4.8 step 4). Fails with `ConcurrentSaveNotAllowed` if a save
    /// is already in flight; on any error, pending state is restored so
    /// the caller may retry.
    pub fn save(&self) -> Result<()> {
        if self.is_saving.swap(true, Ordering::SeqCst) {
            return Err(RecordGraphError::ConcurrentSaveNotAllowed);
        }

        let snapshot = {
            let mut pending = self.pending.lock().unwrap();
            std::mem::take(&mut *pending)
        };

        let result = self.commit_snapshot(&snapshot);

        if result.is_err() {
            let mut pending = self.pending.lock().unwrap();
            for (k, v) in snapshot.inserted {
                pending.inserted.insert(k, v);
            }
            for (k, v) in snapshot.deleted {
                pending.deleted.insert(k, v);
            }
        }

        self.is_saving.store(false, Ordering::SeqCst);
        result
    }

    fn commit_snapshot(&self, snapshot: &Pending) -> Result<()> {
        if snapshot.inserted.is_empty() && snapshot.deleted.is_empty() {
            return Ok(());
        }

        let mut inserts_by_type: HashMap<String, Vec<&PendingInsert>> = HashMap::new();
        for ((type_name, _), insert) in &snapshot.inserted {
            inserts_by_type.entry(type_name.clone()).or_default().push(insert);
        }
        let mut deletes_by_type: HashMap<String, Vec<&Vec<FieldValue>>> = HashMap::new();
        for ((type_name, _), id) in &snapshot.deleted {
            deletes_by_type.entry(type_name.clone()).or_default().push(id);
        }

        with_transaction(self.db.as_ref(), self.cache.as_ref(), &self.runner_config, |txn| {
            for (type_name, inserts) in &inserts_by_type {
                let rt = self.record_type(type_name)?;
                for insert in inserts {
                    self.apply_insert(txn, &rt, insert)?;
                }
                self.check_size(&*txn)?;
            }
            for (type_name, ids) in &deletes_by_type {
                let rt = self.record_type(type_name)?;
                for id in ids {
                    self.apply_delete(txn, &rt, id)?;
                }
                self.check_size(&*txn)?;
            }
            Ok(())
        })
    }

    fn apply_insert(&self, txn: &mut D::Txn, rt: &RecordType, insert: &PendingInsert) -> Result<()> {
        let key = rt.subspace().pack(&insert.id);
        let old_bytes = txn.get(&key, false)?;
        if let Some(old_bytes) = old_bytes {
            let old_record = record_type::decode(&old_bytes)?;
            self.update_indexes(txn, rt, Some(&old_record), None)?;
        }
        let new_bytes = record_type::encode(&insert.record)?;
        if new_bytes.len() > self.limits.max_value_bytes {
            return Err(RecordGraphError::KeyTooLarge { actual: new_bytes.len(), limit: self.limits.max_value_bytes });
        }
        txn.set(&key, &new_bytes);
        self.update_indexes(txn, rt, None, Some(&insert.record))?;
        Ok(())
    }

    fn apply_delete(&self, txn: &mut D::Txn, rt: &RecordType, id: &[FieldValue]) -> Result<()> {
        let key = rt.subspace().pack(id);
        if let Some(old_bytes) = txn.get(&key, false)? {
            let old_record = record_type::decode(&old_bytes)?;
            self.update_indexes(txn, rt, Some(&old_record), None)?;
        }
        txn.clear(&key);
        Ok(())
    }

    /// Clear stale entries derived from `old`, write entries derived from
    /// `new`, for every index not in `disabled` state.
    fn update_indexes(
        &self,
        txn: &mut D::Txn,
        rt: &RecordType,
        old: Option<&FieldValue>,
        new: Option<&FieldValue>,
    ) -> Result<()> {
        let record_for_id = old.or(new).expect("update_indexes needs at least one record");
        let id = rt.id_of(record_for_id)?;
        for index in rt.indexes() {
            let state = current_state(&*txn, index.name())?;
            if !is_maintained(state) {
                continue;
            }
            if let Some(old) = old {
                recordgraph_storage::delete_entries(txn, index.as_ref(), old, &id);
            }
            if let Some(new) = new {
                recordgraph_storage::insert_entries(txn, index.as_ref(), new, &id, &self.limits)?;
            }
        }
        Ok(())
    }

    fn check_size(&self, txn: &D::Txn) -> Result<()> {
        let size = txn.approximate_size();
        if size >= self.limits.transaction_fail_bytes {
            return Err(RecordGraphError::TransactionTooLarge {
                current_size: size,
                limit: self.limits.transaction_fail_bytes,
                hint: "split this save() into smaller batches".into(),
            });
        }
        if size >= self.limits.transaction_warn_bytes {
            tracing::warn!(size, "write session transaction approaching size limit");
        }
        Ok(())
    }

    fn notify_autosave(&self) {
        if let Some(tx) = self.autosave_tx.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }
    }

    /// Disable autosave; the debounce thread exits on its next wakeup.
    pub fn disable_autosave(&self) {
        *self.autosave_tx.lock().unwrap() = None;
    }
}

impl<D: Database + Send + Sync + 'static> WriteSession<D> {
    /// Enable autosave (spec §4.8): every `insert`/`delete` schedules a
    /// `save()` after a debounce period, coalescing bursts of writes into
    /// one commit. A failed autosave invokes `on_failure` and disables
    /// autosave so it doesn't retry in a loop; callers that want it back
    /// must call this again.
    pub fn spawn_autosave(
        self: &Arc<Self>,
        debounce: Duration,
        on_failure: impl Fn(RecordGraphError) + Send + 'static,
    ) -> AutosaveHandle {
        let (tx, rx) = mpsc::channel::<()>();
        *self.autosave_tx.lock().unwrap() = Some(tx);
        let session = Arc::clone(self);
        let thread = thread::spawn(move || {
            while rx.recv().is_ok() {
                thread::sleep(debounce);
                while rx.try_recv().is_ok() {}
                if let Err(e) = session.save() {
                    session.disable_autosave();
                    on_failure(e);
                    break;
                }
            }
        });
        AutosaveHandle { _thread: thread }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record_type::FieldPathIndex;
    use recordgraph_durability::MemoryDatabase;

    fn schema() -> Arc<HashMap<String, Arc<RecordType>>> {
        let mut m = HashMap::new();
        let rt = RecordType::new("user", vec![0]).with_index(Arc::new(FieldPathIndex::new("by_email", vec![1])));
        m.insert("user".to_string(), Arc::new(rt));
        Arc::new(m)
    }

    fn session() -> WriteSession<MemoryDatabase> {
        WriteSession::new(Arc::new(MemoryDatabase::new()), Arc::new(GrvCache::new()), schema(), Limits::default())
    }

    fn user(name: &str, email: &str) -> FieldValue {
        FieldValue::Array(vec![FieldValue::String(name.into()), FieldValue::String(email.into())])
    }

    #[test]
    fn insert_then_save_persists_record() {
        let s = session();
        s.insert("user", user("alice", "alice@example.com")).unwrap();
        s.save().unwrap();
        let fetched = s.fetch("user").unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn delete_cancels_pending_insert() {
        let s = session();
        s.insert("user", user("alice", "a@x.com")).unwrap();
        s.delete("user", vec![FieldValue::String("alice".into())]).unwrap();
        s.save().unwrap();
        assert_eq!(s.fetch("user").unwrap().len(), 0);
    }

    #[test]
    fn insert_cancels_pending_delete() {
        let s = session();
        s.insert("user", user("alice", "a@x.com")).unwrap();
        s.save().unwrap();

        s.delete("user", vec![FieldValue::String("alice".into())]).unwrap();
        s.insert("user", user("alice", "a2@x.com")).unwrap();
        s.save().unwrap();
        let fetched = s.fetch("user").unwrap();
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn rollback_clears_pending_state() {
        let s = session();
        s.insert("user", user("alice", "a@x.com")).unwrap();
        s.rollback();
        s.save().unwrap();
        assert_eq!(s.fetch("user").unwrap().len(), 0);
    }

    #[test]
    fn unknown_type_fails_with_model_not_found() {
        let s = session();
        let err = s.insert("ghost", FieldValue::Null).unwrap_err();
        assert!(matches!(err, RecordGraphError::ModelNotFound(_)));
    }

    #[test]
    fn autosave_persists_after_debounce() {
        let s = Arc::new(session());
        let _handle = s.spawn_autosave(Duration::from_millis(5), |_| panic!("autosave should not fail"));
        s.insert("user", user("alice", "a@x.com")).unwrap();

        let mut fetched = Vec::new();
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(5));
            fetched = s.fetch("user").unwrap();
            if !fetched.is_empty() {
                break;
            }
        }
        assert_eq!(fetched.len(), 1);
    }

    #[test]
    fn autosave_disables_itself_after_failure() {
        let s = Arc::new(session());
        let failed = Arc::new(AtomicBool::new(false));
        let failed_clone = Arc::clone(&failed);
        let _handle = s.spawn_autosave(Duration::from_millis(5), move |_| {
            failed_clone.store(true, Ordering::SeqCst);
        });

        // A save that fails: "ghost" isn't a declared type, so commit_snapshot's
        // record_type lookup trips ModelNotFound, which the debounce thread
        // reports via on_failure and then stops watching for further
        // notifications.
        s.pending.lock().unwrap().inserted.insert(
            ("ghost".to_string(), vec![]),
            PendingInsert { id: vec![], record: FieldValue::Null },
        );
        s.notify_autosave();

        let mut saw_failure = false;
        for _ in 0..50 {
            std::thread::sleep(Duration::from_millis(5));
            if failed.load(Ordering::SeqCst) {
                saw_failure = true;
                break;
            }
        }
        assert!(saw_failure);
        assert!(s.autosave_tx.lock().unwrap().is_none());
    }
}
