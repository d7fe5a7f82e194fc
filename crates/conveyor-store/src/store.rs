use crate::{Result, StoreError};
use chrono::Utc;
use conveyor_core::{RetryPolicy, Task, TaskError, TaskId, TaskStatus};
use rocksdb::{ColumnFamilyDescriptor, Options, WriteBatch, DB};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

const CF_TASKS: &str = "tasks";
const CF_CORRELATION: &str = "correlation";
const CF_META: &str = "meta";

const META_NEXT_ID: &[u8] = b"next_task_id";

/// Configuration for the task store
#[derive(Debug, Clone)]
pub struct TaskStoreConfig {
    pub data_dir: PathBuf,
}

impl Default for TaskStoreConfig {
    fn default() -> Self {
        TaskStoreConfig {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Durable record of every task's lifecycle, backed by RocksDB.
///
/// The store is the single source of truth for task state across process
/// restarts. Identifiers are assigned from a persisted monotonic sequence
/// and never reused; status changes are validated against the lifecycle
/// transition table, so terminal records can never be mutated.
pub struct TaskStore {
    db: DB,
    next_id: AtomicU64,
}

impl TaskStore {
    /// Open or create the store
    pub fn open(config: &TaskStoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.data_dir)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);

        let db = DB::open_cf_descriptors(
            &db_opts,
            config.data_dir.join("tasks"),
            Self::cf_descriptors(),
        )?;

        let next_id = Self::load_next_id(&db)?;
        info!(data_dir = %config.data_dir.display(), next_id, "opened task store");

        Ok(TaskStore {
            db,
            next_id: AtomicU64::new(next_id),
        })
    }

    /// Open read-only for inspection while a worker owns the primary handle
    pub fn open_read_only(config: &TaskStoreConfig) -> Result<Self> {
        let db = DB::open_cf_for_read_only(
            &Options::default(),
            config.data_dir.join("tasks"),
            [CF_TASKS, CF_CORRELATION, CF_META],
            false,
        )?;

        let next_id = Self::load_next_id(&db)?;
        Ok(TaskStore {
            db,
            next_id: AtomicU64::new(next_id),
        })
    }

    fn cf_descriptors() -> Vec<ColumnFamilyDescriptor> {
        vec![
            ColumnFamilyDescriptor::new(CF_TASKS, Options::default()),
            ColumnFamilyDescriptor::new(CF_CORRELATION, Options::default()),
            ColumnFamilyDescriptor::new(CF_META, Options::default()),
        ]
    }

    /// Recover the id sequence. Concurrent creates can commit their cursor
    /// writes out of order, leaving the persisted cursor behind the greatest
    /// assigned id, so the last key of the tasks CF (big-endian id order) is
    /// authoritative when it is ahead.
    fn load_next_id(db: &DB) -> Result<u64> {
        let meta_cf = db
            .cf_handle(CF_META)
            .ok_or_else(|| StoreError::Other("meta CF not found".to_string()))?;

        let cursor = match db.get_cf(meta_cf, META_NEXT_ID)? {
            Some(bytes) => {
                let raw: [u8; 8] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| StoreError::Other("corrupt id sequence".to_string()))?;
                u64::from_be_bytes(raw)
            }
            None => 1,
        };

        let tasks_cf = db
            .cf_handle(CF_TASKS)
            .ok_or_else(|| StoreError::Other("tasks CF not found".to_string()))?;
        let past_highest = match db.iterator_cf(tasks_cf, rocksdb::IteratorMode::End).next() {
            Some(item) => {
                let (key, _value) = item?;
                let raw: [u8; 8] = key
                    .as_ref()
                    .try_into()
                    .map_err(|_| StoreError::Other("corrupt task key".to_string()))?;
                u64::from_be_bytes(raw) + 1
            }
            None => 1,
        };

        Ok(cursor.max(past_highest))
    }

    /// Create a fresh record in `Pending`, assigning the next id from the
    /// persisted sequence. The correlation index is repointed at the new
    /// record when a correlation id is supplied.
    pub fn create(
        &self,
        task_type: &str,
        payload: Value,
        correlation_id: Option<&str>,
    ) -> Result<Task> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let task = Task::new(
            id,
            task_type.to_string(),
            payload,
            correlation_id.map(|c| c.to_string()),
        );

        let tasks_cf = self.cf(CF_TASKS)?;
        let meta_cf = self.cf(CF_META)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(tasks_cf, id.to_be_bytes(), serde_json::to_vec(&task)?);
        batch.put_cf(meta_cf, META_NEXT_ID, (id + 1).to_be_bytes());
        if let Some(cid) = correlation_id {
            let correlation_cf = self.cf(CF_CORRELATION)?;
            batch.put_cf(correlation_cf, cid.as_bytes(), id.to_be_bytes());
        }
        self.db.write(batch)?;

        debug!(task_id = id, task_type = %task.task_type, "created task record");
        Ok(task)
    }

    pub fn get(&self, id: TaskId) -> Result<Option<Task>> {
        let cf = self.cf(CF_TASKS)?;
        match self.db.get_cf(cf, id.to_be_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Find the non-terminal record for a correlation id. Terminal records
    /// are skipped so a redelivery after a crash-between-update-and-ack
    /// produces a fresh record instead of mutating a finished one.
    pub fn find_active_by_correlation(&self, correlation_id: &str) -> Result<Option<Task>> {
        let cf = self.cf(CF_CORRELATION)?;
        let Some(bytes) = self.db.get_cf(cf, correlation_id.as_bytes())? else {
            return Ok(None);
        };

        let raw: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Other("corrupt correlation index".to_string()))?;

        match self.get(u64::from_be_bytes(raw))? {
            Some(task) if !task.status.is_terminal() => Ok(Some(task)),
            _ => Ok(None),
        }
    }

    /// Move a record to `InProgress` before its handler runs
    pub fn mark_in_progress(&self, id: TaskId) -> Result<Task> {
        self.update(id, |task| {
            Self::check_transition(task, TaskStatus::InProgress)?;
            task.status = TaskStatus::InProgress;
            Ok(())
        })
    }

    /// Record a successful attempt; `retry_count` is left untouched
    pub fn mark_success(&self, id: TaskId) -> Result<Task> {
        self.update(id, |task| {
            Self::check_transition(task, TaskStatus::Success)?;
            task.status = TaskStatus::Success;
            Ok(())
        })
    }

    /// Record a failed attempt: increment the retry count, stamp the error,
    /// and let the policy pick `Retrying` or terminal `Failed`.
    pub fn record_failure(&self, id: TaskId, policy: &RetryPolicy, error: &str) -> Result<Task> {
        self.update(id, |task| {
            let attempts = task.retry_count + 1;
            let next = match policy.decide(attempts) {
                conveyor_core::RetryDecision::Retry => TaskStatus::Retrying,
                conveyor_core::RetryDecision::GiveUp => TaskStatus::Failed,
            };
            Self::check_transition(task, next)?;

            task.retry_count = attempts;
            task.status = next;
            task.last_error_at = Some(Utc::now());
            task.last_error_message = Some(error.to_string());
            Ok(())
        })
    }

    /// All records currently in the given status, in id order
    pub fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        Ok(self
            .all_tasks()?
            .into_iter()
            .filter(|task| task.status == status)
            .collect())
    }

    /// Every record in the store, in id order
    pub fn all_tasks(&self) -> Result<Vec<Task>> {
        let cf = self.cf(CF_TASKS)?;
        let mut tasks = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            tasks.push(serde_json::from_slice(&value)?);
        }
        Ok(tasks)
    }

    fn update(&self, id: TaskId, mutate: impl FnOnce(&mut Task) -> Result<()>) -> Result<Task> {
        let mut task = self.get(id)?.ok_or(StoreError::TaskNotFound(id))?;
        mutate(&mut task)?;
        task.updated_at = Utc::now();

        let cf = self.cf(CF_TASKS)?;
        self.db.put_cf(cf, id.to_be_bytes(), serde_json::to_vec(&task)?)?;

        debug!(task_id = id, status = %task.status, retry_count = task.retry_count, "updated task record");
        Ok(task)
    }

    fn check_transition(task: &Task, next: TaskStatus) -> Result<()> {
        if !task.status.can_transition_to(next) {
            return Err(StoreError::Task(TaskError::InvalidTransition {
                from: task.status,
                to: next,
            }));
        }
        Ok(())
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Other(format!("{} CF not found", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open_temp() -> (TempDir, TaskStore) {
        let dir = TempDir::new().unwrap();
        let config = TaskStoreConfig {
            data_dir: dir.path().to_path_buf(),
        };
        let store = TaskStore::open(&config).unwrap();
        (dir, store)
    }

    #[test]
    fn test_ids_are_monotonic_and_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let config = TaskStoreConfig {
            data_dir: dir.path().to_path_buf(),
        };

        {
            let store = TaskStore::open(&config).unwrap();
            assert_eq!(store.create("FetchOrders", json!({}), None).unwrap().id, 1);
            assert_eq!(store.create("FetchOrders", json!({}), None).unwrap().id, 2);
        }

        // ids continue after restart, never reused
        let store = TaskStore::open(&config).unwrap();
        assert_eq!(store.create("SendEmail", json!({}), None).unwrap().id, 3);
    }

    #[test]
    fn test_reopen_recovers_ids_past_a_stale_cursor() {
        let dir = TempDir::new().unwrap();
        let config = TaskStoreConfig {
            data_dir: dir.path().to_path_buf(),
        };

        {
            let store = TaskStore::open(&config).unwrap();
            for _ in 0..3 {
                store.create("FetchOrders", json!({}), None).unwrap();
            }
        }

        // interleaved creates can leave the persisted cursor behind the
        // greatest assigned id; plant the lagging write directly
        {
            let db = DB::open_cf_descriptors(
                &Options::default(),
                config.data_dir.join("tasks"),
                TaskStore::cf_descriptors(),
            )
            .unwrap();
            let meta = db.cf_handle(CF_META).unwrap();
            db.put_cf(meta, META_NEXT_ID, 2u64.to_be_bytes()).unwrap();
        }

        // recovery must not reassign an id that already exists
        let store = TaskStore::open(&config).unwrap();
        let fresh = store.create("SendEmail", json!({}), None).unwrap();
        assert_eq!(fresh.id, 4);
        assert_eq!(store.get(3).unwrap().unwrap().task_type, "FetchOrders");
    }

    #[test]
    fn test_successful_attempt_leaves_retry_count_untouched() {
        let (_dir, store) = open_temp();
        let task = store
            .create("SendEmail", json!({"email": "a@b.c"}), None)
            .unwrap();

        store.mark_in_progress(task.id).unwrap();
        let done = store.mark_success(task.id).unwrap();

        assert_eq!(done.status, TaskStatus::Success);
        assert_eq!(done.retry_count, 0);
        assert!(done.last_error_message.is_none());
    }

    #[test]
    fn test_failure_exhausts_retries_then_fails_terminally() {
        let (_dir, store) = open_temp();
        let policy = RetryPolicy::new(3);
        let task = store.create("CreateInvoice", json!({"customerId": "c-1"}), None).unwrap();

        // three failed attempts are retried
        for attempt in 1..=3 {
            store.mark_in_progress(task.id).unwrap();
            let failed = store.record_failure(task.id, &policy, "boom").unwrap();
            assert_eq!(failed.status, TaskStatus::Retrying);
            assert_eq!(failed.retry_count, attempt);
        }

        // the fourth failure is terminal
        store.mark_in_progress(task.id).unwrap();
        let dead = store.record_failure(task.id, &policy, "still broken").unwrap();
        assert_eq!(dead.status, TaskStatus::Failed);
        assert_eq!(dead.retry_count, 4);
        assert_eq!(dead.last_error_message.as_deref(), Some("still broken"));
        assert!(dead.last_error_at.is_some());
    }

    #[test]
    fn test_terminal_records_reject_further_transitions() {
        let (_dir, store) = open_temp();
        let policy = RetryPolicy::new(0);
        let task = store.create("GeneratePDF", json!({}), None).unwrap();

        store.mark_in_progress(task.id).unwrap();
        let dead = store.record_failure(task.id, &policy, "no handler").unwrap();
        assert_eq!(dead.status, TaskStatus::Failed);

        assert!(matches!(
            store.mark_in_progress(task.id),
            Err(StoreError::Task(TaskError::InvalidTransition { .. }))
        ));
        assert!(matches!(
            store.record_failure(task.id, &policy, "again"),
            Err(StoreError::Task(TaskError::InvalidTransition { .. }))
        ));
    }

    #[test]
    fn test_cannot_skip_in_progress() {
        let (_dir, store) = open_temp();
        let task = store.create("FetchOrders", json!({}), None).unwrap();

        assert!(matches!(
            store.mark_success(task.id),
            Err(StoreError::Task(TaskError::InvalidTransition { .. }))
        ));
    }

    #[test]
    fn test_correlation_lookup_skips_terminal_records() {
        let (_dir, store) = open_temp();
        let policy = RetryPolicy::new(0);
        let cid = "msg-123";

        let task = store.create("SendEmail", json!({}), Some(cid)).unwrap();
        let found = store.find_active_by_correlation(cid).unwrap().unwrap();
        assert_eq!(found.id, task.id);

        store.mark_in_progress(task.id).unwrap();
        store.record_failure(task.id, &policy, "boom").unwrap();

        // terminal record: a redelivery must get a fresh record
        assert!(store.find_active_by_correlation(cid).unwrap().is_none());

        // and a new record repoints the index
        let fresh = store.create("SendEmail", json!({}), Some(cid)).unwrap();
        let found = store.find_active_by_correlation(cid).unwrap().unwrap();
        assert_eq!(found.id, fresh.id);
        assert!(fresh.id > task.id);
    }

    #[test]
    fn test_tasks_by_status_filters() {
        let (_dir, store) = open_temp();

        let a = store.create("FetchOrders", json!({}), None).unwrap();
        let b = store.create("FetchOrders", json!({}), None).unwrap();
        store.create("FetchOrders", json!({}), None).unwrap();

        store.mark_in_progress(a.id).unwrap();
        store.mark_success(a.id).unwrap();
        store.mark_in_progress(b.id).unwrap();

        assert_eq!(store.tasks_by_status(TaskStatus::Success).unwrap().len(), 1);
        assert_eq!(store.tasks_by_status(TaskStatus::InProgress).unwrap().len(), 1);
        assert_eq!(store.tasks_by_status(TaskStatus::Pending).unwrap().len(), 1);
        assert_eq!(store.all_tasks().unwrap().len(), 3);
    }

    #[test]
    fn test_missing_task() {
        let (_dir, store) = open_temp();
        assert!(store.get(42).unwrap().is_none());
        assert!(matches!(
            store.mark_in_progress(42),
            Err(StoreError::TaskNotFound(42))
        ));
    }
}
