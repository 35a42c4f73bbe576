//! HistoryMetadata: the asynchronous public surface
//!
//! Every operation returns a `Pending` immediately. Work runs on two lanes:
//!
//! - **writer** (`histmeta-writer`, one thread): observations, deletions,
//!   retention sweeps and compaction, strictly in submission order
//! - **readers** (`histmeta-reader`, a small pool): lookups, range scans and
//!   queries, concurrently with each other and with writes
//!
//! ## Read-your-writes
//!
//! Each write gets a sequence number when it is queued. A read remembers the
//! last number handed out at the time it is queued and, once on a reader
//! thread, waits until the writer has finished that many writes. A caller
//! that queues a write and then a read therefore always sees the write,
//! while reads never block the writer.
//!
//! ## Lifecycle
//!
//! `close()` stops the retention timer, lets the writer drain its queue,
//! stops the readers and syncs the log, releasing the directory lock. After
//! that every call resolves to `StoreError::Closed` until
//! `reopen_if_closed()`. Dropping the last handle closes the store.

use histmeta_core::{
    Clock, MetadataKey, MetadataRecord, Observation, StoreError, StoreResult, SystemClock,
    Timestamp,
};
use histmeta_engine::{
    MetadataConfig, MetadataStore, RetentionManager, RetentionOutcome, RetentionScheduler,
    WorkerLane,
};
use parking_lot::{Condvar, Mutex, RwLock};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info, warn};

use crate::pending::{pending, Pending};
use crate::projection::group_by_search_term;

const WRITER_LANE: &str = "histmeta-writer";
const READER_LANE: &str = "histmeta-reader";

// ============================================================================
// Write sequencing
// ============================================================================

/// Highest write sequence the writer has finished
#[derive(Default)]
struct Watermark {
    applied: Mutex<u64>,
    advanced: Condvar,
}

impl Watermark {
    fn advance(&self, seq: u64) {
        let mut applied = self.applied.lock();
        if seq > *applied {
            *applied = seq;
        }
        drop(applied);
        self.advanced.notify_all();
    }

    fn wait_for(&self, seq: u64) {
        let mut applied = self.applied.lock();
        while *applied < seq {
            self.advanced.wait(&mut applied);
        }
    }
}

/// Marks a write finished even if it panicked
struct Applied {
    watermark: Arc<Watermark>,
    seq: u64,
}

impl Drop for Applied {
    fn drop(&mut self) {
        self.watermark.advance(self.seq);
    }
}

struct WriteQueue {
    lane: WorkerLane,
    /// Last sequence handed out; also serializes submission
    submitted: Mutex<u64>,
    watermark: Arc<Watermark>,
}

impl WriteQueue {
    fn new() -> StoreResult<Self> {
        Ok(Self {
            lane: WorkerLane::new(WRITER_LANE, 1).map_err(spawn_failure)?,
            submitted: Mutex::new(0),
            watermark: Arc::new(Watermark::default()),
        })
    }

    fn submit<T, F>(&self, store: &Arc<MetadataStore>, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore) -> StoreResult<T> + Send + 'static,
    {
        let (completer, handle) = pending();
        let store = Arc::clone(store);
        let watermark = Arc::clone(&self.watermark);

        let mut submitted = self.submitted.lock();
        let seq = *submitted + 1;
        let task = move || {
            // The watermark moves before continuations run, so a callback
            // may read and wait without stalling this lane.
            let result = {
                let _applied = Applied { watermark, seq };
                op(&store)
            };
            completer.complete(result);
        };
        // A refused task is dropped with its completer, resolving to Closed.
        if self.lane.submit(task).is_ok() {
            *submitted = seq;
        }
        handle
    }

    fn last_submitted(&self) -> u64 {
        *self.submitted.lock()
    }
}

fn spawn_failure(e: std::io::Error) -> StoreError {
    StoreError::io(format!("failed to start worker thread: {}", e))
}

// ============================================================================
// Runtime
// ============================================================================

/// Everything that exists only while the store is open
struct Runtime {
    store: Arc<MetadataStore>,
    writes: Arc<WriteQueue>,
    readers: WorkerLane,
    retention: Option<(RetentionScheduler, JoinHandle<()>)>,
}

impl Runtime {
    fn start(location: &Location, config: &MetadataConfig, clock: &Arc<dyn Clock>) -> StoreResult<Self> {
        config.validate()?;
        let store = match location {
            Location::InMemory => MetadataStore::in_memory_with_clock(Arc::clone(clock)),
            Location::Dir(dir) => {
                MetadataStore::open_with_clock(dir, config.storage_options()?, Arc::clone(clock))?
            }
        };
        let store = Arc::new(store);
        let writes = Arc::new(WriteQueue::new()?);
        let readers = WorkerLane::new(READER_LANE, config.reader_threads).map_err(spawn_failure)?;

        let policy = config.retention_policy();
        let retention = if policy.is_enabled() {
            let scheduler = RetentionScheduler::new(config.retention_interval());
            let (store, writes) = (Arc::clone(&store), Arc::clone(&writes));
            let handle = scheduler
                .start(move || {
                    let sweep = writes.submit(&store, move |s| RetentionManager::new(s).apply(&policy));
                    let _ = sweep.on_complete(|result| {
                        if let Err(e) = result {
                            warn!(target: "histmeta::retention", error = %e, "Scheduled sweep failed");
                        }
                    });
                })
                .map_err(spawn_failure)?;
            Some((scheduler, handle))
        } else {
            None
        };

        info!(
            target: "histmeta::facade",
            records = store.len(),
            reader_threads = config.reader_threads,
            retention = ?policy,
            "History metadata store opened"
        );

        Ok(Self {
            store,
            writes,
            readers,
            retention,
        })
    }

    fn write<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore) -> StoreResult<T> + Send + 'static,
    {
        self.writes.submit(&self.store, op)
    }

    fn read<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore) -> StoreResult<T> + Send + 'static,
    {
        let (completer, handle) = pending();
        let store = Arc::clone(&self.store);
        let watermark = Arc::clone(&self.writes.watermark);
        let after = self.writes.last_submitted();
        let _ = self.readers.submit(move || {
            watermark.wait_for(after);
            completer.complete(op(&store));
        });
        handle
    }

    fn shutdown(self) -> StoreResult<()> {
        if let Some((scheduler, handle)) = self.retention {
            scheduler.shutdown();
            let _ = handle.join();
        }
        self.writes.lane.shutdown();
        self.readers.shutdown();
        let synced = self.store.sync();
        if let Err(e) = &synced {
            warn!(target: "histmeta::facade", error = %e, "Final sync failed");
        }
        info!(target: "histmeta::facade", records = self.store.len(), "History metadata store closed");
        synced
    }
}

// ============================================================================
// HistoryMetadata
// ============================================================================

enum Location {
    InMemory,
    Dir(PathBuf),
}

struct Inner {
    location: Location,
    config: MetadataConfig,
    clock: Arc<dyn Clock>,
    runtime: RwLock<Option<Arc<Runtime>>>,
}

impl Inner {
    fn runtime(&self) -> Option<Arc<Runtime>> {
        self.runtime.read().clone()
    }

    fn close(&self) -> StoreResult<()> {
        let Some(runtime) = self.runtime.write().take() else {
            return Ok(());
        };
        match Arc::try_unwrap(runtime) {
            Ok(runtime) => runtime.shutdown(),
            // Another thread is mid-submit; it holds the last reference
            // and its drop shuts the lanes down.
            Err(shared) => {
                shared.writes.lane.shutdown();
                shared.readers.shutdown();
                if let Some((scheduler, _)) = &shared.retention {
                    scheduler.shutdown();
                }
                shared.store.sync()
            }
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(target: "histmeta::facade", error = %e, "Close on drop failed");
        }
    }
}

/// History metadata store handle
///
/// Cheap to clone; all clones share one store. Safe to use from any thread.
///
/// # Example
///
/// ```
/// use histmeta_api::HistoryMetadata;
/// use histmeta_core::{MetadataKey, Observation};
///
/// let store = HistoryMetadata::in_memory().unwrap();
/// let key = MetadataKey::from_url("https://www.mozilla.org");
/// store
///     .note_history_metadata_observation(key.clone(), Observation::title("Mozilla"))
///     .wait()
///     .unwrap();
/// let hits = store.query_history_metadata("mozilla", 10).wait().unwrap();
/// assert_eq!(hits.len(), 1);
/// ```
#[derive(Clone)]
pub struct HistoryMetadata {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for HistoryMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryMetadata")
            .field("data_dir", &self.data_dir())
            .field("open", &self.is_open())
            .finish()
    }
}

impl HistoryMetadata {
    /// Open the store in `dir`, reading (or creating) `histmeta.toml` there
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let config = MetadataConfig::load_or_create(dir)?;
        Self::open_with(dir, config, Arc::new(SystemClock))
    }

    /// Open the store in `dir` with explicit settings and clock
    pub fn open_with(
        dir: impl AsRef<Path>,
        config: MetadataConfig,
        clock: Arc<dyn Clock>,
    ) -> StoreResult<Self> {
        Self::start(Location::Dir(dir.as_ref().to_path_buf()), config, clock)
    }

    /// Ephemeral store with default settings
    pub fn in_memory() -> StoreResult<Self> {
        Self::in_memory_with(MetadataConfig::default(), Arc::new(SystemClock))
    }

    /// Ephemeral store with a custom clock
    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> StoreResult<Self> {
        Self::in_memory_with(MetadataConfig::default(), clock)
    }

    /// Ephemeral store with explicit settings and clock
    pub fn in_memory_with(config: MetadataConfig, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        Self::start(Location::InMemory, config, clock)
    }

    fn start(location: Location, config: MetadataConfig, clock: Arc<dyn Clock>) -> StoreResult<Self> {
        let runtime = Runtime::start(&location, &config, &clock)?;
        Ok(Self {
            inner: Arc::new(Inner {
                location,
                config,
                clock,
                runtime: RwLock::new(Some(Arc::new(runtime))),
            }),
        })
    }

    fn write<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore) -> StoreResult<T> + Send + 'static,
    {
        match self.inner.runtime() {
            Some(runtime) => runtime.write(op),
            None => Pending::failed(StoreError::Closed),
        }
    }

    fn read<T, F>(&self, op: F) -> Pending<T>
    where
        T: Send + 'static,
        F: FnOnce(&MetadataStore) -> StoreResult<T> + Send + 'static,
    {
        match self.inner.runtime() {
            Some(runtime) => runtime.read(op),
            None => Pending::failed(StoreError::Closed),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Fold one observation into the record for `key`
    ///
    /// The key is normalized on the way in. An observation with no fields
    /// set changes nothing.
    pub fn note_history_metadata_observation(
        &self,
        key: impl Into<MetadataKey>,
        observation: Observation,
    ) -> Pending<()> {
        let key = key.into();
        debug!(target: "histmeta::facade", %key, "note_observation queued");
        self.write(move |store| store.note_observation(&key, &observation))
    }

    /// Remove records last observed strictly before `older_than`
    pub fn delete_history_metadata_older_than(&self, older_than: impl Into<Timestamp>) -> Pending<()> {
        let threshold = older_than.into();
        self.write(move |store| store.delete_older_than(threshold).map(|_| ()))
    }

    /// Remove the record for one key; resolves to whether it existed
    pub fn delete_history_metadata(&self, key: impl Into<MetadataKey>) -> Pending<bool> {
        let key = key.into();
        self.write(move |store| store.delete(&key))
    }

    /// Remove every record; resolves to the number removed
    pub fn delete_all_history_metadata(&self) -> Pending<usize> {
        self.write(|store| store.delete_all())
    }

    /// Run the configured retention policy now
    pub fn apply_retention(&self) -> Pending<RetentionOutcome> {
        let policy = self.inner.config.retention_policy();
        self.write(move |store| RetentionManager::new(store).apply(&policy))
    }

    /// Rewrite the log down to the live records
    pub fn compact(&self) -> Pending<()> {
        self.write(|store| store.compact())
    }

    /// Force buffered log writes to disk
    pub fn flush(&self) -> Pending<()> {
        self.write(|store| store.sync())
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Record for one key
    pub fn get_history_metadata(&self, key: impl Into<MetadataKey>) -> Pending<Option<MetadataRecord>> {
        let key = key.into();
        self.read(move |store| store.get(&key))
    }

    /// Records observed at or after `since`, oldest first
    pub fn get_history_metadata_since(&self, since: impl Into<Timestamp>) -> Pending<Vec<MetadataRecord>> {
        let since = since.into();
        self.read(move |store| store.get_since(since))
    }

    /// Records observed in `[start, end)`, oldest first
    pub fn get_history_metadata_between(
        &self,
        start: impl Into<Timestamp>,
        end: impl Into<Timestamp>,
    ) -> Pending<Vec<MetadataRecord>> {
        let (start, end) = (start.into(), end.into());
        self.read(move |store| store.get_between(start, end))
    }

    /// Case-insensitive substring search over url, title and search term
    ///
    /// At most `limit` records, most recently observed first. A negative
    /// limit is rejected.
    pub fn query_history_metadata(&self, query: &str, limit: i64) -> Pending<Vec<MetadataRecord>> {
        let Ok(limit) = usize::try_from(limit) else {
            return Pending::failed(StoreError::invalid_argument(format!(
                "limit must not be negative, got {}",
                limit
            )));
        };
        let query = query.to_string();
        self.read(move |store| store.query(&query, limit))
    }

    /// Keys observed since `since` that carry a search term, grouped by term
    ///
    /// Most recently observed first within each group.
    pub fn search_term_groups(
        &self,
        since: impl Into<Timestamp>,
    ) -> Pending<BTreeMap<String, Vec<MetadataKey>>> {
        let since = since.into();
        self.read(move |store| Ok(group_by_search_term(&store.get_since(since)?)))
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Drain queued writes, stop the workers, release the directory
    ///
    /// Idempotent. Afterwards calls resolve to `StoreError::Closed`.
    pub fn close(&self) -> StoreResult<()> {
        self.inner.close()
    }

    /// Reopen after `close`; no-op while open
    pub fn reopen_if_closed(&self) -> StoreResult<()> {
        let mut slot = self.inner.runtime.write();
        if slot.is_none() {
            let runtime = Runtime::start(&self.inner.location, &self.inner.config, &self.inner.clock)?;
            *slot = Some(Arc::new(runtime));
        }
        Ok(())
    }

    /// Check if the store accepts operations
    pub fn is_open(&self) -> bool {
        self.inner.runtime.read().is_some()
    }

    /// Settings the store was opened with
    pub fn config(&self) -> &MetadataConfig {
        &self.inner.config
    }

    /// Backing directory, None for an in-memory store
    pub fn data_dir(&self) -> Option<&Path> {
        match &self.inner.location {
            Location::InMemory => None,
            Location::Dir(dir) => Some(dir),
        }
    }
}
