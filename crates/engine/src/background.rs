//! Worker lanes: named FIFO task queues with a fixed thread pool.
//!
//! The store runs on two lanes:
//! - a single-thread writer lane, so mutations apply one at a time in
//!   submission order
//! - a multi-thread reader lane, so reads run concurrently with each other
//!   and with writes
//!
//! Tasks are boxed closures. A panicking task is caught and logged; the
//! worker keeps running.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use thiserror::Error;
use tracing::error;

/// Error returned when a lane no longer accepts work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("worker lane is shut down")]
pub struct LaneClosed;

/// Lane metrics snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneStats {
    /// Tasks waiting in the queue.
    pub queue_depth: usize,
    /// Tasks currently running.
    pub active_tasks: usize,
    /// Tasks finished since the lane started.
    pub tasks_completed: u64,
    /// Worker threads.
    pub worker_count: usize,
}

type Task = Box<dyn FnOnce() + Send>;

struct LaneInner {
    name: String,
    queue: Mutex<VecDeque<Task>>,
    work_ready: Condvar,
    drain_cond: Condvar,
    shutdown: AtomicBool,
    active_tasks: AtomicUsize,
    tasks_completed: AtomicU64,
}

/// A FIFO task queue served by a fixed pool of named threads.
///
/// With one worker, tasks run strictly in submission order.
pub struct WorkerLane {
    inner: Arc<LaneInner>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    num_threads: usize,
}

impl std::fmt::Debug for WorkerLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerLane")
            .field("name", &self.inner.name)
            .field("workers", &self.num_threads)
            .finish()
    }
}

impl WorkerLane {
    /// Start a lane with `num_threads` workers (at least one).
    ///
    /// Workers are named `{name}` for a single-thread lane and `{name}-0`,
    /// `{name}-1`, ... otherwise.
    pub fn new(name: &str, num_threads: usize) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let inner = Arc::new(LaneInner {
            name: name.to_string(),
            queue: Mutex::new(VecDeque::new()),
            work_ready: Condvar::new(),
            drain_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            active_tasks: AtomicUsize::new(0),
            tasks_completed: AtomicU64::new(0),
        });

        let lane = Self {
            inner,
            workers: Mutex::new(Vec::with_capacity(num_threads)),
            num_threads,
        };

        for i in 0..num_threads {
            let thread_name = if num_threads == 1 {
                name.to_string()
            } else {
                format!("{}-{}", name, i)
            };
            let inner = Arc::clone(&lane.inner);
            match std::thread::Builder::new()
                .name(thread_name)
                .spawn(move || worker_loop(&inner))
            {
                Ok(handle) => lane.workers.lock().push(handle),
                Err(e) => {
                    lane.shutdown();
                    return Err(e);
                }
            }
        }

        Ok(lane)
    }

    /// Queue a task.
    ///
    /// Returns `Err(LaneClosed)` after `shutdown`; the task is dropped.
    pub fn submit(&self, work: impl FnOnce() + Send + 'static) -> Result<(), LaneClosed> {
        {
            let mut queue = self.inner.queue.lock();
            // Checked under the lock so no task slips in after workers exit.
            if self.inner.shutdown.load(Ordering::Acquire) {
                return Err(LaneClosed);
            }
            queue.push_back(Box::new(work));
        }
        self.inner.work_ready.notify_one();
        Ok(())
    }

    /// Block until every queued and running task has finished.
    ///
    /// Workers keep running afterwards.
    pub fn drain(&self) {
        let mut queue = self.inner.queue.lock();
        while !queue.is_empty() || self.inner.active_tasks.load(Ordering::Acquire) > 0 {
            self.inner.drain_cond.wait(&mut queue);
        }
    }

    /// Stop accepting work, finish what is queued, join the workers.
    ///
    /// Idempotent. From one of the lane's own workers it cannot wait for that
    /// worker, which exits once the queue is empty.
    pub fn shutdown(&self) {
        {
            let _queue = self.inner.queue.lock();
            self.inner.shutdown.store(true, Ordering::Release);
            self.inner.work_ready.notify_all();
        }

        let current = std::thread::current().id();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            // A worker cannot join itself; it exits on its own once idle.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }

    /// Check if the lane still accepts work.
    pub fn is_running(&self) -> bool {
        !self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Lane name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Return a snapshot of lane metrics.
    pub fn stats(&self) -> LaneStats {
        LaneStats {
            queue_depth: self.inner.queue.lock().len(),
            active_tasks: self.inner.active_tasks.load(Ordering::Relaxed),
            tasks_completed: self.inner.tasks_completed.load(Ordering::Relaxed),
            worker_count: self.num_threads,
        }
    }
}

impl Drop for WorkerLane {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decrements `active_tasks` and wakes drain waiters, even if the task panics.
struct ActiveTaskGuard<'a> {
    inner: &'a LaneInner,
}

impl Drop for ActiveTaskGuard<'_> {
    fn drop(&mut self) {
        let prev_active = self.inner.active_tasks.fetch_sub(1, Ordering::Release);
        self.inner.tasks_completed.fetch_add(1, Ordering::Relaxed);

        if prev_active == 1 {
            let queue = self.inner.queue.lock();
            if queue.is_empty() {
                self.inner.drain_cond.notify_all();
            }
        }
    }
}

fn worker_loop(inner: &LaneInner) {
    loop {
        let task = {
            let mut queue = inner.queue.lock();
            loop {
                if let Some(task) = queue.pop_front() {
                    inner.active_tasks.fetch_add(1, Ordering::Release);
                    break task;
                }
                if inner.shutdown.load(Ordering::Acquire) {
                    return;
                }
                inner.work_ready.wait(&mut queue);
            }
        };

        let _guard = ActiveTaskGuard { inner };

        if let Err(e) = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task)) {
            let message = e
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| e.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("(non-string panic)");
            error!(target: "histmeta::facade", lane = %inner.name, "task panicked: {}", message);
        }
    }
}
