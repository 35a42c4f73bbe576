//! Retention: age-based removal of records
//!
//! - `RetentionPolicy`: how long records are kept
//! - `RetentionManager`: runs a policy (or an explicit threshold) against a
//!   `MetadataStore`
//! - `RetentionScheduler`: background thread that fires a sweep callback on
//!   an interval; the caller decides where the sweep actually runs
//!
//! The boundary is exactly `last_observed_at < threshold`, across the full
//! `i64` range.

use histmeta_core::{StoreResult, Timestamp};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info};

use crate::store::MetadataStore;

/// How long records are kept after their last observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetentionPolicy {
    /// Never remove anything automatically
    #[default]
    KeepAll,
    /// Remove records not observed within this window
    KeepFor(Duration),
}

impl RetentionPolicy {
    /// Policy keeping `days` days; 0 means `KeepAll`
    pub fn from_days(days: u64) -> Self {
        if days == 0 {
            RetentionPolicy::KeepAll
        } else {
            RetentionPolicy::KeepFor(Duration::from_secs(days.saturating_mul(86_400)))
        }
    }

    /// Threshold for a sweep at `now`, or None if nothing expires
    pub fn cutoff(&self, now: Timestamp) -> Option<Timestamp> {
        match self {
            RetentionPolicy::KeepAll => None,
            RetentionPolicy::KeepFor(window) => Some(now.saturating_sub(*window)),
        }
    }

    /// Check if this policy ever removes records
    pub fn is_enabled(&self) -> bool {
        !matches!(self, RetentionPolicy::KeepAll)
    }
}

/// Result of one policy sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionOutcome {
    /// Threshold used, None when the policy keeps everything
    pub cutoff: Option<Timestamp>,
    /// Records removed
    pub removed: usize,
}

/// Applies retention to a store
#[derive(Debug, Clone, Copy)]
pub struct RetentionManager<'a> {
    store: &'a MetadataStore,
}

impl<'a> RetentionManager<'a> {
    /// Manager over `store`
    pub fn new(store: &'a MetadataStore) -> Self {
        Self { store }
    }

    /// Remove every record with `last_observed_at < threshold`
    pub fn delete_older_than(&self, threshold: Timestamp) -> StoreResult<usize> {
        let removed = self.store.delete_older_than(threshold)?;
        info!(
            target: "histmeta::retention",
            %threshold,
            removed,
            "Deleted records older than threshold"
        );
        Ok(removed)
    }

    /// Run `policy` at the store clock's current time
    pub fn apply(&self, policy: &RetentionPolicy) -> StoreResult<RetentionOutcome> {
        let now = self.store.clock().now();
        let Some(cutoff) = policy.cutoff(now) else {
            debug!(target: "histmeta::retention", "Retention disabled, nothing to sweep");
            return Ok(RetentionOutcome {
                cutoff: None,
                removed: 0,
            });
        };
        let removed = self.delete_older_than(cutoff)?;
        Ok(RetentionOutcome {
            cutoff: Some(cutoff),
            removed,
        })
    }
}

// ============================================================================
// RetentionScheduler
// ============================================================================

/// Background retention timer
///
/// Calls `tick` every `interval` until shut down. The first tick happens one
/// interval after `start`, not immediately.
///
/// # Example
///
/// ```ignore
/// let scheduler = RetentionScheduler::new(Duration::from_secs(3600));
/// let handle = scheduler.start(move || { /* enqueue a sweep */ })?;
///
/// scheduler.shutdown();
/// handle.join().unwrap();
/// ```
pub struct RetentionScheduler {
    interval: Duration,
    shutdown: Arc<(Mutex<bool>, Condvar)>,
}

impl RetentionScheduler {
    /// Scheduler firing every `interval`
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            shutdown: Arc::new((Mutex::new(false), Condvar::new())),
        }
    }

    /// Spawn the timer thread (`histmeta-retention`)
    pub fn start<F>(&self, tick: F) -> std::io::Result<JoinHandle<()>>
    where
        F: Fn() + Send + 'static,
    {
        let shutdown = Arc::clone(&self.shutdown);
        let interval = self.interval;

        thread::Builder::new()
            .name("histmeta-retention".to_string())
            .spawn(move || {
                let (stopped, wake) = &*shutdown;
                let mut stopped = stopped.lock();
                loop {
                    if *stopped {
                        return;
                    }
                    let timed_out = wake.wait_for(&mut stopped, interval).timed_out();
                    if *stopped {
                        return;
                    }
                    if timed_out {
                        debug!(target: "histmeta::retention", "Retention timer fired");
                        tick();
                    }
                }
            })
    }

    /// Signal shutdown; the thread exits promptly
    pub fn shutdown(&self) {
        let (stopped, wake) = &*self.shutdown;
        *stopped.lock() = true;
        wake.notify_all();
    }

    /// Check if shutdown has been signaled
    pub fn is_shutdown(&self) -> bool {
        *self.shutdown.0.lock()
    }
}
